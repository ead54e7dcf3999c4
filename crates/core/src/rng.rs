//! Random number generators for the planner's tie-breaks.

use crate::config::RandomnessConfig;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Deterministic generator from a seed of any length.
///
/// Uses BLAKE3 to expand short seeds to full 32-byte entropy before
/// initializing the PRNG.
pub fn seeded_rng(seed: &[u8]) -> StdRng {
    let seed_hash = blake3::hash(seed);
    StdRng::from_seed(*seed_hash.as_bytes())
}

/// Generator described by the randomness section of the configuration.
pub fn planner_rng(config: &RandomnessConfig) -> StdRng {
    match &config.seed {
        Some(seed) => seeded_rng(seed.as_bytes()),
        None => StdRng::from_entropy(),
    }
}
