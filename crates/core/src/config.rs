//! Planner configuration.
//!
//! Loaded from TOML by the embedding controller; every section has
//! defaults so an empty file is a valid configuration.

use crate::error::{CoreError, CoreResult};
use crate::types::{Channel, CHANNEL_RANGE, DEFAULT_CHANNEL};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
#[cfg(feature = "toml")]
use std::path::Path;

/// Top-level planner configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Channel policy
    #[serde(default)]
    pub channels: ChannelPolicy,
    /// Interference model parameters
    #[serde(default)]
    pub interference: InterferenceConfig,
    /// Randomness source
    #[serde(default)]
    pub randomness: RandomnessConfig,
}

/// Which channels the planner may hand out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPolicy {
    /// Enabled channel numbers, as typed by the operator
    pub enabled: Vec<u32>,
}

impl Default for ChannelPolicy {
    fn default() -> Self {
        Self {
            enabled: vec![DEFAULT_CHANNEL as u32],
        }
    }
}

impl ChannelPolicy {
    /// Enabled channels that are actually valid. Falls back to the
    /// default channel when nothing usable is configured.
    pub fn enabled_set(&self) -> BTreeSet<Channel> {
        let mut channels = BTreeSet::new();
        for &raw in &self.enabled {
            match Channel::try_from(raw) {
                Ok(channel) if CHANNEL_RANGE.contains(&channel) => {
                    channels.insert(channel);
                }
                _ => tracing::warn!(channel = raw, "Ignoring invalid enabled channel"),
            }
        }
        if channels.is_empty() {
            channels.insert(DEFAULT_CHANNEL);
        }
        channels
    }
}

/// Parse the comma-separated channel list operators configure, e.g. `"1,2,3"`.
///
/// Entries that are not channel numbers are logged and skipped.
pub fn parse_enabled_channels(list: &str) -> BTreeSet<Channel> {
    let enabled = list
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter_map(|item| match item.parse::<u32>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(entry = item, "Ignoring malformed enabled channel");
                None
            }
        })
        .collect();
    ChannelPolicy { enabled }.enabled_set()
}

/// Parameters of the link-to-link interference estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterferenceConfig {
    /// Links further apart than this never interfere (metres)
    pub max_distance_m: f64,
    /// Received power below this is treated as no interference (dBm)
    pub min_power_dbm: f64,
    /// Vote weight of a wide-angle neighbour's colour
    pub color_weight: usize,
    /// Angle above which a neighbour's colour is encouraged (degrees)
    pub large_angle_deg: f64,
    /// Angle below which a neighbour's colour is vetoed (degrees)
    pub narrow_angle_deg: f64,
}

impl Default for InterferenceConfig {
    fn default() -> Self {
        Self {
            max_distance_m: 500.0,
            min_power_dbm: -80.0,
            color_weight: 10,
            large_angle_deg: 50.0,
            narrow_angle_deg: 20.0,
        }
    }
}

/// Seed for the planner's random tie-breaks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RandomnessConfig {
    /// Fixed seed; entropy is used when absent
    pub seed: Option<String>,
}

impl PlannerConfig {
    /// Load and validate a TOML configuration file.
    #[cfg(feature = "toml")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        use anyhow::Context;

        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading planner config {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("parsing planner config {}", path.display()))?;
        Ok(config)
    }

    /// Parse and validate a TOML document.
    #[cfg(feature = "toml")]
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: PlannerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration used when the operator supplies none.
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Reject parameter combinations the interference model cannot use.
    pub fn validate(&self) -> CoreResult<()> {
        let interference = &self.interference;
        if !(interference.max_distance_m > 0.0) {
            return Err(invalid(
                "interference.max_distance_m",
                "must be a positive distance",
            ));
        }
        if interference.color_weight == 0 {
            return Err(invalid("interference.color_weight", "must be at least 1"));
        }
        if !(0.0..=180.0).contains(&interference.narrow_angle_deg)
            || !(0.0..=180.0).contains(&interference.large_angle_deg)
        {
            return Err(invalid(
                "interference",
                "angle thresholds must lie within [0, 180] degrees",
            ));
        }
        if interference.narrow_angle_deg > interference.large_angle_deg {
            return Err(invalid(
                "interference.narrow_angle_deg",
                "must not exceed large_angle_deg",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> CoreError {
    CoreError::InvalidConfig {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
