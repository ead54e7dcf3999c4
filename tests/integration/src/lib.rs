//! Integration tests across the planner crates
//!
//! This test suite validates:
//! - Full network planning: polarity, channel, Golay, control superframe
//! - Loading topology and planner configuration documents
//! - Channel policy changes and per-link repair
//! - Planner invariants over randomly generated topologies

pub mod test_utils;

#[cfg(test)]
mod planning_scenarios;

#[cfg(test)]
mod planning_properties;
