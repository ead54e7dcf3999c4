//! Core functionality for the meshplan link resource planner.
//!
//! This crate provides the value types, configuration, logging and
//! randomness plumbing shared by the topology and assignment crates.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod rng;
pub mod types;

pub use config::{
    parse_enabled_channels, ChannelPolicy, InterferenceConfig, PlannerConfig, RandomnessConfig,
};
pub use error::{CoreError, CoreResult};
pub use rng::{planner_rng, seeded_rng};
pub use types::{
    Channel, Color, GolayIdx, LinkType, Location, NodeType, Polarity, CHANNEL_RANGE,
    CONTROL_SUPERFRAME_MAX, CONTROL_SUPERFRAME_UNSET, DEFAULT_CHANNEL, GOLAY_COLORS,
};
