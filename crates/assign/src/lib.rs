//! meshplan Assign - link resource planning
//!
//! Assigns radio polarity, channel, Golay code and control superframe
//! slot to the wireless links of a mesh topology. Network-wide operations
//! validate the whole plan before writing any of it to the auto layer of a
//! [`ConfigStore`](meshplan_topology::ConfigStore); per-link operations
//! repair a single link with as few changes as possible.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use meshplan_assign::{ChannelHelper, ControlSuperframeHelper, PolarityHelper};
//! use meshplan_topology::{InMemoryConfigStore, Topology};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let topology = Topology::from_json(&std::fs::read_to_string("topology.json")?)?;
//! let mut config = InMemoryConfigStore::default();
//!
//! PolarityHelper::apply_polarity_optimization(&topology, &mut config, false)?;
//! ChannelHelper::default().assign_network_channels(&topology, &mut config, false)?;
//! ControlSuperframeHelper::assign_all_control_superframes(&topology, &mut config, false)?;
//! println!("{}", config.to_json()?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod channel;
pub mod control_superframe;
pub mod error;
pub mod golay;
pub mod interference;
pub mod occ;
pub mod polarity;
pub mod validation;

// Re-export main types
pub use channel::ChannelHelper;
pub use control_superframe::{ControlSuperframeHelper, LinkControlSuperframes};
pub use error::{AssignError, AssignResult};
pub use golay::GolayHelper;
pub use interference::{GroupName2Color, InterferenceHelper, InterferenceMatrix};
pub use occ::{
    OccSolver, VertexWeights, BIAS_DOWN_VERTEX_WEIGHT, BIAS_UP_VERTEX_WEIGHT,
    DEFAULT_VERTEX_WEIGHT, HIGH_VERTEX_WEIGHT, LOW_VERTEX_WEIGHT,
};
pub use polarity::{PolarityHelper, PolarityPlan};
pub use validation::{LinkConfigReport, LinkConfigValidator, LinkParam};
