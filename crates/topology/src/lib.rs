//! meshplan Topology - network snapshots and configuration layers
//!
//! Provides the read-only topology view and the layered configuration
//! store that every planner algorithm works against, plus the small graph
//! type and link grouping shared by those algorithms.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use meshplan_topology::{InMemoryConfigStore, LinkGroupHelper, Topology};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let json = std::fs::read_to_string("topology.json")?;
//! let topology = Topology::from_json(&json)?;
//! let groups = LinkGroupHelper::get_link_groups(&topology);
//! println!("{} link groups", groups.len());
//!
//! let config = InMemoryConfigStore::default();
//! # let _ = config;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config_store;
pub mod error;
pub mod geo;
pub mod graph;
pub mod link_group;
pub mod model;
pub mod topology;
pub mod view;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export main types
pub use config_store::{
    ConfigDocument, ConfigLayer, ConfigStore, InMemoryConfigStore, LayerOverrides, LinkParams,
    MacToPolarity, NodeOverrides, RadioParams, ReadMode,
};
pub use error::{TopologyError, TopologyResult};
pub use geo::{approx_distance, compute_angle};
pub use graph::Graph;
pub use link_group::{GroupNameToLinkNames, LinkGroupHelper};
pub use model::{link_name, standardize_mac, Link, Node, Site};
pub use topology::{Topology, TopologyDocument};
pub use view::TopologyView;
