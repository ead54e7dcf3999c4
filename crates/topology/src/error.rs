//! Error types for topology snapshots and configuration stores.

use thiserror::Error;

/// Errors raised while building or querying topology state.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// Node referenced but not defined
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// Site referenced but not defined
    #[error("Unknown site: {0}")]
    UnknownSite(String),

    /// Link referenced but not defined
    #[error("Unknown link: {0}")]
    UnknownLink(String),

    /// Two entities of the same kind share a name
    #[error("Duplicate {kind} name: {name}")]
    DuplicateName {
        /// Entity kind
        kind: &'static str,
        /// Offending name
        name: String,
    },

    /// Link whose radio does not belong to its endpoint node
    #[error("Invalid link {link}: {reason}")]
    InvalidLink {
        /// Link name
        link: String,
        /// What is wrong with it
        reason: String,
    },

    /// Site coordinates outside the valid ranges
    #[error("Invalid location for site {site}: {reason}")]
    InvalidLocation {
        /// Site name
        site: String,
        /// Which coordinate is out of range
        reason: String,
    },

    /// Configuration value outside its domain
    #[error("Invalid {param} value {value} for {target}")]
    InvalidValue {
        /// Parameter being written
        param: &'static str,
        /// Rejected value
        value: String,
        /// Node/radio the write targeted
        target: String,
    },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for topology operations.
pub type TopologyResult<T> = Result<T, TopologyError>;
