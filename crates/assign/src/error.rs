//! Error types for resource assignment.

use meshplan_topology::TopologyError;
use thiserror::Error;

/// Errors raised by network-wide assignment before any state is written.
#[derive(Debug, Error)]
pub enum AssignError {
    /// Links of one group carry different channels
    #[error("Incompatible assigned channel for link: {link}")]
    IncompatibleChannel {
        /// First link found to disagree
        link: String,
    },

    /// Links of one group carry different Golay codes
    #[error("Incompatible assigned golay for link: {link}")]
    IncompatibleGolay {
        /// First link found to disagree
        link: String,
    },

    /// Siblings on a radio already use both control superframe slots
    #[error("Impossible to allocate control superframe for `{link}`.")]
    ImpossibleControlSuperframe {
        /// Link that could not be given a slot
        link: String,
    },

    /// The computed control superframe contradicts an operator override
    #[error("Unable to respect user configured control superframe for: {link}")]
    UserControlSuperframeConflict {
        /// Link whose override would change
        link: String,
    },

    /// The computed polarities contradict operator overrides
    #[error("Unable to respect user polarity config at: {}", .macs.join(", "))]
    UserPolarityConflict {
        /// Radios whose override would change
        macs: Vec<String>,
    },

    /// Polarity propagation hit odd cycles that hybrid sites cannot break
    #[error("Polarity optimization failed: {}", .messages.join("; "))]
    UnsolvableOddCycle {
        /// One message per conflicting radio
        messages: Vec<String>,
    },

    /// Configuration store rejected a read or write
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// Result type for assignment operations.
pub type AssignResult<T> = Result<T, AssignError>;
