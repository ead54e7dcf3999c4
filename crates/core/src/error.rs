//! Core error types

use thiserror::Error;

/// Core error type for meshplan
#[derive(Debug, Error)]
pub enum CoreError {
    /// A configuration value is outside its accepted range
    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig {
        /// Dotted path of the offending field
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// A polarity code that does not name a polarity
    #[error("Unknown polarity code: {0}")]
    UnknownPolarity(u8),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
