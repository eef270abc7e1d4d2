//! Error types for the Floodgate service.

use thiserror::Error;

/// Main error type for Floodgate operations.
///
/// These surface only at startup and on the reporting paths; the decision
/// API itself never returns an error.
#[derive(Error, Debug)]
pub enum FloodgateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Coordination store errors
    #[error("Store error: {0}")]
    Store(#[from] redis::RedisError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Floodgate operations.
pub type Result<T> = std::result::Result<T, FloodgateError>;
