//! Common error types for blockamp

use thiserror::Error;

/// Common result type for blockamp operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the blockamp crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML document could not be parsed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filter bank entry is malformed
    #[error("Invalid filter '{name}': {reason}")]
    InvalidFilter { name: String, reason: String },

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}
