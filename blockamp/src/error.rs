//! Error types for blockamp
//!
//! Every component signals its failures through this enum; nothing is
//! swallowed except the console channel's fallback to direct console I/O.

use thiserror::Error;

/// Main error type for the player library
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid filter order/channel count or mismatched buffer sizes
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operation invoked in the wrong lifecycle state
    #[error("Invalid state: {0}")]
    State(String),

    /// A background console thread could not be launched
    #[error("Thread start failed: {0}")]
    ThreadStart(String),

    /// Audio device could not be configured or acquired
    #[error("Audio device configuration error: {0}")]
    DeviceConfig(String),

    /// `play()` called on an opened but not started output port
    #[error("Audio device not started: call start() first")]
    DeviceNotStarted,

    /// Audio device failed while running
    #[error("Audio device error: {0}")]
    Device(String),

    /// Sound file decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// User input could not be interpreted
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File or console I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from the shared configuration / filter bank layer
    #[error(transparent)]
    Common(#[from] blockamp_common::Error),
}

/// Convenience Result type using the player Error
pub type Result<T> = std::result::Result<T, Error>;
