//! # blockamp common library
//!
//! Shared code for the blockamp player:
//! - Error types
//! - Configuration loading (TOML bootstrap file, platform defaults)
//! - Filter bank file model (named IIR filters with per-sample-rate coefficients)

pub mod config;
pub mod error;
pub mod filter_bank;

pub use config::{DeviceKind, LoggingConfig, ScalingKind, TomlConfig};
pub use error::{Error, Result};
pub use filter_bank::{CoefficientSet, FilterBank, FilterDefinition};
