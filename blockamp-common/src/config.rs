//! Configuration loading and config file resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line arguments (handled by the binary)
//! 2. Environment variables (handled by the binary through clap's `env`)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! A missing config file is not an error: the player starts with defaults and
//! logs a warning. Only an explicitly requested file that cannot be read fails.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "BLOCKAMP_CONFIG";

/// Amplitude meter scaling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingKind {
    #[default]
    Linear,
    Logarithmic,
}

impl fmt::Display for ScalingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalingKind::Linear => write!(f, "linear"),
            ScalingKind::Logarithmic => write!(f, "logarithmic"),
        }
    }
}

impl FromStr for ScalingKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" | "lin" => Ok(ScalingKind::Linear),
            "logarithmic" | "log" => Ok(ScalingKind::Logarithmic),
            other => Err(format!("unknown scaling mode '{}' (expected linear or logarithmic)", other)),
        }
    }
}

/// Player control / visualization device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceKind {
    /// Text console: bar pattern as 0/1 characters, ENTER toggles playback
    #[default]
    Console,
    /// 16-LED bar attached through a device node
    LedBar,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Console => write!(f, "console"),
            DeviceKind::LedBar => write!(f, "led-bar"),
        }
    }
}

impl FromStr for DeviceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "console" => Ok(DeviceKind::Console),
            "led-bar" | "ledbar" | "led" => Ok(DeviceKind::LedBar),
            other => Err(format!("unknown device '{}' (expected console or led-bar)", other)),
        }
    }
}

/// Bootstrap configuration loaded from the TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Directory scanned for sound files
    #[serde(default = "default_sounds_dir")]
    pub sounds_dir: PathBuf,

    /// Filter bank file (optional, no IIR filters available without it)
    #[serde(default)]
    pub filters_file: Option<PathBuf>,

    /// Duration of one playback block in milliseconds
    ///
    /// Bounds pause latency: a key press is seen at most one block later.
    #[serde(default = "default_block_duration_ms")]
    pub block_duration_ms: u32,

    /// Sleep between toggle polls while paused, in milliseconds
    #[serde(default = "default_pause_poll_ms")]
    pub pause_poll_ms: u64,

    /// Amplitude meter scaling
    #[serde(default)]
    pub scaling: ScalingKind,

    /// Lower end of the logarithmic scale in dB (negative)
    #[serde(default = "default_log_db_floor")]
    pub log_db_floor: i8,

    /// Largest absolute sample value the meter expects
    #[serde(default = "default_meter_peak")]
    pub meter_peak: f32,

    /// Audio output device name (system default when unset)
    #[serde(default)]
    pub audio_device: Option<String>,

    /// Control / visualization device
    #[serde(default)]
    pub device: DeviceKind,

    /// Device node of the LED bar (only used with `device = "led-bar"`)
    #[serde(default)]
    pub led_device_path: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_sounds_dir() -> PathBuf {
    dirs::audio_dir().unwrap_or_else(|| PathBuf::from("./sounds"))
}

fn default_block_duration_ms() -> u32 {
    125
}

fn default_pause_poll_ms() -> u64 {
    5
}

fn default_log_db_floor() -> i8 {
    -30
}

fn default_meter_peak() -> f32 {
    2.0
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            sounds_dir: default_sounds_dir(),
            filters_file: None,
            block_duration_ms: default_block_duration_ms(),
            pause_poll_ms: default_pause_poll_ms(),
            scaling: ScalingKind::default(),
            log_db_floor: default_log_db_floor(),
            meter_peak: default_meter_peak(),
            audio_device: None,
            device: DeviceKind::default(),
            led_device_path: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Parse a config document and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading config file {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Resolve and load the config file, falling back to defaults.
    ///
    /// An explicit path (argument or `BLOCKAMP_CONFIG`) must exist. Without
    /// one, the platform locations are tried and defaults are used when none
    /// of them holds a file.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::load(Path::new(&path));
        }

        match platform_config_file() {
            Some(path) => Self::load(&path),
            None => {
                warn!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Number of frames in one playback block at the given sample rate
    ///
    /// Never less than one frame.
    pub fn block_frames(&self, sample_rate: u32) -> usize {
        let frames = sample_rate as u64 * self.block_duration_ms as u64 / 1000;
        frames.max(1) as usize
    }

    fn validate(&self) -> Result<()> {
        if self.block_duration_ms == 0 {
            return Err(Error::Config("block_duration_ms must be greater than 0".to_string()));
        }
        if self.log_db_floor > 0 {
            return Err(Error::Config(format!(
                "log_db_floor must not be positive (got {})",
                self.log_db_floor
            )));
        }
        if self.meter_peak.is_nan() || self.meter_peak <= 0.0 {
            return Err(Error::Config(format!(
                "meter_peak must be greater than 0 (got {})",
                self.meter_peak
            )));
        }
        if self.device == DeviceKind::LedBar && self.led_device_path.is_none() {
            return Err(Error::Config(
                "device 'led-bar' requires led_device_path".to_string(),
            ));
        }
        Ok(())
    }
}

/// First existing config file in the platform search order
///
/// Linux tries `~/.config/blockamp/config.toml` then `/etc/blockamp/config.toml`;
/// other platforms only the user config directory.
pub fn platform_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("blockamp").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/blockamp/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}
