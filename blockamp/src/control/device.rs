//! Player control / visualization devices
//!
//! A device shows the amplitude bar and reports key presses. Both variants
//! take their key presses from the console channel.

use super::channel::ControlSignalChannel;
use super::lock;
use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Number of segments in the amplitude bar
pub const BAR_SEGMENTS: usize = 16;

pub trait PlayerDevice: Send + Sync {
    fn name(&self) -> &'static str;

    fn open(&self) -> Result<()>;

    fn close(&self);

    /// Show a bar pattern; bit 0 is the lowest segment
    fn write_levels(&self, pattern: u16) -> Result<()>;

    /// Key press since the last call. With `wait` set, block until the next one.
    fn key_pressed(&self, wait: bool) -> bool;

    fn status_text(&self, text: &str) -> Result<()>;
}

/// Render a pattern as 16 characters, highest segment first
pub fn bar_string(pattern: u16) -> String {
    (0..BAR_SEGMENTS)
        .rev()
        .map(|bit| if pattern & (1 << bit) != 0 { '1' } else { '0' })
        .collect()
}

fn wait_or_poll(channel: &ControlSignalChannel, wait: bool) -> bool {
    if !wait {
        return channel.key_toggled();
    }
    match channel.read_line() {
        Ok(_) => true,
        Err(e) => {
            warn!("No key press available: {}", e);
            false
        }
    }
}

/// Bar drawn on the console, rewritten in place with a carriage return
pub struct ConsoleDevice {
    channel: Arc<ControlSignalChannel>,
}

impl ConsoleDevice {
    pub fn new(channel: Arc<ControlSignalChannel>) -> Self {
        Self { channel }
    }
}

impl PlayerDevice for ConsoleDevice {
    fn name(&self) -> &'static str {
        "console"
    }

    fn open(&self) -> Result<()> {
        self.channel.open()
    }

    fn close(&self) {
        // The channel outlives the device
        if let Err(e) = self.channel.write_text("\n") {
            debug!("Could not end the bar line: {}", e);
        }
    }

    fn write_levels(&self, pattern: u16) -> Result<()> {
        let mut line = bar_string(pattern);
        line.push('\r');
        self.channel.write_text(&line)
    }

    fn key_pressed(&self, wait: bool) -> bool {
        wait_or_poll(&self.channel, wait)
    }

    fn status_text(&self, text: &str) -> Result<()> {
        self.channel.write_text(text)
    }
}

/// LED bar behind a character device node; each pattern is written as two
/// little-endian bytes
pub struct LedBarDevice {
    path: PathBuf,
    node: Mutex<Option<File>>,
    channel: Arc<ControlSignalChannel>,
}

impl LedBarDevice {
    pub fn new(path: impl AsRef<Path>, channel: Arc<ControlSignalChannel>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            node: Mutex::new(None),
            channel,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PlayerDevice for LedBarDevice {
    fn name(&self) -> &'static str {
        "led-bar"
    }

    fn open(&self) -> Result<()> {
        let mut node = lock(&self.node);
        if node.is_none() {
            let file = OpenOptions::new().write(true).open(&self.path).map_err(|e| {
                Error::DeviceConfig(format!("cannot open LED bar {}: {}", self.path.display(), e))
            })?;
            info!("LED bar opened: {}", self.path.display());
            *node = Some(file);
        }
        drop(node);
        self.channel.open()
    }

    fn close(&self) {
        let mut node = lock(&self.node);
        if let Some(mut file) = node.take() {
            // Leave the bar dark
            if let Err(e) = file.write_all(&0u16.to_le_bytes()) {
                debug!("Could not clear LED bar: {}", e);
            }
        }
    }

    fn write_levels(&self, pattern: u16) -> Result<()> {
        let mut node = lock(&self.node);
        let file = node
            .as_mut()
            .ok_or_else(|| Error::State("LED bar is not open".to_string()))?;
        file.write_all(&pattern.to_le_bytes())
            .map_err(|e| Error::Device(format!("LED bar write failed: {}", e)))
    }

    fn key_pressed(&self, wait: bool) -> bool {
        wait_or_poll(&self.channel, wait)
    }

    fn status_text(&self, text: &str) -> Result<()> {
        self.channel.write_text(text)
    }
}
