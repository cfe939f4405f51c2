//! Audio output port
//!
//! State machine around a blocking [`Device`]:
//!
//! ```text
//! NotReady --open--> Ready --start/resume--> Playing
//!    ^                 ^ <----stop/pause----    |
//!    +------close------+-----------close--------+
//! ```
//!
//! Repeating a transition into the current state is a no-op.

use super::device::Device;
use crate::error::{Error, Result};
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    NotReady,
    Ready,
    Playing,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::NotReady => write!(f, "not ready"),
            PlaybackState::Ready => write!(f, "ready"),
            PlaybackState::Playing => write!(f, "playing"),
        }
    }
}

pub struct AudioOutputPort<D: Device> {
    device: D,
    state: PlaybackState,
    channels: usize,
    sample_rate: u32,
    frames_per_block: usize,
}

impl<D: Device> AudioOutputPort<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            state: PlaybackState::NotReady,
            channels: 0,
            sample_rate: 0,
            frames_per_block: 0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames_per_block(&self) -> usize {
        self.frames_per_block
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Acquire the device.
    ///
    /// # Errors
    /// `DeviceConfig` if `frames_per_block` or `channels` is zero or the
    /// device cannot be acquired.
    pub fn open(&mut self, channels: usize, sample_rate: u32, frames_per_block: usize) -> Result<()> {
        if self.state != PlaybackState::NotReady {
            debug!("open() ignored, port is {}", self.state);
            return Ok(());
        }
        if frames_per_block == 0 || channels == 0 {
            return Err(Error::DeviceConfig(format!(
                "frames per block and channels must not be zero (frames={}, channels={})",
                frames_per_block, channels
            )));
        }

        self.device.open_device(channels, sample_rate, frames_per_block)?;
        self.channels = channels;
        self.sample_rate = sample_rate;
        self.frames_per_block = frames_per_block;
        self.state = PlaybackState::Ready;

        info!(
            "Output port opened: {} Hz, {} channels, {} frames per block",
            sample_rate, channels, frames_per_block
        );
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::NotReady => Err(Error::State("start() on a port that is not open".to_string())),
            PlaybackState::Playing => Ok(()),
            PlaybackState::Ready => {
                self.device.start()?;
                self.state = PlaybackState::Playing;
                debug!("Output port playing");
                Ok(())
            }
        }
    }

    /// Write `frames` frames of `block` to the device, blocking until queued.
    ///
    /// # Errors
    /// - `State` if the port is not open
    /// - `DeviceNotStarted` if it is open but not started
    /// - `Configuration` if `block` is shorter than `frames` frames
    pub fn play(&mut self, block: &[f32], frames: usize) -> Result<()> {
        match self.state {
            PlaybackState::NotReady => Err(Error::State("play() on a port that is not open".to_string())),
            PlaybackState::Ready => Err(Error::DeviceNotStarted),
            PlaybackState::Playing => {
                if block.len() < frames * self.channels {
                    return Err(Error::Configuration(format!(
                        "block holds {} samples, {} frames of {} channels requested",
                        block.len(),
                        frames,
                        self.channels
                    )));
                }
                self.device.write(block, frames)
            }
        }
    }

    pub fn stop(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::NotReady => Err(Error::State("stop() on a port that is not open".to_string())),
            PlaybackState::Ready => Ok(()),
            PlaybackState::Playing => {
                self.device.stop()?;
                self.state = PlaybackState::Ready;
                debug!("Output port stopped");
                Ok(())
            }
        }
    }

    pub fn pause(&mut self) -> Result<()> {
        self.stop()
    }

    pub fn resume(&mut self) -> Result<()> {
        self.start()
    }

    /// Stop if needed and give the device back. The port ends up `NotReady`
    /// even when stopping fails.
    pub fn close(&mut self) -> Result<()> {
        if self.state == PlaybackState::NotReady {
            return Ok(());
        }

        let stopped = self.stop();
        let closed = self.device.close_device();
        self.state = PlaybackState::NotReady;
        info!("Output port closed");

        stopped.and(closed)
    }
}

impl<D: Device> Drop for AudioOutputPort<D> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close output port: {}", e);
        }
        self.device.release();
    }
}
