//! Blocking audio device seam
//!
//! [`AudioOutputPort`](super::output::AudioOutputPort) owns the lifecycle
//! rules; a device only has to do what it is told.

use crate::error::Result;

pub trait Device {
    /// Acquire the device for interleaved `f32` blocks of the given format
    fn open_device(&mut self, channels: usize, sample_rate: u32, frames_per_block: usize) -> Result<()>;

    /// Queue `frames` frames from `block`, blocking while the device is full
    fn write(&mut self, block: &[f32], frames: usize) -> Result<()>;

    fn start(&mut self) -> Result<()>;

    /// Let queued audio play out, then halt
    fn stop(&mut self) -> Result<()>;

    fn close_device(&mut self) -> Result<()>;

    /// Tear down the audio subsystem; the device is not used afterwards
    fn release(&mut self);
}
