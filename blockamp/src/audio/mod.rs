//! Audio sources and output

pub mod cpal_device;
pub mod decoder;
pub mod device;
pub mod output;
pub mod source;

pub use cpal_device::CpalDevice;
pub use decoder::{list_sounds, SoundFile, SoundInfo};
pub use device::Device;
pub use output::{AudioOutputPort, PlaybackState};
pub use source::{AudioSource, MemorySource};
