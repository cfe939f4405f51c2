//! # blockamp
//!
//! Console audio player that streams a sound file block by block through an
//! optional IIR or delay filter, shows the block amplitude on a 16-segment
//! bar and toggles pause/resume on a key press.
//!
//! **Architecture:** three threads at steady state. The foreground runs the
//! [`PlaybackEngine`] loop (symphonia decode, filter, cpal output); the
//! [`ControlSignalChannel`] runs one thread detecting key presses and one
//! writing console text.

pub mod audio;
pub mod control;
pub mod dsp;
pub mod error;
pub mod meter;
pub mod playback;

pub use audio::{AudioOutputPort, AudioSource, CpalDevice, Device, MemorySource, PlaybackState, SoundFile};
pub use control::{ConsoleDevice, ControlSignalChannel, ControlState, LedBarDevice, PlayerDevice};
pub use dsp::{DelayFilter, Filter, FilterChoice, FilterCoefficients, IirFilter};
pub use error::{Error, Result};
pub use meter::{AmpMeter, VisualizationSink};
pub use playback::{PlaybackEngine, PlaybackReport, Player, PlayerSettings, ToggleSource};
