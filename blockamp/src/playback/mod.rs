//! Playback engine and player session

pub mod engine;
pub mod player;

pub use engine::{PlaybackEngine, PlaybackReport, ToggleSource};
pub use player::{Player, PlayerSettings};
