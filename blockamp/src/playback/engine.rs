//! Block streaming loop
//!
//! One iteration while playing: read a block, filter it, play it, show it,
//! then poll the toggle source once. While paused only the poll runs. A
//! short read ends the session after that block has been played.

use crate::audio::{AudioOutputPort, AudioSource, Device};
use crate::dsp::Filter;
use crate::error::{Error, Result};
use crate::meter::VisualizationSink;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Non-blocking "key pressed since the last call" query
pub trait ToggleSource {
    fn key_toggled(&self) -> bool;
}

/// Counters of one playback session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    /// Blocks handed to the output port (including a short final block)
    pub blocks_played: usize,
    pub frames_played: u64,
    /// Source reads, the terminating short or empty read included
    pub reads: usize,
    pub pauses: usize,
    pub resumes: usize,
}

pub struct PlaybackEngine {
    frames_per_block: usize,
    pause_poll: Duration,
    filter: Option<Filter>,
}

impl PlaybackEngine {
    pub fn new(frames_per_block: usize, pause_poll: Duration) -> Self {
        Self {
            frames_per_block,
            pause_poll,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Option<Filter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn frames_per_block(&self) -> usize {
        self.frames_per_block
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Hand the filter back, with its state as left by the last session
    pub fn into_filter(self) -> Option<Filter> {
        self.filter
    }

    /// Play `source` through `port` until it is exhausted.
    ///
    /// The source must be open. The port is opened and started here; on
    /// success it is stopped, the source rewound and the port closed again.
    /// On error the port is closed and the error returned unchanged.
    ///
    /// # Errors
    /// - `Configuration` if the filter does not match the source's channel
    ///   count or needs longer blocks than `frames_per_block`
    /// - any error of the source, the filter or the port
    pub fn run<D: Device>(
        &mut self,
        source: &mut dyn AudioSource,
        port: &mut AudioOutputPort<D>,
        toggles: &dyn ToggleSource,
        sink: &mut dyn VisualizationSink,
    ) -> Result<PlaybackReport> {
        let channels = source.channels();
        self.check_format(channels)?;
        if let Some(filter) = self.filter.as_mut() {
            filter.reset();
        }

        port.open(channels, source.sample_rate(), self.frames_per_block)?;
        let streamed = port.start().and_then(|_| self.stream(source, port, toggles, sink));

        match streamed {
            Ok(report) => {
                port.stop()?;
                source.rewind()?;
                port.close()?;
                info!(
                    "Playback finished: {} blocks, {} frames, {} pauses",
                    report.blocks_played, report.frames_played, report.pauses
                );
                Ok(report)
            }
            Err(e) => {
                if let Err(close_err) = port.close() {
                    warn!("Failed to close output port after error: {}", close_err);
                }
                Err(e)
            }
        }
    }

    fn check_format(&self, channels: usize) -> Result<()> {
        if self.frames_per_block == 0 || channels == 0 {
            return Err(Error::Configuration(format!(
                "frames per block and channels must not be zero (frames={}, channels={})",
                self.frames_per_block, channels
            )));
        }
        if let Some(filter) = self.filter.as_ref() {
            if filter.channels() != channels {
                return Err(Error::Configuration(format!(
                    "filter has {} channels, source has {}",
                    filter.channels(),
                    channels
                )));
            }
            if filter.min_frames() > self.frames_per_block {
                return Err(Error::Configuration(format!(
                    "filter needs blocks of at least {} frames, got {}",
                    filter.min_frames(),
                    self.frames_per_block
                )));
            }
        }
        Ok(())
    }

    fn stream<D: Device>(
        &mut self,
        source: &mut dyn AudioSource,
        port: &mut AudioOutputPort<D>,
        toggles: &dyn ToggleSource,
        sink: &mut dyn VisualizationSink,
    ) -> Result<PlaybackReport> {
        let channels = source.channels();
        let block_len = self.frames_per_block * channels;
        let mut input = vec![0.0f32; block_len];
        let mut output = vec![0.0f32; block_len];

        let mut report = PlaybackReport::default();
        let mut playing = true;
        let mut last_read = block_len;

        debug!(
            "Streaming: {} frames per block, {} channels, filter={}",
            self.frames_per_block,
            channels,
            self.filter.is_some()
        );

        loop {
            if playing {
                last_read = source.read(&mut input)?;
                report.reads += 1;

                if last_read > 0 {
                    let frames = last_read / channels;
                    let block: &[f32] = match self.filter.as_mut() {
                        Some(filter) => {
                            // The tail of a short block is silence, never stale samples
                            input[last_read..].fill(0.0);
                            if !filter.apply(&input, &mut output, self.frames_per_block) {
                                return Err(Error::Configuration(
                                    "filter rejected the playback block".to_string(),
                                ));
                            }
                            &output[..last_read]
                        }
                        None => &input[..last_read],
                    };

                    port.play(block, frames)?;
                    sink.write(block);
                    report.blocks_played += 1;
                    report.frames_played += frames as u64;
                    trace!("Block {} played: {} frames", report.blocks_played, frames);
                }
            }

            if toggles.key_toggled() {
                if playing {
                    port.pause()?;
                    report.pauses += 1;
                    info!("Playback paused");
                } else {
                    port.resume()?;
                    report.resumes += 1;
                    info!("Playback resumed");
                }
                playing = !playing;
            }

            if last_read < block_len {
                break;
            }
            if !playing && !self.pause_poll.is_zero() {
                thread::sleep(self.pause_poll);
            }
        }

        Ok(report)
    }
}
