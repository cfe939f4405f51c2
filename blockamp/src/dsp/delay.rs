//! Feedback / feedforward delay filter (universal comb)
//!
//! ```text
//! v[n] = x[n] + g_fb * v[n-D]
//! y[n] = v[n] + g_ff * v[n-D]
//! ```
//!
//! `v` lives in one circular buffer of D frames per channel.

use crate::error::{Error, Result};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DelayFilter {
    /// Delay line, frame-major: `line[pos * channels + c]`
    line: Vec<f32>,
    /// Next frame slot to read (oldest) and overwrite
    pos: usize,
    delay_frames: usize,
    delay_ms: u32,
    gain_ff: f32,
    gain_fb: f32,
    channels: usize,
}

impl DelayFilter {
    /// Create a delay filter.
    ///
    /// # Errors
    /// `Configuration` if the channel count is zero, the delay rounds to zero
    /// frames at `sample_rate`, or the feedback gain is outside `0 <= g_fb < 1`.
    pub fn new(
        delay_ms: u32,
        gain_ff: f32,
        gain_fb: f32,
        sample_rate: u32,
        channels: usize,
    ) -> Result<Self> {
        if channels == 0 {
            return Err(Error::Configuration("delay filter needs at least one channel".to_string()));
        }
        if !(0.0..1.0).contains(&gain_fb) {
            return Err(Error::Configuration(format!(
                "feedback gain must satisfy 0 <= g_fb < 1 (got {})",
                gain_fb
            )));
        }

        let delay_frames = ((delay_ms as u64 * sample_rate as u64 + 500) / 1000) as usize;
        if delay_frames == 0 {
            return Err(Error::Configuration(format!(
                "delay of {} ms is shorter than one frame at {} Hz",
                delay_ms, sample_rate
            )));
        }

        debug!(
            "Delay filter created: {} ms = {} frames, g_ff={}, g_fb={}, channels={}",
            delay_ms, delay_frames, gain_ff, gain_fb, channels
        );

        Ok(Self {
            line: vec![0.0; delay_frames * channels],
            pos: 0,
            delay_frames,
            delay_ms,
            gain_ff,
            gain_fb,
            channels,
        })
    }

    pub fn delay_ms(&self) -> u32 {
        self.delay_ms
    }

    pub fn delay_frames(&self) -> usize {
        self.delay_frames
    }

    pub fn gain_ff(&self) -> f32 {
        self.gain_ff
    }

    pub fn gain_fb(&self) -> f32 {
        self.gain_fb
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn reset(&mut self) {
        self.line.iter_mut().for_each(|v| *v = 0.0);
        self.pos = 0;
    }

    /// Same contract as the IIR filter, with a minimum of one frame.
    pub fn apply(&mut self, input: &[f32], output: &mut [f32], frames: usize) -> bool {
        let len = frames * self.channels;
        if frames == 0 || input.len() < len || output.len() < len {
            return false;
        }

        let ch = self.channels;
        for k in (0..len).step_by(ch) {
            let slot = self.pos * ch;
            for c in 0..ch {
                let delayed = self.line[slot + c];
                let v = input[k + c] + self.gain_fb * delayed;
                output[k + c] = v + self.gain_ff * delayed;
                self.line[slot + c] = v;
            }
            self.pos = (self.pos + 1) % self.delay_frames;
        }
        true
    }
}
