//! Amplitude meter
//!
//! Maps the peak of a block onto a 16-segment bar. Segment i lights when the
//! value exceeds threshold i and all segments below it are lit.

use crate::control::device::BAR_SEGMENTS;
use blockamp_common::ScalingKind;

/// Receives every block the engine plays
pub trait VisualizationSink {
    /// Best effort; must not stall playback
    fn write(&mut self, block: &[f32]);
}

#[derive(Debug, Clone)]
pub struct AmpMeter {
    scaling: ScalingKind,
    /// Largest absolute input value
    peak: f32,
    thresholds: [f32; BAR_SEGMENTS],
}

impl AmpMeter {
    /// Meter for inputs within `-peak..=peak`.
    ///
    /// Linear thresholds are `i * peak / 16`. Logarithmic thresholds span
    /// `floor_db ..= 0 dB` relative to `peak` (`floor_db` is taken as negative).
    pub fn new(scaling: ScalingKind, peak: f32, floor_db: f32) -> Self {
        let peak = peak.abs();
        let floor = -floor_db.abs();
        let segments = BAR_SEGMENTS as f32;

        let mut thresholds = [0.0f32; BAR_SEGMENTS];
        for (i, threshold) in thresholds.iter_mut().enumerate() {
            let i = i as f32;
            *threshold = match scaling {
                ScalingKind::Linear => i * peak / segments,
                ScalingKind::Logarithmic => 10f32.powf((floor + i * floor.abs() / segments) / 20.0),
            };
        }

        Self {
            scaling,
            peak,
            thresholds,
        }
    }

    pub fn scaling(&self) -> ScalingKind {
        self.scaling
    }

    pub fn thresholds(&self) -> &[f32; BAR_SEGMENTS] {
        &self.thresholds
    }

    /// Largest absolute sample of a block
    pub fn block_value(block: &[f32]) -> f32 {
        block.iter().fold(0.0f32, |max, s| max.max(s.abs()))
    }

    /// Bar pattern for a linear amplitude value, bit 0 = lowest segment
    pub fn bar_pattern(&self, value: f32) -> u16 {
        let value = match self.scaling {
            // Peak normalization puts the loudest input at 0 dB
            ScalingKind::Logarithmic if self.peak > 0.0 => (value / self.peak).abs(),
            ScalingKind::Logarithmic => 0.0,
            ScalingKind::Linear => value.abs(),
        };

        let mut pattern = 0u16;
        for (i, threshold) in self.thresholds.iter().enumerate() {
            if value <= *threshold {
                break;
            }
            pattern |= 1 << i;
        }
        pattern
    }

    pub fn block_pattern(&self, block: &[f32]) -> u16 {
        self.bar_pattern(Self::block_value(block))
    }
}
