//! Multi-channel IIR filter, direct form II transposed
//!
//! Filters interleaved blocks. For each frame k and channel c:
//!
//! ```text
//! y[k,c]   = b[0]*x[k,c] + z[0,c]
//! z[n-1,c] = b[n]*x[k,c] - a[n]*y[k,c] + z[n,c]     n = 1..=N
//! ```
//!
//! `z[N,c]` stays zero forever. The output is computed before the state
//! advances and stage n reads the not yet updated stage n+1, so the result is
//! bit-identical to a reference DF-II-T implementation with `f32` samples and
//! coefficients and `f64` state.

use super::FilterCoefficients;
use crate::error::{Error, Result};
use tracing::debug;

/// Recursive filter of fixed order over C interleaved channels
#[derive(Debug, Clone)]
pub struct IirFilter {
    /// Numerator, normalized by a[0]
    b: Vec<f32>,
    /// Denominator, normalized so a[0] == 1
    a: Vec<f32>,
    /// Delay values, stage-major: `z[n * channels + c]`, (order + 1) * channels
    z: Vec<f64>,
    order: usize,
    channels: usize,
}

impl IirFilter {
    /// Build a filter from normalized coefficients for `channels` channels.
    ///
    /// # Errors
    /// `Configuration` if the order (coefficient count - 1) or the channel
    /// count is zero.
    pub fn new(coefficients: FilterCoefficients, channels: usize) -> Result<Self> {
        let order = coefficients.order();
        if order == 0 || channels == 0 {
            return Err(Error::Configuration(format!(
                "filter order and channels must not be zero (order={}, channels={})",
                order, channels
            )));
        }

        let (b, a) = coefficients.into_parts();
        debug!("IIR filter created: order={}, channels={}", order, channels);

        Ok(Self {
            b,
            a,
            z: vec![0.0; (order + 1) * channels],
            order,
            channels,
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Clear all intermediate states
    pub fn reset(&mut self) {
        self.z.iter_mut().for_each(|z| *z = 0.0);
    }

    /// Filter `frames` interleaved frames from `input` into `output`.
    ///
    /// Returns `false` without touching the state when fewer than `order`
    /// frames are requested or either buffer holds fewer than
    /// `frames * channels` samples.
    pub fn apply(&mut self, input: &[f32], output: &mut [f32], frames: usize) -> bool {
        let len = frames * self.channels;
        if frames < self.order || input.len() < len || output.len() < len {
            return false;
        }

        let ch = self.channels;
        for k in (0..len).step_by(ch) {
            for c in 0..ch {
                output[k + c] = ((self.b[0] * input[k + c]) as f64 + self.z[c]) as f32;
            }
            for n in 1..=self.order {
                let cur = ch * (n - 1);
                let next = ch * n;
                for c in 0..ch {
                    let x = input[k + c];
                    let y = output[k + c];
                    self.z[cur + c] = (self.b[n] * x - self.a[n] * y) as f64 + self.z[next + c];
                }
            }
        }
        true
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &[f64] {
        &self.z
    }
}
