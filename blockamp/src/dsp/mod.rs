//! Digital filters applied to playback blocks
//!
//! Filters are a closed set of variants dispatched with `match`; the engine
//! only sees [`Filter`].

pub mod delay;
pub mod iir;

pub use delay::DelayFilter;
pub use iir::IirFilter;

use crate::error::{Error, Result};
use blockamp_common::{FilterBank, FilterDefinition};
use std::fmt;

/// Numerator / denominator coefficients, normalized so that `a[0] == 1`
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCoefficients {
    b: Vec<f32>,
    a: Vec<f32>,
}

impl FilterCoefficients {
    /// Validate and normalize raw coefficients (divide everything by `a[0]`).
    ///
    /// # Errors
    /// `Configuration` if the arrays are empty, differ in length, or `a[0]` is zero.
    pub fn new(b: Vec<f32>, a: Vec<f32>) -> Result<Self> {
        if b.is_empty() || b.len() != a.len() {
            return Err(Error::Configuration(format!(
                "coefficient arrays must have equal, non-zero length (b={}, a={})",
                b.len(),
                a.len()
            )));
        }
        let a0 = a[0];
        if a0 == 0.0 {
            return Err(Error::Configuration("leading denominator coefficient is zero".to_string()));
        }

        Ok(Self {
            b: b.iter().map(|v| v / a0).collect(),
            a: a.iter().map(|v| v / a0).collect(),
        })
    }

    pub fn order(&self) -> usize {
        self.b.len() - 1
    }

    pub fn b(&self) -> &[f32] {
        &self.b
    }

    pub fn a(&self) -> &[f32] {
        &self.a
    }

    pub(crate) fn into_parts(self) -> (Vec<f32>, Vec<f32>) {
        (self.b, self.a)
    }
}

/// Provider of IIR coefficients for a sample rate
pub trait FilterCoefficientSource {
    /// Coefficients designed for `sample_rate`, `Ok(None)` if there are none
    fn coefficients(&self, sample_rate: u32) -> Result<Option<FilterCoefficients>>;
}

impl FilterCoefficientSource for FilterDefinition {
    fn coefficients(&self, sample_rate: u32) -> Result<Option<FilterCoefficients>> {
        self.coefficients_for(sample_rate)
            .map(|set| FilterCoefficients::new(set.b.clone(), set.a.clone()))
            .transpose()
    }
}

/// A filter ready to process blocks of one stream
#[derive(Debug, Clone)]
pub enum Filter {
    Iir(IirFilter),
    Delay(DelayFilter),
}

impl Filter {
    /// Filter `frames` interleaved frames; `false` if the block is rejected
    pub fn apply(&mut self, input: &[f32], output: &mut [f32], frames: usize) -> bool {
        match self {
            Filter::Iir(f) => f.apply(input, output, frames),
            Filter::Delay(f) => f.apply(input, output, frames),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Filter::Iir(f) => f.reset(),
            Filter::Delay(f) => f.reset(),
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            Filter::Iir(f) => f.channels(),
            Filter::Delay(f) => f.channels(),
        }
    }

    /// Smallest block (in frames) `apply` accepts
    pub fn min_frames(&self) -> usize {
        match self {
            Filter::Iir(f) => f.order(),
            Filter::Delay(_) => 1,
        }
    }
}

/// What the user picked, independent of the sound file's format.
///
/// Rebuilt into a [`Filter`] whenever the sound file changes.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterChoice {
    /// Named IIR filter from the filter bank
    Iir { name: String },
    Delay {
        delay_ms: u32,
        gain_ff: f32,
        gain_fb: f32,
    },
}

impl FilterChoice {
    /// Build the filter for a stream with the given format.
    ///
    /// # Errors
    /// - `Configuration` if an IIR choice is requested without a filter bank,
    ///   or the filter has no coefficients for `sample_rate`
    /// - `Common(NotFound)` if the named filter is not in the bank
    pub fn build(&self, bank: Option<&FilterBank>, sample_rate: u32, channels: usize) -> Result<Filter> {
        match self {
            FilterChoice::Iir { name } => {
                let bank = bank.ok_or_else(|| {
                    Error::Configuration("no filter bank loaded".to_string())
                })?;
                let definition = bank.get(name)?;
                let coefficients = definition.coefficients(sample_rate)?.ok_or_else(|| {
                    Error::Configuration(format!(
                        "filter '{}' has no coefficients for {} Hz",
                        name, sample_rate
                    ))
                })?;
                Ok(Filter::Iir(IirFilter::new(coefficients, channels)?))
            }
            FilterChoice::Delay {
                delay_ms,
                gain_ff,
                gain_fb,
            } => Ok(Filter::Delay(DelayFilter::new(
                *delay_ms,
                *gain_ff,
                *gain_fb,
                sample_rate,
                channels,
            )?)),
        }
    }
}

impl fmt::Display for FilterChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterChoice::Iir { name } => write!(f, "{}", name),
            FilterChoice::Delay {
                delay_ms,
                gain_ff,
                gain_fb,
            } => write!(f, "delay {} ms (g_ff={}, g_fb={})", delay_ms, gain_ff, gain_fb),
        }
    }
}
