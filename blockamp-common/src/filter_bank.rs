//! Filter bank file model
//!
//! A filter bank is a TOML document listing named IIR filters. Each filter
//! carries one coefficient set per sample rate it was designed for:
//!
//! ```toml
//! [[filter]]
//! name = "lowpass-2k"
//! kind = "lowpass"
//! info = "2 kHz Butterworth, order 2"
//!
//! [[filter.rate]]
//! sample_rate = 44100
//! b = [0.0160, 0.0320, 0.0160]
//! a = [1.0, -1.6124, 0.6765]
//! ```
//!
//! Coefficients are stored as designed; normalization by `a[0]` happens when
//! a filter is built from them.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Coefficients of one filter for one sample rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSet {
    pub sample_rate: u32,
    /// Numerator coefficients
    pub b: Vec<f32>,
    /// Denominator coefficients
    pub a: Vec<f32>,
}

impl CoefficientSet {
    /// Filter order (number of taps beyond the direct term)
    pub fn order(&self) -> usize {
        self.b.len().saturating_sub(1)
    }
}

/// One named filter with its coefficient sets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDefinition {
    pub name: String,

    /// Free-form filter type (lowpass, highpass, bandpass, ...)
    #[serde(default = "default_kind")]
    pub kind: String,

    #[serde(default)]
    pub info: Option<String>,

    #[serde(rename = "rate", default)]
    pub rates: Vec<CoefficientSet>,
}

fn default_kind() -> String {
    "iir".to_string()
}

impl FilterDefinition {
    /// Coefficient set designed for `sample_rate`, if any
    pub fn coefficients_for(&self, sample_rate: u32) -> Option<&CoefficientSet> {
        self.rates.iter().find(|set| set.sample_rate == sample_rate)
    }

    /// One-line description for listings
    pub fn describe(&self, sample_rate: u32) -> String {
        let order = self
            .coefficients_for(sample_rate)
            .map(|set| set.order().to_string())
            .unwrap_or_else(|| "-".to_string());
        match &self.info {
            Some(info) => format!("{} ({}, order={}) {}", self.name, self.kind, order, info),
            None => format!("{} ({}, order={})", self.name, self.kind, order),
        }
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Error::InvalidFilter {
            name: self.name.clone(),
            reason,
        };

        if self.rates.is_empty() {
            return Err(invalid("no coefficient sets".to_string()));
        }

        let mut seen = HashSet::new();
        for set in &self.rates {
            if !seen.insert(set.sample_rate) {
                return Err(invalid(format!("duplicate sample rate {}", set.sample_rate)));
            }
            if set.b.is_empty() || set.a.is_empty() {
                return Err(invalid(format!("empty coefficients at {} Hz", set.sample_rate)));
            }
            if set.b.len() != set.a.len() {
                return Err(invalid(format!(
                    "b has {} coefficients but a has {} at {} Hz",
                    set.b.len(),
                    set.a.len(),
                    set.sample_rate
                )));
            }
            if set.a[0] == 0.0 {
                return Err(invalid(format!("a[0] is zero at {} Hz", set.sample_rate)));
            }
        }
        Ok(())
    }
}

/// All filters of one filter bank file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterBank {
    #[serde(rename = "filter", default)]
    pub filters: Vec<FilterDefinition>,
}

impl FilterBank {
    /// Parse and validate a filter bank document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let bank: FilterBank = toml::from_str(content)?;

        let mut names = HashSet::new();
        for filter in &bank.filters {
            if !names.insert(filter.name.as_str()) {
                return Err(Error::InvalidFilter {
                    name: filter.name.clone(),
                    reason: "duplicate filter name".to_string(),
                });
            }
            filter.validate()?;
        }

        debug!("Filter bank holds {} filters", bank.filters.len());
        Ok(bank)
    }

    /// Load a filter bank file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Look up a filter by name
    pub fn get(&self, name: &str) -> Result<&FilterDefinition> {
        self.filters
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::NotFound(format!("filter '{}'", name)))
    }

    /// Filters that have coefficients for `sample_rate`, in file order
    pub fn available_for(&self, sample_rate: u32) -> Vec<&FilterDefinition> {
        self.filters
            .iter()
            .filter(|f| f.coefficients_for(sample_rate).is_some())
            .collect()
    }
}
