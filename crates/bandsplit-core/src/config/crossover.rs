//! Crossover layout and host stream configuration
//!
//! Stored as YAML alongside the rest of an application's settings:
//!
//! ```yaml
//! num_bands: 4
//! crossover_frequencies: [120.0, 1000.0, 6000.0]
//! sample_rate: 48000.0
//! max_block_size: 1024
//! channels: 2
//! muted: [2]
//! soloed: []
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{
    DEFAULT_BANDS, DEFAULT_CROSSOVERS, DEFAULT_SAMPLE_RATE, MAX_BANDS, MAX_CHANNELS, MIN_BANDS,
};

/// Default host block size in frames
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 1024;

/// Errors found while validating a [`CrossoverConfig`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Band count outside the supported range
    #[error("Band count {0} outside {min}..={max}", min = MIN_BANDS, max = MAX_BANDS)]
    InvalidBandCount(usize),

    /// Fewer crossover frequencies than boundaries
    #[error("{bands} bands need {needed} crossover frequencies, got {got}")]
    TooFewCrossovers {
        bands: usize,
        needed: usize,
        got: usize,
    },

    /// Crossover frequencies not in ascending order
    #[error("Crossover frequencies must be ascending (index {0} is lower than its predecessor)")]
    UnsortedCrossovers(usize),

    /// Sample rate that is not a positive finite number
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(f32),
}

/// Host stream settings handed to `CrossoverEngine::prepare`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Sample rate in Hz
    pub sample_rate: f32,
    /// Largest buffer the host will pass, in frames
    pub max_block_size: usize,
    /// Channel count (1 or 2)
    pub channels: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            channels: MAX_CHANNELS,
        }
    }
}

/// Persisted crossover layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossoverConfig {
    /// Number of active bands
    pub num_bands: usize,
    /// Boundary frequencies in Hz, lowest first (extra entries are ignored)
    pub crossover_frequencies: Vec<f32>,
    pub sample_rate: f32,
    pub max_block_size: usize,
    pub channels: usize,
    /// Indices of muted bands
    pub muted: Vec<usize>,
    /// Indices of soloed bands
    pub soloed: Vec<usize>,
}

impl Default for CrossoverConfig {
    fn default() -> Self {
        Self {
            num_bands: DEFAULT_BANDS,
            crossover_frequencies: DEFAULT_CROSSOVERS[..DEFAULT_BANDS - 1].to_vec(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            channels: MAX_CHANNELS,
            muted: Vec::new(),
            soloed: Vec::new(),
        }
    }
}

impl CrossoverConfig {
    /// Check the layout is usable as-is
    ///
    /// Frequencies outside the audible range are not an error; the engine
    /// clamps them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_BANDS..=MAX_BANDS).contains(&self.num_bands) {
            return Err(ConfigError::InvalidBandCount(self.num_bands));
        }

        let needed = self.num_bands - 1;
        if self.crossover_frequencies.len() < needed {
            return Err(ConfigError::TooFewCrossovers {
                bands: self.num_bands,
                needed,
                got: self.crossover_frequencies.len(),
            });
        }

        let used = &self.crossover_frequencies[..needed];
        if let Some(i) = used.windows(2).position(|w| !(w[0] <= w[1])) {
            return Err(ConfigError::UnsortedCrossovers(i + 1));
        }

        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }

        Ok(())
    }

    /// Host stream settings from this config
    pub fn host(&self) -> HostConfig {
        HostConfig {
            sample_rate: self.sample_rate,
            max_block_size: self.max_block_size,
            channels: self.channels.clamp(1, MAX_CHANNELS),
        }
    }
}
