// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

// These parameters should rarely need adjustment.

//! # **Configuration** - *Runtime Behaviour Parameters*
//!
//! Compile-time defaults plus the serialisable [`ReconstructionConfig`] that
//! groups the tunables of each reconstruction algorithm and of the samplers.

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Default IPF convergence tolerance on the maximum relative marginal deviation.
pub const DEFAULT_IPF_TOLERANCE: f64 = 1e-6;

/// Default IPF iteration cap.
pub const DEFAULT_IPF_MAX_ITERATIONS: usize = 100;

/// Default upper bound on the Cartesian product enumerated by direct sampling.
///
/// Callers reconstructing over wide attribute sets should raise this
/// deliberately rather than by accident.
pub const DEFAULT_MAX_THEORETICAL_SIZE: u64 = 50_000_000;

/// Draws per chunk in `Sampler::draw_n`.
///
/// Each chunk gets its own seed taken from the shared source, so changing this
/// value changes the drawn sequence for a given seed.
pub const SAMPLER_CHUNK_SIZE: usize = 4_096;

/// Header of the control column in CSV dumps.
pub const CSV_VALUE_HEADER: &str = "value";

/// Tolerance under which a floating control is treated as zero.
pub const ZERO_EPSILON: f64 = 1e-12;

/// Inverse-CDF or alias table selection for full-matrix samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingStrategy {
    /// Binary search over cumulative weights. O(log n) per draw.
    #[default]
    InverseCdf,
    /// Vose alias tables. O(1) per draw, two extra tables in memory.
    Alias,
}

/// Iterative proportional fitting parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpfConfig {
    /// Hard iteration cap.
    pub max_iterations: usize,
    /// Stop once every marginal is within this relative deviation.
    pub tolerance: f64,
}

impl Default for IpfConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_IPF_MAX_ITERATIONS,
            tolerance: DEFAULT_IPF_TOLERANCE,
        }
    }
}

/// Sampler parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Seed for the shared random source. `None` seeds from the thread RNG.
    pub seed: Option<u64>,
    /// Full-matrix sampler implementation.
    pub strategy: SamplingStrategy,
    /// Draws per chunk in `draw_n`.
    pub chunk_size: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            seed: None,
            strategy: SamplingStrategy::default(),
            chunk_size: SAMPLER_CHUNK_SIZE,
        }
    }
}

impl SamplerConfig {
    /// Seeded configuration with default strategy.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }
}

/// Direct sampling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectConfig {
    /// Refuse to enumerate Cartesian products above this size.
    pub max_theoretical_size: u64,
}

impl Default for DirectConfig {
    fn default() -> Self {
        Self {
            max_theoretical_size: DEFAULT_MAX_THEORETICAL_SIZE,
        }
    }
}

/// Tunables for one reconstruction run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    /// IPF parameters.
    pub ipf: IpfConfig,
    /// Sampler parameters.
    pub sampler: SamplerConfig,
    /// Direct sampling parameters.
    pub direct: DirectConfig,
}

impl ReconstructionConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serialises to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
