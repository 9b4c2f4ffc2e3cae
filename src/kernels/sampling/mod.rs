// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Sampling Module** - *Drawing Cells from Resolved Distributions*
//!
//! A [`Sampler`] is bound to exactly one resolved distribution at
//! construction and draws [`Coordinate`]s from it. Draws are independent and
//! identically distributed given that distribution; the only mutable state is
//! the random source.
//!
//! ## Implementations
//! - **[`InverseCdfSampler`]**: binary search over cumulative controls
//! - **[`AliasSampler`]**: Vose alias tables, O(1) per draw
//! - **[`HierarchicalSampler`]**: attribute-by-attribute conditional draws
//!   along dependency-graph exploration orders
//!
//! ## Reproducibility
//! Every sampler owns one seedable [`SharedRng`]. `draw` consumes it directly.
//! `draw_n` first takes one seed per chunk of [`SamplerConfig::chunk_size`]
//! draws from it, in order, then draws each chunk from its own generator,
//! in parallel under the `parallel` feature. Output order is the chunk order,
//! so a given seed and chunk size always yield the same sequence.

pub mod alias;
pub mod hierarchical;
pub mod inverse_cdf;

pub use alias::AliasSampler;
pub use hierarchical::{ExplorationPlan, HierarchicalSampler};
pub use inverse_cdf::InverseCdfSampler;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::debug;

use crate::config::{SamplerConfig, SamplingStrategy};
use crate::errors::{ReconstructionError, Result};
use crate::matrix::{DistributionMatrix, FullMatrix};
use crate::model::coordinate::Coordinate;

/// Resolved, queryable distribution.
pub trait Sampler: Send + Sync {
    /// One draw.
    fn draw(&self) -> Coordinate;

    /// `n` draws. See the module docs for the determinism contract.
    fn draw_n(&self, n: usize) -> Vec<Coordinate>;

    /// Dump of the bound distribution.
    fn to_csv(&self, separator: char) -> Result<String>;
}

/// Seedable random source shared by all draws of one sampler.
#[derive(Debug)]
pub struct SharedRng {
    rng: Mutex<StdRng>,
    chunk_size: usize,
}

impl SharedRng {
    /// Source seeded from `config.seed`, or from the thread RNG when unset.
    pub fn from_config(config: &SamplerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        SharedRng {
            rng: Mutex::new(rng),
            chunk_size: config.chunk_size.max(1),
        }
    }

    /// Runs `f` with exclusive access to the generator.
    pub fn with<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut guard = self.rng.lock();
        f(&mut guard)
    }

    /// Draws `n` items with `draw_one`, chunked as described in the module docs.
    pub fn draw_chunked<T, F>(&self, n: usize, draw_one: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&mut StdRng) -> T + Sync,
    {
        let chunks: Vec<(usize, u64)> = self.with(|rng| {
            (0..n)
                .step_by(self.chunk_size)
                .map(|start| ((n - start).min(self.chunk_size), rng.random::<u64>()))
                .collect()
        });
        let run = |&(count, seed): &(usize, u64)| -> Vec<T> {
            let mut local = StdRng::seed_from_u64(seed);
            (0..count).map(|_| draw_one(&mut local)).collect()
        };
        #[cfg(feature = "parallel")]
        let parts: Vec<Vec<T>> = chunks.par_iter().map(run).collect();
        #[cfg(not(feature = "parallel"))]
        let parts: Vec<Vec<T>> = chunks.iter().map(run).collect();
        parts.into_iter().flatten().collect()
    }
}

/// Builds the full-matrix sampler selected by `config.strategy`.
pub fn build_sampler(matrix: FullMatrix, config: &SamplerConfig) -> Result<Box<dyn Sampler>> {
    debug!(strategy = ?config.strategy, cells = matrix.size(), "building sampler");
    Ok(match config.strategy {
        SamplingStrategy::InverseCdf => Box::new(InverseCdfSampler::new(matrix, config)?),
        SamplingStrategy::Alias => Box::new(AliasSampler::new(matrix, config)?),
    })
}

/// Positive-weight cells of `matrix` in deterministic order, with their total.
///
/// # Errors
/// `InvalidArguments` on a negative or non-finite control;
/// `IllegalDistributionCreation` when nothing has positive weight.
pub(crate) fn weighted_cells(matrix: &FullMatrix) -> Result<(Vec<Coordinate>, Vec<f64>, f64)> {
    let mut cells = Vec::with_capacity(matrix.size());
    let mut weights = Vec::with_capacity(matrix.size());
    let mut total = 0.0;
    for (coord, ctrl) in matrix.cells_sorted() {
        let w = ctrl.value();
        if !w.is_finite() || w < 0.0 {
            return Err(ReconstructionError::arguments(format!(
                "sampler: cell {} has weight {}",
                coord, w
            )));
        }
        if w == 0.0 {
            continue;
        }
        cells.push(coord.clone());
        weights.push(w);
        total += w;
    }
    if cells.is_empty() || total <= 0.0 {
        return Err(ReconstructionError::illegal(
            "sampler: distribution has no cell with positive weight",
        ));
    }
    Ok((cells, weights, total))
}

/// Index drawn from cumulative weights by inverse-CDF search.
#[inline]
pub(crate) fn search_cumulative<R: Rng + ?Sized>(rng: &mut R, cumulative: &[f64]) -> usize {
    let total = cumulative.last().copied().unwrap_or(0.0);
    let u = rng.random::<f64>() * total;
    cumulative
        .partition_point(|&c| c <= u)
        .min(cumulative.len().saturating_sub(1))
}

/// Running sums of `weights`.
pub(crate) fn cumulate(weights: &[f64]) -> Vec<f64> {
    let mut acc = 0.0;
    weights
        .iter()
        .map(|w| {
            acc += w;
            acc
        })
        .collect()
}
