// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! Inverse-CDF sampler over a full matrix.
//!
//! Cells are laid out in sorted coordinate order with their cumulative
//! controls; a draw is one uniform variate and one binary search.

use crate::config::SamplerConfig;
use crate::errors::Result;
use crate::kernels::sampling::{cumulate, search_cumulative, weighted_cells, Sampler, SharedRng};
use crate::matrix::{DistributionMatrix, FullMatrix};
use crate::model::coordinate::Coordinate;

/// Cumulative-weight sampler.
#[derive(Debug)]
pub struct InverseCdfSampler {
    matrix: FullMatrix,
    cells: Vec<Coordinate>,
    cumulative: Vec<f64>,
    rng: SharedRng,
}

impl InverseCdfSampler {
    /// Binds a sampler to `matrix`.
    ///
    /// # Errors
    /// `InvalidArguments` for negative controls,
    /// `IllegalDistributionCreation` when no cell has positive weight.
    pub fn new(matrix: FullMatrix, config: &SamplerConfig) -> Result<Self> {
        let (cells, weights, _) = weighted_cells(&matrix)?;
        let cumulative = cumulate(&weights);
        Ok(InverseCdfSampler {
            matrix,
            cells,
            cumulative,
            rng: SharedRng::from_config(config),
        })
    }

    /// Bound distribution.
    pub fn matrix(&self) -> &FullMatrix {
        &self.matrix
    }

    #[inline]
    fn pick(&self, rng: &mut rand::rngs::StdRng) -> Coordinate {
        self.cells[search_cumulative(rng, &self.cumulative)].clone()
    }
}

impl Sampler for InverseCdfSampler {
    fn draw(&self) -> Coordinate {
        self.rng.with(|rng| self.pick(rng))
    }

    fn draw_n(&self, n: usize) -> Vec<Coordinate> {
        self.rng.draw_chunked(n, |rng| self.pick(rng))
    }

    fn to_csv(&self, separator: char) -> Result<String> {
        self.matrix.to_csv(separator)
    }
}
