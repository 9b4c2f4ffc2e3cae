// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Alias Sampler** - *Constant-Time Draws*
//!
//! Vose's alias method. Construction is O(n) and keeps two tables of the
//! same length as the support; each draw costs one uniform index and one
//! uniform threshold regardless of the number of cells.

use rand::rngs::StdRng;
use rand::Rng;

use crate::config::SamplerConfig;
use crate::errors::Result;
use crate::kernels::sampling::{weighted_cells, Sampler, SharedRng};
use crate::matrix::{DistributionMatrix, FullMatrix};
use crate::model::coordinate::Coordinate;

/// Alias-table sampler.
#[derive(Debug)]
pub struct AliasSampler {
    matrix: FullMatrix,
    cells: Vec<Coordinate>,
    prob: Vec<f64>,
    alias: Vec<usize>,
    rng: SharedRng,
}

impl AliasSampler {
    /// Binds a sampler to `matrix`.
    ///
    /// # Errors
    /// Same as [`InverseCdfSampler::new`](super::InverseCdfSampler::new).
    pub fn new(matrix: FullMatrix, config: &SamplerConfig) -> Result<Self> {
        let (cells, weights, total) = weighted_cells(&matrix)?;
        let (prob, alias) = build_tables(&weights, total);
        Ok(AliasSampler {
            matrix,
            cells,
            prob,
            alias,
            rng: SharedRng::from_config(config),
        })
    }

    /// Bound distribution.
    pub fn matrix(&self) -> &FullMatrix {
        &self.matrix
    }

    #[inline]
    fn pick(&self, rng: &mut StdRng) -> Coordinate {
        let i = rng.random_range(0..self.prob.len());
        let j = if rng.random::<f64>() < self.prob[i] { i } else { self.alias[i] };
        self.cells[j].clone()
    }
}

/// Vose's construction. `weights` must be non-negative with positive `total`.
fn build_tables(weights: &[f64], total: f64) -> (Vec<f64>, Vec<usize>) {
    let n = weights.len();
    let mut prob = vec![0.0; n];
    let mut alias = vec![0usize; n];
    let mut scaled: Vec<f64> = weights.iter().map(|w| w * n as f64 / total).collect();
    let (mut small, mut large): (Vec<usize>, Vec<usize>) = (0..n).partition(|&i| scaled[i] < 1.0);

    while !small.is_empty() && !large.is_empty() {
        let (Some(s), Some(&l)) = (small.pop(), large.last()) else { break };
        prob[s] = scaled[s];
        alias[s] = l;
        scaled[l] = (scaled[l] + scaled[s]) - 1.0;
        if scaled[l] < 1.0 {
            large.pop();
            small.push(l);
        }
    }
    // Leftovers are 1 up to rounding.
    for i in large.into_iter().chain(small) {
        prob[i] = 1.0;
        alias[i] = i;
    }
    (prob, alias)
}

impl Sampler for AliasSampler {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn implied(prob: &[f64], alias: &[usize]) -> Vec<f64> {
        let n = prob.len() as f64;
        let mut out = vec![0.0; prob.len()];
        for i in 0..prob.len() {
            out[i] += prob[i] / n;
            out[alias[i]] += (1.0 - prob[i]) / n;
        }
        out
    }

    #[test]
    fn tables_reproduce_weights() {
        let w = [1.0, 2.0, 3.0, 4.0];
        let (prob, alias) = build_tables(&w, 10.0);
        let got = implied(&prob, &alias);
        for (g, e) in got.iter().zip(w.iter().map(|x| x / 10.0)) {
            assert!((g - e).abs() < 1e-12, "{g} vs {e}");
        }
    }

    #[test]
    fn uniform_weights_alias_to_self() {
        let (prob, alias) = build_tables(&[2.0; 5], 10.0);
        assert!(prob.iter().all(|&p| (p - 1.0).abs() < 1e-12));
        assert_eq!(alias, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn single_cell() {
        let (prob, alias) = build_tables(&[7.0], 7.0);
        assert_eq!(prob, vec![1.0]);
        assert_eq!(alias, vec![0]);
    }
}
