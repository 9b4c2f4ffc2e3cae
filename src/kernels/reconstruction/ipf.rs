// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Iterative Proportional Fitting** - *Seed Rescaling to Target Marginals*
//!
//! Rescales the joint shape of a seed sample until every target marginal is
//! matched. One iteration visits every target in order; for each it computes
//! the current marginal, derives one factor per marginal cell
//! (`target / current`, with `0/0` scaling by 1) and multiplies every seed
//! cell by the factor of the marginal cell it falls into.
//!
//! ## Properties
//! - Iterations run until the maximum relative deviation over all targets is
//!   below the tolerance, or the iteration cap is hit. Inconsistent targets
//!   stop at the cap and return the best achieved state.
//! - Controls never go negative.
//! - Support never grows: a cell the seed lacks stays zero, and a target cell
//!   with no seed support keeps a deviation of 1 forever.
//! - Iterations are sequential; scaling within an iteration runs in parallel
//!   under the `parallel` feature.

use ahash::AHashMap;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{info, trace, warn};

use crate::config::{IpfConfig, ReconstructionConfig};
use crate::errors::{ReconstructionError, Result};
use crate::kernels::sampling::{build_sampler, Sampler};
use crate::matrix::{DistributionMatrix, FullMatrix, MetaDataType};
use crate::model::attribute::AttributeId;
use crate::model::control::Control;
use crate::model::coordinate::Coordinate;
use crate::operators::NumericKind;
use crate::utils::{confirm_fit_params, relative_deviation, scale_factor};

/// Target marginals for one fit. Each target is a full matrix over a subset
/// (or, before projection, a superset) of the seed's dimensions.
#[derive(Debug, Clone, Default)]
pub struct IpfTargets {
    targets: Vec<FullMatrix>,
}

impl IpfTargets {
    /// No targets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one target marginal.
    pub fn with(mut self, target: FullMatrix) -> Self {
        self.targets.push(target);
        self
    }

    /// One one-dimensional target per dimension `joint` shares with `seed`.
    ///
    /// # Errors
    /// `InvalidArguments` when the two share no dimension.
    pub fn from_joint(joint: &FullMatrix, seed: &FullMatrix) -> Result<Self> {
        let mut targets = Vec::new();
        for d in joint.dimensions() {
            if seed.dimensions().contains(d) {
                targets.push(joint.project(std::slice::from_ref(d))?);
            }
        }
        if targets.is_empty() {
            return Err(ReconstructionError::arguments(format!(
                "ipf: joint target over {:?} shares no dimension with seed over {:?}",
                joint.dimensions(),
                seed.dimensions()
            )));
        }
        Ok(IpfTargets { targets })
    }

    /// Target marginals in fitting order.
    pub fn targets(&self) -> &[FullMatrix] {
        &self.targets
    }

    /// Number of targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether there is no target.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Outcome of a fit.
#[derive(Debug, Clone)]
pub struct IpfFit {
    /// Fitted real-valued matrix over the seed's dimensions.
    pub matrix: FullMatrix,
    /// Iterations performed.
    pub iterations: usize,
    /// Maximum relative marginal deviation of `matrix`.
    pub max_deviation: f64,
    /// Whether `max_deviation` is below the tolerance.
    pub converged: bool,
}

impl IpfFit {
    /// The fitted matrix, or `ConvergenceNotReached` when the cap was hit.
    pub fn require_convergence(self) -> Result<FullMatrix> {
        if self.converged {
            Ok(self.matrix)
        } else {
            Err(ReconstructionError::ConvergenceNotReached {
                iterations: self.iterations,
                deviation: self.max_deviation,
            })
        }
    }
}

/// One target flattened against the seed cells.
struct Marginal {
    dimensions: Vec<AttributeId>,
    /// Target control per marginal cell.
    target: Vec<f64>,
    /// Marginal cell of each seed cell.
    member_of: Vec<usize>,
}

impl Marginal {
    fn build(target: &FullMatrix, seed: &FullMatrix, cells: &[Coordinate]) -> Result<Self> {
        let shared: Vec<AttributeId> = target
            .dimensions()
            .iter()
            .filter(|d| seed.dimensions().contains(d))
            .cloned()
            .collect();
        if shared.is_empty() {
            return Err(ReconstructionError::arguments(format!(
                "ipf: target over {:?} shares no dimension with seed over {:?}",
                target.dimensions(),
                seed.dimensions()
            )));
        }
        let projected;
        let target = if shared.len() == target.dimensions().len() {
            target
        } else {
            projected = target.project(&shared)?;
            &projected
        };

        let mut index: AHashMap<Coordinate, usize> = AHashMap::new();
        let mut values = Vec::new();
        for (c, v) in target.cells_sorted() {
            if v.value() < 0.0 {
                return Err(ReconstructionError::arguments(format!(
                    "ipf: negative target {} at {}",
                    v, c
                )));
            }
            index.insert(c.clone(), values.len());
            values.push(v.value());
        }
        let mut member_of = Vec::with_capacity(cells.len());
        for c in cells {
            let key = c.project(&shared)?;
            let slot = match index.get(&key) {
                Some(&i) => i,
                None => {
                    // Unlisted marginal cell: target zero.
                    let i = values.len();
                    index.insert(key, i);
                    values.push(0.0);
                    i
                }
            };
            member_of.push(slot);
        }
        Ok(Marginal {
            dimensions: shared,
            target: values,
            member_of,
        })
    }

    fn current(&self, weights: &[f64]) -> Vec<f64> {
        let mut sums = vec![0.0; self.target.len()];
        for (w, &k) in weights.iter().zip(&self.member_of) {
            sums[k] += w;
        }
        sums
    }

    fn deviation(&self, weights: &[f64]) -> f64 {
        self.current(weights)
            .iter()
            .zip(&self.target)
            .map(|(&c, &t)| relative_deviation(c, t))
            .fold(0.0, f64::max)
    }

    fn rescale(&self, weights: &mut [f64]) {
        let factors: Vec<f64> = self
            .current(weights)
            .iter()
            .zip(&self.target)
            .map(|(&c, &t)| scale_factor(c, t))
            .collect();
        #[cfg(feature = "parallel")]
        weights
            .par_iter_mut()
            .zip(self.member_of.par_iter())
            .for_each(|(w, &k)| *w *= factors[k]);
        #[cfg(not(feature = "parallel"))]
        for (w, &k) in weights.iter_mut().zip(&self.member_of) {
            *w *= factors[k];
        }
    }
}

fn max_deviation(marginals: &[Marginal], weights: &[f64]) -> f64 {
    marginals.iter().map(|m| m.deviation(weights)).fold(0.0, f64::max)
}

/// Fits `seed` to `targets`.
///
/// # Errors
/// - `InvalidArguments` for bad parameters, no target, an empty or negative
///   seed, or a target sharing no dimension with the seed
/// - coordinate errors from projecting targets
pub fn fit(seed: &FullMatrix, targets: &IpfTargets, config: &IpfConfig) -> Result<IpfFit> {
    confirm_fit_params("ipf", config.tolerance, config.max_iterations)?;
    if targets.is_empty() {
        return Err(ReconstructionError::arguments("ipf: no target marginal"));
    }
    if seed.is_empty() {
        return Err(ReconstructionError::arguments("ipf: empty seed"));
    }

    let mut cells = Vec::with_capacity(seed.size());
    let mut weights = Vec::with_capacity(seed.size());
    for (c, v) in seed.cells_sorted() {
        if !v.value().is_finite() || v.value() < 0.0 {
            return Err(ReconstructionError::arguments(format!("ipf: seed cell {} holds {}", c, v)));
        }
        cells.push(c.clone());
        weights.push(v.value());
    }
    let marginals = targets
        .targets()
        .iter()
        .map(|t| Marginal::build(t, seed, &cells))
        .collect::<Result<Vec<_>>>()?;

    let mut iterations = 0;
    let mut deviation = max_deviation(&marginals, &weights);
    while deviation >= config.tolerance && iterations < config.max_iterations {
        for m in &marginals {
            m.rescale(&mut weights);
        }
        iterations += 1;
        deviation = max_deviation(&marginals, &weights);
        trace!(iteration = iterations, deviation, "ipf iteration");
    }
    let converged = deviation < config.tolerance;
    if converged {
        info!(iterations, deviation, "ipf converged");
    } else {
        warn!(
            iterations,
            deviation,
            targets = ?marginals.iter().map(|m| &m.dimensions).collect::<Vec<_>>(),
            "ipf stopped at iteration cap"
        );
    }

    let metadata = targets
        .targets()
        .first()
        .map(|t| t.metadata())
        .unwrap_or(MetaDataType::ContingencyTable);
    let mut matrix = FullMatrix::new(seed.dimensions().iter().cloned(), NumericKind::Real, metadata)?;
    for (c, w) in cells.into_iter().zip(weights) {
        if w > 0.0 {
            matrix.add_value(c, Control::Real(w))?;
        }
    }
    Ok(IpfFit {
        matrix,
        iterations,
        max_deviation: deviation,
        converged,
    })
}

/// Fits and binds the result to a full-matrix sampler. A fit that stops
/// at the iteration cap is still sampled.
pub fn sampler(seed: &FullMatrix, targets: &IpfTargets, config: &ReconstructionConfig) -> Result<Box<dyn Sampler>> {
    let fitted = fit(seed, targets, &config.ipf)?;
    build_sampler(fitted.matrix, &config.sampler)
}
