// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Reconstruction Module** - *From Partial Sources to Samplers*
//!
//! Three strategies turn partial, heterogeneous statistical sources into a
//! resolved distribution bound to a [`Sampler`](crate::kernels::sampling::Sampler):
//!
//! - **[`direct`]**: independence-hypothesis enumeration of the referent
//!   Cartesian product into one full matrix
//! - **[`hierarchical`]**: dependency-graph exploration orders driving a
//!   conditional attribute-by-attribute sampler
//! - **[`ipf`]**: iterative proportional fitting of a seed sample to target
//!   marginals
//!
//! Inputs mentioning aggregated or record attributes are first folded onto
//! their referents with [`fold_to_referents`].

pub mod direct;
pub mod hierarchical;
pub mod ipf;

use ahash::AHashMap;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::matrix::{DistributionMatrix, FullMatrix, SegmentedMatrix};
use crate::model::attribute::{AttributeId, AttributeKind, AttributeRegistry, Value};
use crate::model::control::Control;
use crate::model::coordinate::Coordinate;
use crate::operators::NumericKind;

/// How one source dimension is carried onto the referent dimensions.
enum Fold {
    Keep,
    Map(AttributeId),
    SumOut,
}

/// Rewrites one full matrix over referent attributes only.
///
/// Referent dimensions are kept. An aggregated dimension is mapped onto its
/// referent by spreading each cell uniformly over the referent values its
/// group covers, which makes the result real-valued. A record dimension is
/// renamed onto its referent. A re-expression whose referent is already
/// carried by the matrix, or by an earlier re-expression, is summed out.
pub fn fold_matrix(matrix: &FullMatrix, registry: &AttributeRegistry) -> Result<FullMatrix> {
    let mut plan = Vec::with_capacity(matrix.dimensions().len());
    let mut claimed: Vec<AttributeId> = Vec::new();
    for d in matrix.dimensions() {
        if registry.attribute(d)?.is_referent() {
            claimed.push(d.clone());
        }
    }
    let mut spreads = false;
    for d in matrix.dimensions() {
        let attribute = registry.attribute(d)?;
        let step = if attribute.is_referent() {
            Fold::Keep
        } else if claimed.contains(attribute.referent()) {
            Fold::SumOut
        } else {
            claimed.push(attribute.referent().clone());
            spreads |= matches!(attribute.kind(), AttributeKind::Aggregated { .. });
            Fold::Map(attribute.referent().clone())
        };
        plan.push(step);
    }
    if plan.iter().all(|s| matches!(s, Fold::Keep)) {
        return Ok(matrix.clone());
    }

    let kind = if spreads { NumericKind::Real } else { matrix.kind() };
    let mut cells: AHashMap<Coordinate, Control> = AHashMap::new();
    for (coord, ctrl) in matrix.cells() {
        // Per dimension: the referent values this cell spreads over.
        let mut options: Vec<Vec<Value>> = Vec::with_capacity(plan.len());
        for (value, step) in coord.values().iter().zip(&plan) {
            match step {
                Fold::Keep => options.push(vec![value.clone()]),
                Fold::Map(_) => options.push(registry.referent_values(value)?),
                Fold::SumOut => {}
            }
        }
        let share = options.iter().map(|o| o.len()).product::<usize>();
        if share == 0 {
            continue;
        }
        let weight = if spreads {
            Control::Real(ctrl.value() / share as f64)
        } else {
            *ctrl
        };
        for combination in cartesian(&options) {
            let key = Coordinate::new(combination)?;
            let slot = cells.entry(key).or_insert_with(|| Control::zero(kind));
            *slot = *slot + weight;
        }
    }

    let dims: Vec<AttributeId> = matrix
        .dimensions()
        .iter()
        .zip(&plan)
        .filter_map(|(d, step)| match step {
            Fold::Keep => Some(d.clone()),
            Fold::Map(r) => Some(r.clone()),
            Fold::SumOut => None,
        })
        .collect();
    let mut out = FullMatrix::new(dims, kind, matrix.metadata())?;
    for (c, v) in cells {
        out.add_value(c, v)?;
    }
    debug!(
        from = ?matrix.dimensions(),
        to = ?out.dimensions(),
        cells = out.size(),
        "folded matrix onto referents"
    );
    Ok(out)
}

/// Folds every inner matrix of `matrix` onto referent attributes.
///
/// Inner matrices that fold onto the dimension set of an earlier one are
/// dropped in its favour.
pub fn fold_to_referents(matrix: &dyn DistributionMatrix, registry: &AttributeRegistry) -> Result<SegmentedMatrix> {
    let mut folded: Vec<FullMatrix> = Vec::with_capacity(matrix.inner().len());
    for m in matrix.inner() {
        let f = fold_matrix(m, registry)?;
        if folded.iter().any(|g| g.dimensions() == f.dimensions()) {
            warn!(dimensions = ?f.dimensions(), "folded source duplicates an earlier one; keeping the earlier");
            continue;
        }
        folded.push(f);
    }
    SegmentedMatrix::new(folded)
}

fn cartesian(options: &[Vec<Value>]) -> Vec<Vec<Value>> {
    options.iter().fold(vec![Vec::new()], |acc, choices| {
        acc.into_iter()
            .flat_map(|prefix| {
                choices.iter().map(move |c| {
                    let mut next = prefix.clone();
                    next.push(c.clone());
                    next
                })
            })
            .collect()
    })
}
