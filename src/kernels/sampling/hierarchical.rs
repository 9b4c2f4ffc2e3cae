// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Hierarchical Sampler** - *Conditional Draws along Exploration Orders*
//!
//! Draws one attribute at a time, per connected component, in the order
//! computed from the dependency graph. Each attribute is read from the inner
//! matrix that shares the most attributes with those already drawn (joint
//! sources win ties over local frequency tables, which only ever supply the
//! attributes they are not conditioned on), and its value is drawn
//! conditioned on the drawn values of those shared attributes.
//! When the drawn combination never occurs in that matrix, the attribute's
//! marginal in the same matrix is used instead.
//!
//! Components share no inner matrix and are drawn independently.

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use rand::rngs::StdRng;
use tracing::debug;

use crate::config::SamplerConfig;
use crate::errors::{ReconstructionError, Result};
use crate::kernels::graph::DependencyGraph;
use crate::kernels::sampling::{cumulate, search_cumulative, Sampler, SharedRng};
use crate::matrix::{DistributionMatrix, FullMatrix, MetaDataType, SegmentedMatrix};
use crate::model::attribute::{AttributeId, Value};
use crate::model::coordinate::Coordinate;

/// Root and visiting order of one connected component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorationPlan {
    /// First attribute drawn.
    pub root: AttributeId,
    /// Every attribute of the component, root first.
    pub order: Vec<AttributeId>,
}

#[derive(Debug, Clone)]
struct WeightTable {
    values: Vec<Value>,
    cumulative: Vec<f64>,
}

impl WeightTable {
    fn from_weights(weights: BTreeMap<Value, f64>) -> Option<Self> {
        let (values, w): (Vec<Value>, Vec<f64>) = weights.into_iter().filter(|(_, w)| *w > 0.0).unzip();
        if values.is_empty() {
            return None;
        }
        Some(WeightTable {
            values,
            cumulative: cumulate(&w),
        })
    }

    #[inline]
    fn pick(&self, rng: &mut StdRng) -> Value {
        self.values[search_cumulative(rng, &self.cumulative)].clone()
    }
}

#[derive(Debug, Clone)]
struct Step {
    attribute: AttributeId,
    source: usize,
    conditioning: Vec<AttributeId>,
    tables: AHashMap<Coordinate, WeightTable>,
    fallback: WeightTable,
}

impl Step {
    fn build(attribute: &AttributeId, source: usize, matrix: &FullMatrix, earlier: &[AttributeId]) -> Result<Self> {
        let conditioning: Vec<AttributeId> = matrix
            .dimensions()
            .iter()
            .filter(|d| earlier.contains(d))
            .cloned()
            .collect();

        let mut grouped: BTreeMap<Coordinate, BTreeMap<Value, f64>> = BTreeMap::new();
        let mut marginal: BTreeMap<Value, f64> = BTreeMap::new();
        for (coord, ctrl) in matrix.cells() {
            let w = ctrl.value();
            if !w.is_finite() || w < 0.0 {
                return Err(ReconstructionError::arguments(format!(
                    "hierarchical sampler: cell {} has weight {}",
                    coord, w
                )));
            }
            let Some(value) = coord.get(attribute) else { continue };
            *marginal.entry(value.clone()).or_insert(0.0) += w;
            if !conditioning.is_empty() {
                let key = coord.project(&conditioning)?;
                *grouped.entry(key).or_default().entry(value.clone()).or_insert(0.0) += w;
            }
        }

        let fallback = WeightTable::from_weights(marginal).ok_or_else(|| {
            ReconstructionError::illegal(format!(
                "hierarchical sampler: '{}' has no positive weight in its source",
                attribute
            ))
        })?;
        let tables = grouped
            .into_iter()
            .filter_map(|(key, weights)| WeightTable::from_weights(weights).map(|t| (key, t)))
            .collect();
        Ok(Step {
            attribute: attribute.clone(),
            source,
            conditioning,
            tables,
            fallback,
        })
    }

    fn pick(&self, drawn: &[Value], rng: &mut StdRng) -> Value {
        if self.conditioning.is_empty() {
            return self.fallback.pick(rng);
        }
        let key = Coordinate::from_unique(
            drawn
                .iter()
                .filter(|v| self.conditioning.contains(v.attribute()))
                .cloned()
                .collect(),
        );
        self.tables.get(&key).unwrap_or(&self.fallback).pick(rng)
    }
}

/// Sampler over a segmented matrix driven by dependency-graph exploration orders.
#[derive(Debug)]
pub struct HierarchicalSampler {
    matrix: SegmentedMatrix,
    plans: Vec<ExplorationPlan>,
    steps: Vec<Step>,
    rng: SharedRng,
}

impl HierarchicalSampler {
    /// Binds a sampler to `matrix` with one plan per connected component.
    ///
    /// # Errors
    /// `InvalidArguments` when the plans repeat or miss a dimension;
    /// `UnknownAttribute` for an attribute the graph does not hold;
    /// `IllegalDistributionCreation` when an attribute has no positive weight
    /// or a local frequency table shares no attribute with a joint source.
    pub fn new(
        matrix: SegmentedMatrix,
        graph: &DependencyGraph,
        plans: Vec<ExplorationPlan>,
        config: &SamplerConfig,
    ) -> Result<Self> {
        matrix.check_local_sources()?;
        let mut seen: AHashSet<AttributeId> = AHashSet::new();
        let mut steps = Vec::new();
        for plan in &plans {
            if plan.order.first() != Some(&plan.root) {
                return Err(ReconstructionError::arguments(format!(
                    "exploration order for root '{}' does not start with it",
                    plan.root
                )));
            }
            for (k, attribute) in plan.order.iter().enumerate() {
                if !seen.insert(attribute.clone()) {
                    return Err(ReconstructionError::arguments(format!(
                        "attribute '{}' appears in more than one exploration step",
                        attribute
                    )));
                }
                let earlier = &plan.order[..k];
                let source = best_source(&matrix, graph.sources_of(attribute)?, attribute, earlier)?;
                steps.push(Step::build(attribute, source, &matrix.inner()[source], earlier)?);
            }
        }
        if let Some(missing) = matrix.dimensions().iter().find(|d| !seen.contains(*d)) {
            return Err(ReconstructionError::arguments(format!(
                "attribute '{}' is not covered by any exploration plan",
                missing
            )));
        }
        for step in &steps {
            debug!(
                attribute = %step.attribute,
                source = step.source,
                conditioning = ?step.conditioning,
                tables = step.tables.len(),
                "hierarchical step"
            );
        }
        Ok(HierarchicalSampler {
            matrix,
            plans,
            steps,
            rng: SharedRng::from_config(config),
        })
    }

    /// Exploration plans, one per component.
    pub fn plans(&self) -> &[ExplorationPlan] {
        &self.plans
    }

    /// Attributes in the order they are drawn.
    pub fn draw_order(&self) -> Vec<&AttributeId> {
        self.steps.iter().map(|s| &s.attribute).collect()
    }

    /// Bound distribution.
    pub fn matrix(&self) -> &SegmentedMatrix {
        &self.matrix
    }

    fn pick(&self, rng: &mut StdRng) -> Coordinate {
        let mut drawn: Vec<Value> = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let v = step.pick(&drawn, rng);
            drawn.push(v);
        }
        Coordinate::from_unique(drawn)
    }
}

// Source for `attribute`: a local table never supplies an attribute it is
// conditioned on. Then the most attributes shared with `earlier`, then joint
// sources over local tables, then the first.
fn best_source(
    matrix: &SegmentedMatrix,
    candidates: &[usize],
    attribute: &AttributeId,
    earlier: &[AttributeId],
) -> Result<usize> {
    let inner = matrix.inner();
    candidates
        .iter()
        .copied()
        .filter(|&i| i < inner.len())
        .max_by_key(|&i| {
            let local = inner[i].metadata() == MetaDataType::LocalFrequencyTable;
            let supplies = !(local && matrix.conditioning_of(i).contains(attribute));
            let overlap = inner[i].dimensions().iter().filter(|d| earlier.contains(d)).count();
            (supplies, overlap, !local, std::cmp::Reverse(i))
        })
        .ok_or_else(|| ReconstructionError::arguments("hierarchical sampler: attribute has no source matrix"))
}

impl Sampler for HierarchicalSampler {
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
