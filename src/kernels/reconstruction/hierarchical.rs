// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Hierarchical Reconstruction** - *Graph-Ordered Conditional Sampling*
//!
//! Builds the dependency graph of a segmented source, splits it into
//! connected components, picks one root per component and computes the
//! exploration order from it. The orders are handed to a
//! [`HierarchicalSampler`], which resolves every draw conditionally.
//!
//! Root selection takes the first candidate root in discovery order. The
//! choice is deterministic; it is not tuned to reduce sampling bias.

use tracing::{debug, info};

use crate::config::{ReconstructionConfig, SamplerConfig};
use crate::errors::{ReconstructionError, Result};
use crate::kernels::graph::DependencyGraph;
use crate::kernels::reconstruction::fold_to_referents;
use crate::kernels::sampling::{ExplorationPlan, HierarchicalSampler, Sampler};
use crate::matrix::{DistributionMatrix, SegmentedMatrix};
use crate::model::attribute::AttributeRegistry;

/// One exploration plan per connected component of `graph`.
pub fn exploration_plans(graph: &DependencyGraph) -> Result<Vec<ExplorationPlan>> {
    let components = graph.connected_components();
    let mut plans = Vec::with_capacity(components.len());
    for component in &components {
        let root = graph.root_of(component)?;
        let order = graph.exploration_order(&root)?;
        debug!(root = %root, order = ?order, "component exploration order");
        plans.push(ExplorationPlan { root, order });
    }
    Ok(plans)
}

/// Folds `matrix` onto referents and computes its graph and plans.
///
/// # Errors
/// `UnsupportedReconstruction` when `matrix` has fewer than two inner matrices;
/// `IllegalDistributionCreation` when a local frequency table shares no
/// attribute with a joint source.
pub fn prepare(
    matrix: &dyn DistributionMatrix,
    registry: &AttributeRegistry,
) -> Result<(SegmentedMatrix, DependencyGraph, Vec<ExplorationPlan>)> {
    if !matrix.is_segmented() {
        return Err(ReconstructionError::unsupported(format!(
            "hierarchical sampling needs a segmented matrix, got {} inner matrix over {:?}",
            matrix.inner().len(),
            matrix.dimensions()
        )));
    }
    let folded = fold_to_referents(matrix, registry)?;
    folded.check_local_sources()?;
    let graph = DependencyGraph::from_matrix(&folded);
    let plans = exploration_plans(&graph)?;
    info!(
        attributes = graph.len(),
        edges = graph.edge_count(),
        components = plans.len(),
        "hierarchical exploration planned"
    );
    Ok((folded, graph, plans))
}

/// Builds the hierarchical sampler for `matrix`.
pub fn reconstruct(
    matrix: &dyn DistributionMatrix,
    registry: &AttributeRegistry,
    config: &SamplerConfig,
) -> Result<HierarchicalSampler> {
    let (folded, graph, plans) = prepare(matrix, registry)?;
    HierarchicalSampler::new(folded, &graph, plans, config)
}

/// [`reconstruct`] behind the common sampler contract.
pub fn sampler(
    matrix: &dyn DistributionMatrix,
    registry: &AttributeRegistry,
    config: &ReconstructionConfig,
) -> Result<Box<dyn Sampler>> {
    Ok(Box::new(reconstruct(matrix, registry, &config.sampler)?))
}
