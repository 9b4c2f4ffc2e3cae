// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Dependency Graph** - *Attribute Co-occurrence Structure*
//!
//! Undirected graph over the dimensions of a (segmented) matrix: attributes
//! `a` and `b` are linked iff some inner full matrix holds both. Built once
//! from a matrix snapshot and never mutated.
//!
//! ## Traversal Rule
//! Nodes are numbered in discovery order (inner matrices in storage order,
//! joint sources before local frequency tables, dimensions sorted within
//! each). A component touched by a joint source is therefore rooted in one. An edge is read as pointing from its
//! earlier node to its later node, so the *candidate roots* of a component are
//! the nodes with no earlier neighbour. The first candidate is taken as root.
//! This tie-break is arbitrary: it favours determinism and makes no attempt
//! to pick the root that minimises sampling bias.

use std::collections::VecDeque;

use ahash::AHashMap;

use crate::errors::{ReconstructionError, Result};
use crate::matrix::DistributionMatrix;
use crate::model::attribute::AttributeId;

/// Co-occurrence graph over matrix dimensions.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<AttributeId>,
    index: AHashMap<AttributeId, usize>,
    adjacency: Vec<Vec<usize>>,
    sources: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Builds the graph of `matrix`'s inner full matrices.
    pub fn from_matrix(matrix: &dyn DistributionMatrix) -> Self {
        let mut graph = DependencyGraph {
            nodes: Vec::new(),
            index: AHashMap::new(),
            adjacency: Vec::new(),
            sources: Vec::new(),
        };
        for (m_idx, m) in matrix.inner().iter().enumerate() {
            let ids: Vec<usize> = m.dimensions().iter().map(|d| graph.intern(d)).collect();
            for &i in &ids {
                graph.sources[i].push(m_idx);
                for &j in &ids {
                    if i != j && !graph.adjacency[i].contains(&j) {
                        graph.adjacency[i].push(j);
                    }
                }
            }
        }
        for adj in &mut graph.adjacency {
            adj.sort_unstable();
        }
        graph
    }

    fn intern(&mut self, attribute: &AttributeId) -> usize {
        if let Some(&i) = self.index.get(attribute) {
            return i;
        }
        let i = self.nodes.len();
        self.nodes.push(attribute.clone());
        self.index.insert(attribute.clone(), i);
        self.adjacency.push(Vec::new());
        self.sources.push(Vec::new());
        i
    }

    fn position(&self, attribute: &AttributeId) -> Result<usize> {
        self.index
            .get(attribute)
            .copied()
            .ok_or_else(|| ReconstructionError::UnknownAttribute(attribute.name().to_string()))
    }

    /// Nodes in discovery order.
    pub fn nodes(&self) -> &[AttributeId] {
        &self.nodes
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no node.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(|a| a.len()).sum::<usize>() / 2
    }

    /// Whether `a` and `b` share an inner matrix.
    pub fn has_edge(&self, a: &AttributeId, b: &AttributeId) -> bool {
        match (self.index.get(a), self.index.get(b)) {
            (Some(&i), Some(&j)) => self.adjacency[i].contains(&j),
            _ => false,
        }
    }

    /// Neighbours of `attribute` in discovery order.
    pub fn neighbours(&self, attribute: &AttributeId) -> Result<Vec<&AttributeId>> {
        let i = self.position(attribute)?;
        Ok(self.adjacency[i].iter().map(|&j| &self.nodes[j]).collect())
    }

    /// Indices of the inner matrices holding `attribute`.
    pub fn sources_of(&self, attribute: &AttributeId) -> Result<&[usize]> {
        let i = self.position(attribute)?;
        Ok(&self.sources[i])
    }

    /// Partition of the nodes into connected components.
    ///
    /// Components are ordered by their first node; nodes within a component
    /// keep discovery order.
    pub fn connected_components(&self) -> Vec<Vec<AttributeId>> {
        let mut label = vec![usize::MAX; self.nodes.len()];
        let mut count = 0;
        for start in 0..self.nodes.len() {
            if label[start] != usize::MAX {
                continue;
            }
            let mut stack = vec![start];
            label[start] = count;
            while let Some(n) = stack.pop() {
                for &m in &self.adjacency[n] {
                    if label[m] == usize::MAX {
                        label[m] = count;
                        stack.push(m);
                    }
                }
            }
            count += 1;
        }
        let mut components = vec![Vec::new(); count];
        for (i, &l) in label.iter().enumerate() {
            components[l].push(self.nodes[i].clone());
        }
        components
    }

    /// Nodes of `component` with no neighbour discovered before them.
    pub fn candidate_roots(&self, component: &[AttributeId]) -> Result<Vec<AttributeId>> {
        let mut roots = Vec::new();
        for a in component {
            let i = self.position(a)?;
            if self.adjacency[i].iter().all(|&j| j > i) {
                roots.push(a.clone());
            }
        }
        Ok(roots)
    }

    /// First candidate root of `component`.
    pub fn root_of(&self, component: &[AttributeId]) -> Result<AttributeId> {
        self.candidate_roots(component)?
            .into_iter()
            .next()
            .ok_or_else(|| ReconstructionError::arguments("root_of: empty component"))
    }

    /// Breadth-first order from `root` over its component.
    ///
    /// Every attribute after the root has a co-occurring attribute earlier in
    /// the order.
    pub fn exploration_order(&self, root: &AttributeId) -> Result<Vec<AttributeId>> {
        let start = self.position(root)?;
        let mut seen = vec![false; self.nodes.len()];
        let mut order = Vec::new();
        let mut queue = VecDeque::from([start]);
        seen[start] = true;
        while let Some(n) = queue.pop_front() {
            order.push(self.nodes[n].clone());
            for &m in &self.adjacency[n] {
                if !seen[m] {
                    seen[m] = true;
                    queue.push_back(m);
                }
            }
        }
        Ok(order)
    }
}
