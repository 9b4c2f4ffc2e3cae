// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under the Mozilla Public License (MPL) 2.0.
// See LICENSE for details.

//! # **synthpop-kernels** - *Joint Distribution Reconstruction and Sampling*
//!
//! Reconstructs a joint count or frequency distribution over discrete
//! demographic attributes from partial, heterogeneous sources (samples,
//! contingency tables, local or global frequency tables), and draws
//! attribute-value combinations from it to synthesise populations.
//!
//! ## Layout
//! - **[`model`]**: attributes, values, coordinates and controls
//! - **[`matrix`]**: full and segmented distribution matrices
//! - **[`kernels::graph`]**: attribute dependency graph
//! - **[`kernels::reconstruction`]**: direct, hierarchical and IPF reconstruction
//! - **[`kernels::sampling`]**: samplers bound to resolved distributions
//!
//! ## Example
//! ```
//! use synthpop_kernels::prelude::*;
//!
//! let mut registry = AttributeRegistry::new();
//! registry.register_unique("sex", &["m", "f"]).unwrap();
//! let mut m = FullMatrix::new(
//!     vec![AttributeId::new("sex")],
//!     NumericKind::Integer,
//!     MetaDataType::ContingencyTable,
//! )
//! .unwrap();
//! for (v, n) in [("m", 3), ("f", 7)] {
//!     let c = Coordinate::new(vec![registry.value("sex", v).unwrap()]).unwrap();
//!     m.add_value(c, Control::Integer(n)).unwrap();
//! }
//! let sampler = build_sampler(m, &SamplerConfig::seeded(1)).unwrap();
//! assert_eq!(sampler.draw_n(10).len(), 10);
//! ```
//!
//! Parallel enumeration, IPF scaling and chunked draws are behind the
//! default `parallel` feature.

pub mod operators;

pub mod model {
    pub mod attribute;
    pub mod control;
    pub mod coordinate;
}

pub mod matrix;

pub mod kernels {
    pub mod graph;
    pub mod reconstruction;
    pub mod sampling;
}

pub mod config;

pub mod errors;

pub mod utils;

/// Common imports.
pub mod prelude {
    pub use crate::config::{
        DirectConfig, IpfConfig, ReconstructionConfig, SamplerConfig, SamplingStrategy,
    };
    pub use crate::errors::{ReconstructionError, Result};
    pub use crate::kernels::graph::DependencyGraph;
    pub use crate::kernels::reconstruction::ipf::{IpfFit, IpfTargets};
    pub use crate::kernels::sampling::{
        build_sampler, AliasSampler, ExplorationPlan, HierarchicalSampler, InverseCdfSampler,
        Sampler,
    };
    pub use crate::matrix::{DistributionMatrix, FullMatrix, MetaDataType, SegmentedMatrix};
    pub use crate::model::attribute::{
        Attribute, AttributeId, AttributeKind, AttributeRegistry, Value,
    };
    pub use crate::model::control::Control;
    pub use crate::model::coordinate::Coordinate;
    pub use crate::operators::{ArithmeticOperator, NumericKind};
}
