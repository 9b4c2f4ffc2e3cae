// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Direct Sampling** - *Independence-Hypothesis Reconstruction*
//!
//! Enumerates the Cartesian product of the referent attribute domains and
//! resolves every candidate coordinate against the (folded) source. Attributes
//! never observed jointly combine multiplicatively through the segmented
//! chain rule, i.e. they are assumed independent.
//!
//! ## Zero cells
//! A candidate whose control is zero is rewritten with the registry's
//! empty-correlate rules:
//! - if no rule fires (the rewrite equals the candidate) the zero is an
//!   implicit zero and nothing is written;
//! - otherwise the rewritten coordinate is looked up and, when non-zero,
//!   written at the rewritten coordinate. Several candidates may collapse
//!   onto the same rewritten coordinate; the first write wins and later ones
//!   are ignored, so the cell is counted once.
//!
//! ## Cost
//! The enumeration visits [`theoretical_size`] candidates. It is refused above
//! [`DirectConfig::max_theoretical_size`].

use ahash::AHashMap;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::{DirectConfig, ReconstructionConfig};
use crate::errors::{ReconstructionError, Result};
use crate::kernels::reconstruction::fold_to_referents;
use crate::kernels::sampling::{build_sampler, Sampler};
use crate::matrix::{DistributionMatrix, FullMatrix, MetaDataType, SegmentedMatrix};
use crate::model::attribute::{AttributeId, AttributeRegistry, Value};
use crate::model::control::Control;
use crate::model::coordinate::Coordinate;
use crate::operators::NumericKind;
use crate::utils::{cartesian_size, decode_mixed_radix};

/// Referent dimensions of `matrix` after folding.
pub fn referent_dimensions(matrix: &dyn DistributionMatrix, registry: &AttributeRegistry) -> Result<Vec<AttributeId>> {
    let mut dims = Vec::new();
    for d in matrix.dimensions() {
        let r = registry.referent_of(d)?;
        if let Err(pos) = dims.binary_search(&r) {
            dims.insert(pos, r);
        }
    }
    Ok(dims)
}

/// Number of candidate coordinates the enumeration of `matrix` visits.
pub fn theoretical_size(matrix: &dyn DistributionMatrix, registry: &AttributeRegistry) -> Result<u128> {
    let radices = referent_dimensions(matrix, registry)?
        .iter()
        .map(|d| registry.attribute(d).map(|a| a.domain_size()))
        .collect::<Result<Vec<_>>>()?;
    Ok(cartesian_size(&radices).unwrap_or(u128::MAX))
}

/// Reconstructs a full matrix over the referent attributes of `matrix`.
///
/// A non-segmented source keeps its controls' kind and metadata; a segmented
/// source yields real global frequencies.
///
/// # Errors
/// - `IllegalDistributionCreation` for a lone local frequency table
/// - `TheoreticalSizeExceeded` above `config.max_theoretical_size`
/// - lookup errors from the source
pub fn reconstruct(
    matrix: &dyn DistributionMatrix,
    registry: &AttributeRegistry,
    config: &DirectConfig,
) -> Result<FullMatrix> {
    if !matrix.is_segmented() && matrix.metadata() == MetaDataType::LocalFrequencyTable {
        return Err(ReconstructionError::illegal(
            "direct sampling: a lone local frequency table does not define a joint distribution",
        ));
    }

    let size = theoretical_size(matrix, registry)?;
    let limit = config.max_theoretical_size as u128;
    if size > limit {
        return Err(ReconstructionError::TheoreticalSizeExceeded { size, limit });
    }

    let source = fold_to_referents(matrix, registry)?;
    let dims = source.dimensions().to_vec();
    let domains: Vec<&[Value]> = dims
        .iter()
        .map(|d| registry.attribute(d).map(|a| a.values()))
        .collect::<Result<Vec<_>>>()?;
    let radices: Vec<usize> = domains.iter().map(|d| d.len()).collect();
    let candidates = usize::try_from(size).map_err(|_| ReconstructionError::TheoreticalSizeExceeded { size, limit })?;

    let (kind, metadata) = match source.inner() {
        [single] => (single.kind(), single.metadata()),
        _ => (NumericKind::Real, MetaDataType::GlobalFrequencyTable),
    };
    info!(
        dimensions = ?dims,
        theoretical_size = candidates,
        segmented = source.is_segmented(),
        "direct sampling enumeration"
    );

    let resolver = Resolver {
        source: &source,
        registry,
        domains: &domains,
        radices: &radices,
    };
    let cells = resolver.enumerate(candidates)?;

    let mut out = FullMatrix::new(dims, kind, metadata)?;
    let mut sorted: Vec<(Coordinate, Control)> = cells.into_iter().collect();
    sorted.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    for (c, v) in sorted {
        out.add_value(c, v)?;
    }
    debug!(cells = out.size(), total = out.total().value(), "direct sampling done");
    Ok(out)
}

/// Reconstructs and binds the result to a full-matrix sampler.
pub fn sampler(
    matrix: &dyn DistributionMatrix,
    registry: &AttributeRegistry,
    config: &ReconstructionConfig,
) -> Result<Box<dyn Sampler>> {
    let resolved = reconstruct(matrix, registry, &config.direct)?;
    build_sampler(resolved, &config.sampler)
}

// Thread-local cells plus the digit buffer reused across candidates.
#[cfg(feature = "parallel")]
type Partial = (AHashMap<Coordinate, Control>, Vec<usize>);

// Chain-rule frequencies can be tiny without being zero.
#[inline]
fn is_implicit_zero(control: &Control) -> bool {
    control.value() == 0.0
}

struct Resolver<'a> {
    source: &'a SegmentedMatrix,
    registry: &'a AttributeRegistry,
    domains: &'a [&'a [Value]],
    radices: &'a [usize],
}

impl Resolver<'_> {
    fn candidate(&self, index: usize, digits: &mut Vec<usize>) -> Coordinate {
        decode_mixed_radix(index, self.radices, digits);
        Coordinate::from_unique(
            digits
                .iter()
                .zip(self.domains)
                .map(|(&i, domain)| domain[i].clone())
                .collect(),
        )
    }

    /// Cell written for candidate `index`, if any.
    fn resolve(&self, index: usize, digits: &mut Vec<usize>) -> Result<Option<(Coordinate, Control)>> {
        let coord = self.candidate(index, digits);
        let control = self.source.get_val(&coord)?;
        if !is_implicit_zero(&control) {
            return Ok(Some((coord, control)));
        }
        let rewritten = self.registry.rewrite_empty_correlates(&coord)?;
        if rewritten == coord {
            return Ok(None);
        }
        let control = self.source.get_val(&rewritten)?;
        if is_implicit_zero(&control) {
            return Ok(None);
        }
        Ok(Some((rewritten, control)))
    }

    #[cfg(feature = "parallel")]
    fn enumerate(&self, candidates: usize) -> Result<AHashMap<Coordinate, Control>> {
        (0..candidates)
            .into_par_iter()
            .try_fold(
                || (AHashMap::new(), Vec::new()),
                |(mut acc, mut digits): Partial, i: usize| -> Result<Partial> {
                    if let Some((c, v)) = self.resolve(i, &mut digits)? {
                        acc.entry(c).or_insert(v);
                    }
                    Ok((acc, digits))
                },
            )
            .map(|r| r.map(|(acc, _)| acc))
            .try_reduce(AHashMap::new, |mut a, b| {
                for (c, v) in b {
                    a.entry(c).or_insert(v);
                }
                Ok(a)
            })
    }

    #[cfg(not(feature = "parallel"))]
    fn enumerate(&self, candidates: usize) -> Result<AHashMap<Coordinate, Control>> {
        let mut acc = AHashMap::new();
        let mut digits = Vec::new();
        for i in 0..candidates {
            if let Some((c, v)) = self.resolve(i, &mut digits)? {
                acc.entry(c).or_insert(v);
            }
        }
        Ok(acc)
    }
}
