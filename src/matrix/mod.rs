// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Distribution Matrices** - *Sparse N-Dimensional Joint Tables*
//!
//! Two variants share the [`DistributionMatrix`] contract:
//! - **[`FullMatrix`]**: one joint table over a fixed attribute set, sparse
//!   `Coordinate -> Control` storage
//! - **[`SegmentedMatrix`]**: full matrices over differing, possibly
//!   overlapping attribute sets; attributes never observed jointly are
//!   treated as conditionally independent
//!
//! Matrices are built by ingestion or by a reconstruction algorithm and are
//! read-only afterwards. Input changes mean a rebuild, never a patch.

pub mod full;
pub mod segmented;

pub use full::FullMatrix;
pub use segmented::SegmentedMatrix;

use crate::errors::Result;
use crate::model::attribute::{AttributeId, Value};
use crate::model::control::Control;
use crate::model::coordinate::Coordinate;

/// What the controls of a matrix mean.
///
/// Constrains which algorithms may consume the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaDataType {
    /// Observed joint counts of a sample.
    Sample,
    /// Contingency counts over a population.
    ContingencyTable,
    /// Frequencies normalised within rows (local to a conditioning value).
    LocalFrequencyTable,
    /// Frequencies normalised over the whole table.
    GlobalFrequencyTable,
}

/// Read contract shared by full and segmented matrices.
pub trait DistributionMatrix: Send + Sync {
    /// Union of dimensions, sorted by name.
    fn dimensions(&self) -> &[AttributeId];

    /// Meaning of the controls.
    fn metadata(&self) -> MetaDataType;

    /// Exact-match lookup; the matrix's zero when absent.
    ///
    /// # Errors
    /// `InvalidCoordinate` when `coordinate` does not cover every dimension.
    fn get_val(&self, coordinate: &Coordinate) -> Result<Control>;

    /// Sum of every stored control whose coordinate holds all of `values`.
    ///
    /// Full scan of the stored cells.
    fn get_marginal(&self, values: &[Value]) -> Result<Control>;

    /// Inner full matrices; a full matrix yields itself.
    fn inner(&self) -> &[FullMatrix];

    /// Number of stored cells.
    fn size(&self) -> usize;

    /// Flat dump: one column per dimension (sorted), then the control.
    fn to_csv(&self, separator: char) -> Result<String>;

    /// More than one inner matrix.
    fn is_segmented(&self) -> bool {
        self.inner().len() > 1
    }

    /// Segmented, or a single inner matrix that misses one of `dimensions`.
    fn is_segmented_for(&self, dimensions: &[AttributeId]) -> bool {
        match self.inner() {
            [single] => !dimensions.iter().all(|d| single.dimensions().contains(d)),
            _ => true,
        }
    }
}
