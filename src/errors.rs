// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Error Types** - *Reconstruction Error Handling*
//!
//! Error types for distribution construction, reconstruction and sampling.
//! Construction-time invariant violations surface immediately through these
//! variants; numeric edge cases (0/0 scale factors, empty-correlate zero cells)
//! are resolved by documented default policies and never reach this enum.
//!
//! ## Error Categories
//! - **Coordinate Errors**: Duplicate attributes, dimension mismatches on lookup
//! - **Control Errors**: Numeric kind mismatches, conflicting totals on merge
//! - **Reconstruction Errors**: Illegal or unsupported algorithm inputs
//! - **Convergence Errors**: IPF iteration cap reached before tolerance
//! - **Registry Errors**: Unknown attributes or values
//! - **Export Errors**: CSV and configuration (de)serialisation failures

use thiserror::Error;

/// Result type alias for reconstruction operations.
pub type Result<T> = std::result::Result<T, ReconstructionError>;

/// Error type for all reconstruction operations.
///
/// Each message variant carries a contextual string naming the offending
/// attribute, coordinate or matrix.
#[derive(Error, Debug)]
pub enum ReconstructionError {
    /// Coordinate built with a repeated attribute, or looked up against a
    /// matrix whose dimensions it does not cover.
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// Control of a foreign numeric kind inserted into a matrix, or two
    /// matrices with conflicting cells combined.
    #[error("incompatible control totals: {0}")]
    IncompatibleControlTotals(String),

    /// The input distribution cannot legally feed the requested algorithm.
    #[error("illegal distribution creation: {0}")]
    IllegalDistributionCreation(String),

    /// The algorithm does not support this shape of distribution.
    #[error("unsupported reconstruction: {0}")]
    UnsupportedReconstruction(String),

    /// IPF stopped at its iteration cap above tolerance.
    #[error("convergence not reached after {iterations} iterations (max relative deviation {deviation:e})")]
    ConvergenceNotReached {
        /// Iterations performed.
        iterations: usize,
        /// Best achieved maximum relative marginal deviation.
        deviation: f64,
    },

    /// Cartesian product of referent domains is larger than the configured limit.
    #[error("theoretical size {size} exceeds limit {limit}")]
    TheoreticalSizeExceeded {
        /// Product of the referent domain sizes.
        size: u128,
        /// Configured limit.
        limit: u128,
    },

    /// Attribute name not present in the registry.
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    /// Canonical value not present in the attribute's domain.
    #[error("unknown value '{value}' for attribute '{attribute}'")]
    UnknownValue {
        /// Attribute name.
        attribute: String,
        /// Canonical value searched.
        value: String,
    },

    /// Invalid arguments provided to a kernel function.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// CSV read or write failure.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration (de)serialisation failure.
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl ReconstructionError {
    /// Create an invalid coordinate error
    pub fn coordinate(msg: impl Into<String>) -> Self {
        Self::InvalidCoordinate(msg.into())
    }

    /// Create an incompatible control totals error
    pub fn control(msg: impl Into<String>) -> Self {
        Self::IncompatibleControlTotals(msg.into())
    }

    /// Create an illegal distribution creation error
    pub fn illegal(msg: impl Into<String>) -> Self {
        Self::IllegalDistributionCreation(msg.into())
    }

    /// Create an unsupported reconstruction error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedReconstruction(msg.into())
    }

    /// Create an invalid arguments error
    pub fn arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }
}

/// Formats a dimension mismatch message between a matrix and a coordinate.
///
/// # Arguments
/// * `fname` - Function name where the mismatch occurred
/// * `expected` - Dimensions the matrix requires
/// * `found` - Dimensions the coordinate carries
pub fn log_dimension_mismatch<A: AsRef<str>, B: AsRef<str>>(
    fname: &str,
    expected: &[A],
    found: &[B],
) -> String {
    format!(
        "{} => Dimension mismatch: matrix [{}] coordinate [{}]",
        fname,
        join_names(expected),
        join_names(found)
    )
}

fn join_names<T: AsRef<str>>(xs: &[T]) -> String {
    xs.iter().map(|x| x.as_ref()).collect::<Vec<_>>().join(",")
}
