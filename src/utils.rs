// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Utility Functions** - *Enumeration and Numeric Helpers*
//!
//! Small helpers shared by the reconstruction kernels: Cartesian-product
//! sizing and decoding, and the deviation measure used by fitting loops.

use num_traits::Float;

use crate::errors::{ReconstructionError, Result};

/// Product of `radices`, or `None` on `u128` overflow.
///
/// An empty slice has product 1 (the single empty combination).
#[inline]
pub fn cartesian_size(radices: &[usize]) -> Option<u128> {
    radices
        .iter()
        .try_fold(1u128, |acc, &r| acc.checked_mul(r as u128))
}

/// Decodes `index` into one digit per radix, last radix varying fastest.
///
/// Writes into `digits`, which is cleared first. `index` must be below
/// [`cartesian_size`] of `radices`.
#[inline(always)]
pub fn decode_mixed_radix(mut index: usize, radices: &[usize], digits: &mut Vec<usize>) {
    digits.clear();
    digits.resize(radices.len(), 0);
    for (slot, &r) in digits.iter_mut().zip(radices).rev() {
        *slot = index % r;
        index /= r;
    }
}

/// Deviation of `current` from `target`: relative when `target` is non-zero,
/// absolute otherwise.
#[inline(always)]
pub fn relative_deviation<F: Float>(current: F, target: F) -> F {
    if target.is_zero() {
        current.abs()
    } else {
        ((current - target) / target).abs()
    }
}

/// Scale factor bringing `current` to `target`; `0/0` scales by 1.
#[inline(always)]
pub fn scale_factor<F: Float>(current: F, target: F) -> F {
    if current.is_zero() {
        if target.is_zero() { F::one() } else { F::zero() }
    } else {
        target / current
    }
}

/// Validates a tolerance and an iteration cap for a fitting loop.
///
/// # Errors
/// `InvalidArguments` for a non-positive or non-finite `tolerance`, or a zero cap.
#[inline(always)]
pub fn confirm_fit_params(label: &str, tolerance: f64, max_iterations: usize) -> Result<()> {
    if !(tolerance.is_finite() && tolerance > 0.0) {
        return Err(ReconstructionError::InvalidArguments(format!(
            "{}: tolerance must be finite and positive, got {}",
            label, tolerance
        )));
    }
    if max_iterations == 0 {
        return Err(ReconstructionError::InvalidArguments(format!(
            "{}: max_iterations must be at least 1",
            label
        )));
    }
    Ok(())
}
