// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! # **Control** - *Numeric Cell Payload*
//!
//! Counts or frequencies stored against a coordinate. A control is declared
//! with a [`NumericKind`] that never changes: arithmetic with a control of the
//! other kind reads its value as `f64`, then converts back to the left
//! operand's kind.

use std::fmt;
use std::ops::Add;

use crate::config::ZERO_EPSILON;
use crate::operators::{ArithmeticOperator, NumericKind};

/// Numeric payload of a distribution cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Control {
    /// Whole count.
    Integer(i64),
    /// Real count or frequency.
    Real(f64),
}

impl Control {
    /// Zero ("nul value") of `kind`.
    #[inline]
    pub fn zero(kind: NumericKind) -> Self {
        match kind {
            NumericKind::Integer => Control::Integer(0),
            NumericKind::Real => Control::Real(0.0),
        }
    }

    /// `value` converted to `kind`, rounding half away from zero for integers.
    #[inline]
    pub fn of_kind(kind: NumericKind, value: f64) -> Self {
        match kind {
            NumericKind::Integer => Control::Integer(value.round() as i64),
            NumericKind::Real => Control::Real(value),
        }
    }

    /// Declared numeric kind.
    #[inline]
    pub fn kind(&self) -> NumericKind {
        match self {
            Control::Integer(_) => NumericKind::Integer,
            Control::Real(_) => NumericKind::Real,
        }
    }

    /// Value read as `f64`, whatever the kind.
    #[inline]
    pub fn value(&self) -> f64 {
        match *self {
            Control::Integer(v) => v as f64,
            Control::Real(v) => v,
        }
    }

    /// Whether the control is zero. Real controls use [`ZERO_EPSILON`].
    #[inline]
    pub fn is_zero(&self) -> bool {
        match *self {
            Control::Integer(v) => v == 0,
            Control::Real(v) => v.abs() < ZERO_EPSILON,
        }
    }

    /// Same value of the same kind.
    pub fn equal_value(&self, other: &Control) -> bool {
        self.kind() == other.kind() && (self.value() - other.value()).abs() < ZERO_EPSILON
    }

    /// `self op rhs`, keeping `self`'s kind.
    pub fn apply(&self, op: ArithmeticOperator, rhs: &Control) -> Control {
        match (op, *self, *rhs) {
            (ArithmeticOperator::Add, Control::Integer(a), Control::Integer(b)) => {
                Control::Integer(a.saturating_add(b))
            }
            (ArithmeticOperator::Subtract, Control::Integer(a), Control::Integer(b)) => {
                Control::Integer(a.saturating_sub(b).max(0))
            }
            (ArithmeticOperator::Multiply, Control::Integer(a), Control::Integer(b)) => {
                Control::Integer(a.saturating_mul(b))
            }
            (ArithmeticOperator::Add, _, _) => Control::of_kind(self.kind(), self.value() + rhs.value()),
            (ArithmeticOperator::Subtract, _, _) => {
                Control::of_kind(self.kind(), (self.value() - rhs.value()).max(0.0))
            }
            (ArithmeticOperator::Multiply, _, _) => self.rounded_product(rhs.value()),
            (ArithmeticOperator::Divide, _, _) => {
                if rhs.is_zero() {
                    Control::zero(self.kind())
                } else {
                    Control::of_kind(self.kind(), self.value() / rhs.value())
                }
            }
        }
    }

    /// Product with `factor`, rounded to this control's kind.
    #[inline]
    pub fn rounded_product(&self, factor: f64) -> Control {
        Control::of_kind(self.kind(), self.value() * factor)
    }

    /// Product with `factor`, unrounded.
    #[inline]
    pub fn raw_product(&self, factor: f64) -> f64 {
        self.value() * factor
    }
}

impl Add for Control {
    type Output = Control;

    fn add(self, rhs: Control) -> Control {
        self.apply(ArithmeticOperator::Add, &rhs)
    }
}

impl From<i64> for Control {
    fn from(v: i64) -> Self {
        Control::Integer(v)
    }
}

impl From<f64> for Control {
    fn from(v: f64) -> Self {
        Control::Real(v)
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Control::Integer(v) => write!(f, "{}", v),
            Control::Real(v) => write!(f, "{}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_kept_across_mixed_arithmetic() {
        let a = Control::Integer(3);
        let b = Control::Real(1.6);
        let sum = a + b;
        assert_eq!(sum.kind(), NumericKind::Integer);
        assert_eq!(sum, Control::Integer(5));

        let c = b + a;
        assert_eq!(c.kind(), NumericKind::Real);
        assert!((c.value() - 4.6).abs() < 1e-12);
    }

    #[test]
    fn rounded_versus_raw_product() {
        let a = Control::Integer(7);
        assert_eq!(a.rounded_product(0.5), Control::Integer(4));
        assert_eq!(a.raw_product(0.5), 3.5);
        assert_eq!(Control::Real(7.0).rounded_product(0.5), Control::Real(3.5));
    }

    #[test]
    fn division_by_zero_is_zero_of_kind() {
        let a = Control::Real(2.0);
        assert_eq!(a.apply(ArithmeticOperator::Divide, &Control::Integer(0)), Control::Real(0.0));
        assert_eq!(
            Control::Integer(9).apply(ArithmeticOperator::Divide, &Control::Integer(2)),
            Control::Integer(5)
        );
    }

    #[test]
    fn subtraction_clamps_at_zero() {
        assert_eq!(
            Control::Integer(2).apply(ArithmeticOperator::Subtract, &Control::Integer(5)),
            Control::Integer(0)
        );
        assert_eq!(
            Control::Real(1.0).apply(ArithmeticOperator::Subtract, &Control::Real(0.25)),
            Control::Real(0.75)
        );
    }

    #[test]
    fn zero_detection() {
        assert!(Control::zero(NumericKind::Integer).is_zero());
        assert!(Control::Real(1e-15).is_zero());
        assert!(!Control::Real(1e-6).is_zero());
        assert!(Control::Integer(2).equal_value(&Control::Integer(2)));
        assert!(!Control::Integer(2).equal_value(&Control::Real(2.0)));
    }
}
