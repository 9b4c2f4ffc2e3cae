// Copyright Peter Bower 2025. All Rights Reserved.
// Licensed under Mozilla Public License (MPL) 2.0.

//! Contains the control arithmetic operators used when combining cell payloads

/// Arithmetic operators applicable between two controls.
///
/// The left operand's numeric kind is always kept; see
/// [`Control::apply`](crate::model::control::Control::apply).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOperator {
    /// Addition (`lhs + rhs`)
    Add,
    /// Subtraction (`lhs - rhs`)
    ///
    /// Results below zero are clamped to zero; controls are counts or frequencies.
    Subtract,
    /// Multiplication (`lhs * rhs`)
    ///
    /// For integer controls the product is rounded half away from zero.
    Multiply,
    /// Division (`lhs / rhs`)
    ///
    /// Division by a zero control yields the zero of the left operand's kind,
    /// matching the 0/0 policy of proportional fitting.
    Divide,
}

/// Numeric kind a control is declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKind {
    /// Whole counts (`i64`).
    Integer,
    /// Real-valued counts or frequencies (`f64`).
    Real,
}
