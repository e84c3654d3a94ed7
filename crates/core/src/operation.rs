//! Arithmetic evaluator — the four operations a comment can apply.
//!
//! A comment's result is computed exactly once, when it is created, from
//! the *previous number*: the parent comment's stored result, or the
//! discussion's start number for top-level comments.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::OperationError;

/// The closed set of operations. Wire tokens are `ADD`, `SUBTRACT`,
/// `MULTIPLY` and `DIVIDE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [
        OperationKind::Add,
        OperationKind::Subtract,
        OperationKind::Multiply,
        OperationKind::Divide,
    ];

    /// The wire token.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Add => "ADD",
            OperationKind::Subtract => "SUBTRACT",
            OperationKind::Multiply => "MULTIPLY",
            OperationKind::Divide => "DIVIDE",
        }
    }

    /// Arithmetic symbol, for terminal rendering.
    pub fn symbol(&self) -> char {
        match self {
            OperationKind::Add => '+',
            OperationKind::Subtract => '-',
            OperationKind::Multiply => '×',
            OperationKind::Divide => '÷',
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = OperationError;

    /// Tokens are matched exactly; `add` or `MOD` are rejected.
    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == token)
            .ok_or_else(|| OperationError::InvalidOperation(token.to_string()))
    }
}

/// Apply `kind` to `previous` and `operand`.
///
/// Fails with `DivisionByZero` for a zero divisor and with `NonFiniteNumber`
/// when an input is NaN/infinite or the result overflows.
pub fn evaluate(previous: f64, kind: OperationKind, operand: f64) -> Result<f64, OperationError> {
    if !previous.is_finite() || !operand.is_finite() {
        return Err(OperationError::NonFiniteNumber);
    }

    let result = match kind {
        OperationKind::Add => previous + operand,
        OperationKind::Subtract => previous - operand,
        OperationKind::Multiply => previous * operand,
        OperationKind::Divide => {
            if operand == 0.0 {
                return Err(OperationError::DivisionByZero);
            }
            previous / operand
        }
    };

    if result.is_finite() {
        Ok(result)
    } else {
        Err(OperationError::NonFiniteNumber)
    }
}
