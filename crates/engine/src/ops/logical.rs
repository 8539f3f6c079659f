//! Logical and relational operators.
//!
//! Results are 0.0 or 1.0 per component; a component counts as true when it
//! is non-zero. The functions are piecewise constant, so derivatives are
//! zero wherever they are requested.

use fieldgraph_core::{EvaluationError, FieldValue, Location};

use super::Evaluation;
use super::arithmetic::operands;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Xor,
    EqualTo,
    GreaterThan,
    LessThan,
}

impl LogicalOp {
    pub const ALL: [LogicalOp; 6] = [
        Self::And,
        Self::Or,
        Self::Xor,
        Self::EqualTo,
        Self::GreaterThan,
        Self::LessThan,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::EqualTo => "equal_to",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.token() == token)
    }

    pub fn apply(self, a: f64, b: f64) -> bool {
        match self {
            Self::And => a != 0.0 && b != 0.0,
            Self::Or => a != 0.0 || b != 0.0,
            Self::Xor => (a != 0.0) != (b != 0.0),
            Self::EqualTo => a == b,
            Self::GreaterThan => a > b,
            Self::LessThan => a < b,
        }
    }
}

fn truth(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

pub(crate) fn evaluate(op: LogicalOp, eval: &Evaluation<'_>, location: &Location) -> Result<FieldValue, EvaluationError> {
    let plain = location.clone().with_derivatives(false);
    let (a, b) = operands(eval, &plain)?;
    let values = (0..eval.number_of_components())
        .map(|i| truth(op.apply(a.broadcast_value(i), b.broadcast_value(i))))
        .collect();
    Ok(FieldValue::constant(values, location.number_of_derivatives()))
}

pub(crate) fn evaluate_not(eval: &Evaluation<'_>, location: &Location) -> Result<FieldValue, EvaluationError> {
    let plain = location.clone().with_derivatives(false);
    let source = eval.source(0)?.evaluate(&plain)?;
    let values = source.values.iter().map(|v| truth(*v == 0.0)).collect();
    Ok(FieldValue::constant(values, location.number_of_derivatives()))
}
