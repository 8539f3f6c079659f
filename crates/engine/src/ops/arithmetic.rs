//! Arithmetic operators: add, multiply, divide, scale and offset.
//!
//! Binary operators broadcast a single-component operand across the other.
//! Derivatives are valid only when every operand supplied valid ones.

use fieldgraph_core::{ConstructionError, EvaluationError, FieldValue, Location};

use super::Evaluation;
use crate::field::Field;

/// Evaluate both operands of a binary operator at `location`.
pub(crate) fn operands(eval: &Evaluation<'_>, location: &Location) -> Result<(FieldValue, FieldValue), EvaluationError> {
    let a = eval.source(0)?.evaluate(location)?;
    let b = eval.source(1)?.evaluate(location)?;
    Ok((a, b))
}

/// Combine two operands componentwise with scalar broadcasting.
///
/// `derivative(a, b, da, db)` gives one derivative entry of the result.
pub(crate) fn combine(
    a: &FieldValue,
    b: &FieldValue,
    location: &Location,
    value: impl Fn(f64, f64) -> f64,
    derivative: impl Fn(f64, f64, f64, f64) -> f64,
) -> FieldValue {
    let count = a.len().max(b.len());
    let values: Vec<f64> = (0..count)
        .map(|i| value(a.broadcast_value(i), b.broadcast_value(i)))
        .collect();
    let n = location.number_of_derivatives();
    if n == 0 {
        return FieldValue::values_only(values);
    }
    let mut derivatives = Vec::with_capacity(count * n);
    for i in 0..count {
        let (Some(da), Some(db)) = (a.broadcast_derivatives(i), b.broadcast_derivatives(i)) else {
            return FieldValue::values_only(values);
        };
        let (x, y) = (a.broadcast_value(i), b.broadcast_value(i));
        for (dx, dy) in da.iter().zip(db) {
            derivatives.push(derivative(x, y, *dx, *dy));
        }
    }
    if derivatives.len() != count * n {
        return FieldValue::values_only(values);
    }
    FieldValue::with_derivatives(values, derivatives, n)
}

// ── Add ────────────────────────────────────────────────────────────────────

/// Weighted sum `w1·a + w2·b`.
#[derive(Debug, Clone, PartialEq)]
pub struct AddCore {
    weights: [f64; 2],
}

impl AddCore {
    pub fn new(w1: f64, w2: f64) -> Self {
        Self { weights: [w1, w2] }
    }

    pub fn weights(&self) -> [f64; 2] {
        self.weights
    }

    pub(crate) fn evaluate(&self, eval: &Evaluation<'_>, location: &Location) -> Result<FieldValue, EvaluationError> {
        let (a, b) = operands(eval, location)?;
        let [w1, w2] = self.weights;
        Ok(combine(
            &a,
            &b,
            location,
            |x, y| w1 * x + w2 * y,
            |_, _, dx, dy| w1 * dx + w2 * dy,
        ))
    }
}

impl Default for AddCore {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

// ── Multiply / divide ──────────────────────────────────────────────────────

/// Componentwise product, differentiated with the product rule.
pub(crate) fn multiply(eval: &Evaluation<'_>, location: &Location) -> Result<FieldValue, EvaluationError> {
    let (a, b) = operands(eval, location)?;
    Ok(combine(&a, &b, location, |x, y| x * y, |x, y, dx, dy| dx * y + x * dy))
}

/// Componentwise quotient, differentiated with the quotient rule.
///
/// Not defined where any divisor component is zero.
pub(crate) fn divide(eval: &Evaluation<'_>, location: &Location) -> Result<FieldValue, EvaluationError> {
    let (a, b) = operands(eval, location)?;
    if b.values.iter().any(|v| *v == 0.0) {
        return Err(eval.not_defined());
    }
    Ok(combine(
        &a,
        &b,
        location,
        |x, y| x / y,
        |x, y, dx, dy| (dx * y - x * dy) / (y * y),
    ))
}

// ── Scale / offset ─────────────────────────────────────────────────────────

/// `source · factors`, one factor per component.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleCore {
    factors: Vec<f64>,
}

impl ScaleCore {
    pub fn new(factors: Vec<f64>) -> Result<Self, ConstructionError> {
        check_parameters("scale", &factors)?;
        Ok(Self { factors })
    }

    pub fn factors(&self) -> &[f64] {
        &self.factors
    }

    pub(crate) fn validate(&self, source: &Field) -> Result<usize, ConstructionError> {
        expect_parameter_count("scale factors", self.factors.len(), source)
    }

    pub(crate) fn evaluate(&self, eval: &Evaluation<'_>, location: &Location) -> Result<FieldValue, EvaluationError> {
        let source = eval.source(0)?.evaluate(location)?;
        let values = source.values.iter().zip(&self.factors).map(|(v, f)| v * f).collect();
        let derivatives = source.derivatives.as_ref().map(|block| {
            let n = source.number_of_derivatives;
            block
                .iter()
                .enumerate()
                .map(|(i, d)| d * self.factors[i / n])
                .collect()
        });
        Ok(FieldValue {
            values,
            derivatives,
            number_of_derivatives: source.number_of_derivatives,
        })
    }

    /// Source values that scale to `values`.
    pub(crate) fn inverse(&self, field: &str, values: &[f64]) -> Result<Vec<f64>, EvaluationError> {
        if self.factors.contains(&0.0) {
            return Err(EvaluationError::InvalidArgument(format!(
                "field '{field}' has a zero scale factor and cannot be inverted"
            )));
        }
        Ok(values.iter().zip(&self.factors).map(|(v, f)| v / f).collect())
    }
}

/// `source + offsets`, one offset per component.
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetCore {
    offsets: Vec<f64>,
}

impl OffsetCore {
    pub fn new(offsets: Vec<f64>) -> Result<Self, ConstructionError> {
        check_parameters("offset", &offsets)?;
        Ok(Self { offsets })
    }

    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }

    pub(crate) fn validate(&self, source: &Field) -> Result<usize, ConstructionError> {
        expect_parameter_count("offsets", self.offsets.len(), source)
    }

    pub(crate) fn evaluate(&self, eval: &Evaluation<'_>, location: &Location) -> Result<FieldValue, EvaluationError> {
        let mut value = eval.source(0)?.evaluate(location)?;
        for (v, o) in value.values.iter_mut().zip(&self.offsets) {
            *v += o;
        }
        Ok(value)
    }

    pub(crate) fn inverse(&self, values: &[f64]) -> Vec<f64> {
        values.iter().zip(&self.offsets).map(|(v, o)| v - o).collect()
    }
}

fn check_parameters(kind: &str, parameters: &[f64]) -> Result<(), ConstructionError> {
    if parameters.is_empty() {
        return Err(ConstructionError::InvalidArgument(format!(
            "{kind} field needs one parameter per component"
        )));
    }
    if parameters.iter().any(|p| !p.is_finite()) {
        return Err(ConstructionError::InvalidArgument(format!(
            "{kind} field parameters must be finite"
        )));
    }
    Ok(())
}

fn expect_parameter_count(what: &str, count: usize, source: &Field) -> Result<usize, ConstructionError> {
    let components = source.number_of_components();
    if count != components {
        return Err(ConstructionError::mismatch(what, components, count));
    }
    Ok(components)
}
