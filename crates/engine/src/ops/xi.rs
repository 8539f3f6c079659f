//! The `xi` field: element local coordinates as a three-component field.

use fieldgraph_core::location::MAXIMUM_ELEMENT_XI_DIMENSIONS;
use fieldgraph_core::{EvaluationError, FieldValue, Location};

use super::Evaluation;

pub(crate) const COMPONENTS: usize = MAXIMUM_ELEMENT_XI_DIMENSIONS;

/// Xi padded with zeros; derivative of xi_i with respect to xi_j is δ_ij.
/// Only element locations have xi.
pub(crate) fn evaluate(eval: &Evaluation<'_>, location: &Location) -> Result<FieldValue, EvaluationError> {
    let element_xi = location.as_element_xi().ok_or_else(|| eval.unsupported(location))?;
    let xi = element_xi.xi();
    let mut values = vec![0.0; COMPONENTS];
    values[..xi.len()].copy_from_slice(xi);

    let n = location.number_of_derivatives();
    if n == 0 {
        return Ok(FieldValue::values_only(values));
    }
    let mut derivatives = vec![0.0; COMPONENTS * n];
    for d in 0..n {
        derivatives[d * n + d] = 1.0;
    }
    Ok(FieldValue::with_derivatives(values, derivatives, n))
}
