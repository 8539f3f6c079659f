//! Function fields: evaluate `result` as if `reference` took the values of
//! `source`.
//!
//! With `source` and `reference` of equal component count the source value
//! is substituted whole. Otherwise a scalar `reference → result` map is
//! applied to each source component in turn. Both paths evaluate `result`
//! at a field coordinate location carrying the source value and its
//! derivatives, so derivatives of the result are taken with respect to the
//! outer xi.

use fieldgraph_core::{ConstructionError, EvaluationError, FieldValue, Location};

use super::Evaluation;
use crate::field::Field;

pub(crate) fn validate(source: &Field, result: &Field, reference: &Field) -> Result<usize, ConstructionError> {
    let (s, r, x) = (
        source.number_of_components(),
        result.number_of_components(),
        reference.number_of_components(),
    );
    if s == x {
        Ok(r)
    } else if x == 1 && r == 1 {
        Ok(s)
    } else {
        Err(ConstructionError::mismatch("function reference field", s, x))
    }
}

pub(crate) fn evaluate(eval: &Evaluation<'_>, location: &Location) -> Result<FieldValue, EvaluationError> {
    let source_field = eval.source(0)?;
    let result_field = eval.source(1)?;
    let reference_field = eval.source(2)?;
    let source = source_field.evaluate(location)?;
    let time = location.time();

    if source.len() == reference_field.number_of_components() {
        let coordinates = Location::field_coordinate(reference_field.id(), source, time);
        return result_field.evaluate(&coordinates);
    }

    let count = source.len();
    let mut values = Vec::with_capacity(count);
    let mut derivatives = Vec::new();
    let mut derivatives_valid = location.wants_derivatives();
    for i in 0..count {
        let component = match source.component_derivatives(i) {
            Some(row) => FieldValue::with_derivatives(vec![source.values[i]], row.to_vec(), source.number_of_derivatives),
            None => FieldValue::values_only(vec![source.values[i]]),
        };
        let coordinates = Location::field_coordinate(reference_field.id(), component, time);
        let mapped = result_field.evaluate(&coordinates)?;
        values.push(mapped.values[0]);
        match mapped.component_derivatives(0) {
            Some(row) if derivatives_valid => derivatives.extend_from_slice(row),
            _ => derivatives_valid = false,
        }
    }
    let n = location.number_of_derivatives();
    if derivatives_valid && derivatives.len() == count * n {
        Ok(FieldValue::with_derivatives(values, derivatives, n))
    } else {
        Ok(FieldValue::values_only(values))
    }
}
