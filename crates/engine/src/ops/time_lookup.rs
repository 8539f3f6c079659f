//! Time lookup: evaluate a field at the time given by another field.

use fieldgraph_core::{ConstructionError, EvaluationError, FieldValue, Location};

use super::Evaluation;
use crate::field::Field;

pub(crate) fn validate(source: &Field, time_field: &Field) -> Result<usize, ConstructionError> {
    let time_components = time_field.number_of_components();
    if time_components != 1 {
        return Err(ConstructionError::mismatch("time_lookup time field", 1, time_components));
    }
    Ok(source.number_of_components())
}

/// The time field is evaluated without derivatives; the source is then
/// evaluated at the same place at that time and returned verbatim. Its
/// derivatives are spatial, so no chain rule against time applies.
pub(crate) fn evaluate(eval: &Evaluation<'_>, location: &Location) -> Result<FieldValue, EvaluationError> {
    let time = eval
        .source(1)?
        .evaluate(&location.clone().with_derivatives(false))?
        .values[0];
    if !time.is_finite() {
        return Err(eval.not_defined());
    }
    eval.source(0)?.evaluate(&location.at_time(time))
}
