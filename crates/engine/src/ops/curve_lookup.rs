//! Curve lookup: a scalar source used as the parameter of an external curve.

use fieldgraph_core::{ConstructionError, Curve, EvaluationError, FieldValue, Location, Managed, ManagedRef};
use tracing::warn;

use super::Evaluation;
use crate::field::Field;

/// `curve(t)` with `t` the source value.
///
/// Derivatives follow the chain rule, `d(out_c)/dxi = curve_c'(t) · dt/dxi`.
#[derive(Debug, Clone)]
pub struct CurveLookupCore {
    curve: ManagedRef<Curve>,
    number_of_components: usize,
}

impl CurveLookupCore {
    pub fn new(curve: &Managed<Curve>) -> Self {
        Self {
            curve: curve.weak(),
            number_of_components: curve.number_of_components(),
        }
    }

    pub fn curve_name(&self) -> String {
        self.curve.name()
    }

    pub(crate) fn curve(&self) -> &ManagedRef<Curve> {
        &self.curve
    }

    pub(crate) fn validate(&self, source: &Field) -> Result<usize, ConstructionError> {
        let components = source.number_of_components();
        if components != 1 {
            return Err(ConstructionError::mismatch("curve_lookup source field", 1, components));
        }
        Ok(self.number_of_components)
    }

    pub(crate) fn evaluate(&self, eval: &Evaluation<'_>, location: &Location) -> Result<FieldValue, EvaluationError> {
        let Some(curve) = self.curve.upgrade() else {
            warn!(field = %eval.field_name(), curve = %self.curve_name(), "Curve no longer exists");
            return Err(eval.resource_unavailable(format!("curve '{}'", self.curve_name())));
        };
        let source = eval.source(0)?.evaluate(location)?;
        let parameter = source.values[0];
        let (values, slopes) = curve.evaluate(parameter).ok_or_else(|| eval.not_defined())?;

        let n = location.number_of_derivatives();
        let Some(dt) = source.component_derivatives(0).filter(|_| n > 0) else {
            return Ok(FieldValue::values_only(values));
        };
        let mut derivatives = Vec::with_capacity(values.len() * n);
        for slope in &slopes {
            derivatives.extend(dt.iter().map(|d| slope * d));
        }
        Ok(FieldValue::with_derivatives(values, derivatives, n))
    }
}
