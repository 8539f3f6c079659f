//! Constant fields.

use fieldgraph_core::{ConstructionError, FieldValue, Location};

/// Fixed values, defined everywhere, with zero derivatives.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantCore {
    values: Vec<f64>,
}

impl ConstantCore {
    pub fn new(values: Vec<f64>) -> Result<Self, ConstructionError> {
        if values.is_empty() {
            return Err(ConstructionError::InvalidArgument(
                "constant field needs at least one value".into(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ConstructionError::InvalidArgument(
                "constant field values must be finite".into(),
            ));
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub(crate) fn evaluate(&self, location: &Location) -> FieldValue {
        FieldValue::constant(self.values.clone(), location.number_of_derivatives())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldgraph_core::NodeId;

    #[test]
    fn rejects_empty_and_non_finite() {
        assert!(ConstantCore::new(vec![]).is_err());
        assert!(ConstantCore::new(vec![1.0, f64::NAN]).is_err());
    }

    #[test]
    fn same_value_at_any_node() {
        let core = ConstantCore::new(vec![1.5, -2.0]).unwrap();
        let value = core.evaluate(&Location::node(NodeId(42), 3.0));
        assert_eq!(value.values, vec![1.5, -2.0]);
        assert!(!value.has_derivatives());
    }
}
