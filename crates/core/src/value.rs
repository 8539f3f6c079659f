//! Field values — the numeric result of evaluating a field at a location.

use serde::{Deserialize, Serialize};

/// Values of every component of a field, plus optional first derivatives.
///
/// Derivatives are stored component-major: the derivative of component `c`
/// with respect to local coordinate `d` lives at
/// `c * number_of_derivatives + d`. `derivatives == None` means the
/// derivatives are not valid for this result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    /// One entry per component.
    pub values: Vec<f64>,

    /// Component-major derivative block, when valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivatives: Option<Vec<f64>>,

    /// Number of local coordinates each component is differentiated by.
    #[serde(default)]
    pub number_of_derivatives: usize,
}

impl FieldValue {
    /// Values only; derivatives are not valid.
    pub fn values_only(values: Vec<f64>) -> Self {
        Self {
            values,
            derivatives: None,
            number_of_derivatives: 0,
        }
    }

    /// Values with a derivative block of `values.len() * number_of_derivatives` entries.
    pub fn with_derivatives(values: Vec<f64>, derivatives: Vec<f64>, number_of_derivatives: usize) -> Self {
        debug_assert_eq!(
            derivatives.len(),
            values.len() * number_of_derivatives,
            "derivative block size must match component and derivative counts"
        );
        Self {
            values,
            derivatives: Some(derivatives),
            number_of_derivatives,
        }
    }

    /// Values whose derivatives are identically zero.
    ///
    /// When `number_of_derivatives` is zero no derivative block is attached.
    pub fn constant(values: Vec<f64>, number_of_derivatives: usize) -> Self {
        if number_of_derivatives == 0 {
            return Self::values_only(values);
        }
        let derivatives = vec![0.0; values.len() * number_of_derivatives];
        Self::with_derivatives(values, derivatives, number_of_derivatives)
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no components.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether the derivative block is valid.
    pub fn has_derivatives(&self) -> bool {
        self.derivatives.is_some()
    }

    /// Derivatives of one component, if valid.
    pub fn component_derivatives(&self, component: usize) -> Option<&[f64]> {
        let n = self.number_of_derivatives;
        self.derivatives
            .as_deref()
            .and_then(|d| d.get(component * n..(component + 1) * n))
    }

    /// A single derivative entry, if valid.
    pub fn derivative(&self, component: usize, xi: usize) -> Option<f64> {
        self.component_derivatives(component)
            .and_then(|row| row.get(xi).copied())
    }

    /// Drop the derivative block, marking derivatives invalid.
    pub fn without_derivatives(mut self) -> Self {
        self.derivatives = None;
        self
    }

    /// Value of component `index` after scalar broadcasting.
    ///
    /// A single-component value is repeated for every requested index.
    pub fn broadcast_value(&self, index: usize) -> f64 {
        if self.values.len() == 1 {
            self.values[0]
        } else {
            self.values[index]
        }
    }

    /// Derivative row of component `index` after scalar broadcasting.
    pub fn broadcast_derivatives(&self, index: usize) -> Option<&[f64]> {
        if self.values.len() == 1 {
            self.component_derivatives(0)
        } else {
            self.component_derivatives(index)
        }
    }
}
