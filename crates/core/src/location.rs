//! Locations — where (and when) a field is evaluated.
//!
//! A [`Location`] is immutable once built. Derived locations, such as the
//! same element and xi at a different time, come from explicit constructors
//! like [`Location::at_time`], never from mutation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EvaluationError;
use crate::mesh::{Element, NodeId};
use crate::value::FieldValue;

/// Largest supported element dimension.
pub const MAXIMUM_ELEMENT_XI_DIMENSIONS: usize = 3;

/// Opaque numeric identity of a field within its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(pub u64);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A point inside a mesh element given by its local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementXiLocation {
    element: Element,
    xi: Vec<f64>,
    time: f64,
    top_level_element: Option<Element>,
    derivative_order: u8,
}

impl ElementXiLocation {
    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn xi(&self) -> &[f64] {
        &self.xi
    }

    /// The top-level element the evaluation was requested on, if given.
    pub fn top_level_element(&self) -> Option<&Element> {
        self.top_level_element.as_ref()
    }
}

/// A mesh node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeLocation {
    node: NodeId,
    time: f64,
    derivative_order: u8,
}

impl NodeLocation {
    pub fn node(&self) -> NodeId {
        self.node
    }
}

/// A location in the domain of another field rather than the mesh.
///
/// Evaluating the reference field here yields `value` directly; every other
/// field evaluates normally, so anything built on the reference field
/// becomes a function of `value`. The derivatives carried in `value` are
/// with respect to the xi of the location the coordinates were computed at,
/// which makes the chain rule fall out of ordinary derivative propagation.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCoordinateLocation {
    reference_field: FieldId,
    value: FieldValue,
    time: f64,
    derivative_order: u8,
}

impl FieldCoordinateLocation {
    pub fn reference_field(&self) -> FieldId {
        self.reference_field
    }

    /// The "as-if" value of the reference field.
    pub fn value(&self) -> &FieldValue {
        &self.value
    }
}

/// Where a field is evaluated: one of a closed set of variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    ElementXi(ElementXiLocation),
    Node(NodeLocation),
    FieldCoordinate(FieldCoordinateLocation),
}

impl Location {
    /// A location inside `element`. `xi` must match the element dimension.
    pub fn element_xi(element: Element, xi: &[f64], time: f64) -> Result<Self, EvaluationError> {
        if xi.len() != element.dimension() || xi.len() > MAXIMUM_ELEMENT_XI_DIMENSIONS {
            return Err(EvaluationError::InvalidArgument(format!(
                "element {} has dimension {} but {} xi values were given",
                element.id(),
                element.dimension(),
                xi.len()
            )));
        }
        if xi.iter().any(|x| !x.is_finite()) {
            return Err(EvaluationError::InvalidArgument("xi values must be finite".into()));
        }
        Ok(Self::ElementXi(ElementXiLocation {
            element,
            xi: xi.to_vec(),
            time,
            top_level_element: None,
            derivative_order: 0,
        }))
    }

    /// A mesh node at `time`.
    pub fn node(node: NodeId, time: f64) -> Self {
        Self::Node(NodeLocation {
            node,
            time,
            derivative_order: 0,
        })
    }

    /// A location where `reference_field` takes the value `value`.
    ///
    /// Derivatives are requested exactly when `value` carries valid ones.
    pub fn field_coordinate(reference_field: FieldId, value: FieldValue, time: f64) -> Self {
        let derivative_order = u8::from(value.has_derivatives() && value.number_of_derivatives > 0);
        Self::FieldCoordinate(FieldCoordinateLocation {
            reference_field,
            value,
            time,
            derivative_order,
        })
    }

    /// Request (or stop requesting) first derivatives.
    ///
    /// Field coordinate locations keep derivatives only if their carried
    /// value has them.
    pub fn with_derivatives(self, wanted: bool) -> Self {
        let order = u8::from(wanted);
        match self {
            Self::ElementXi(loc) => Self::ElementXi(ElementXiLocation {
                derivative_order: order,
                ..loc
            }),
            Self::Node(loc) => Self::Node(NodeLocation {
                derivative_order: order,
                ..loc
            }),
            Self::FieldCoordinate(loc) => {
                let available = loc.value.has_derivatives() && loc.value.number_of_derivatives > 0;
                Self::FieldCoordinate(FieldCoordinateLocation {
                    derivative_order: u8::from(wanted && available),
                    ..loc
                })
            }
        }
    }

    /// Attach the top-level element; only meaningful for element locations.
    pub fn with_top_level_element(self, top_level: Element) -> Self {
        match self {
            Self::ElementXi(loc) => Self::ElementXi(ElementXiLocation {
                top_level_element: Some(top_level),
                ..loc
            }),
            other => other,
        }
    }

    /// The same place at a different time.
    pub fn at_time(&self, time: f64) -> Self {
        match self {
            Self::ElementXi(loc) => Self::ElementXi(ElementXiLocation {
                time,
                ..loc.clone()
            }),
            Self::Node(loc) => Self::Node(NodeLocation { time, ..loc.clone() }),
            Self::FieldCoordinate(loc) => Self::FieldCoordinate(FieldCoordinateLocation {
                time,
                ..loc.clone()
            }),
        }
    }

    pub fn time(&self) -> f64 {
        match self {
            Self::ElementXi(loc) => loc.time,
            Self::Node(loc) => loc.time,
            Self::FieldCoordinate(loc) => loc.time,
        }
    }

    pub fn derivative_order(&self) -> u8 {
        match self {
            Self::ElementXi(loc) => loc.derivative_order,
            Self::Node(loc) => loc.derivative_order,
            Self::FieldCoordinate(loc) => loc.derivative_order,
        }
    }

    /// Number of local coordinates derivatives are taken with respect to.
    pub fn number_of_derivatives(&self) -> usize {
        if self.derivative_order() == 0 {
            return 0;
        }
        match self {
            Self::ElementXi(loc) => loc.element.dimension(),
            Self::Node(_) => 0,
            Self::FieldCoordinate(loc) => loc.value.number_of_derivatives,
        }
    }

    /// Equality ignoring the requested derivative order.
    pub fn same_place(&self, other: &Location) -> bool {
        match (self, other) {
            (Self::ElementXi(a), Self::ElementXi(b)) => {
                a.element == b.element
                    && a.xi == b.xi
                    && a.time == b.time
                    && a.top_level_element == b.top_level_element
            }
            (Self::Node(a), Self::Node(b)) => a.node == b.node && a.time == b.time,
            (Self::FieldCoordinate(a), Self::FieldCoordinate(b)) => {
                a.reference_field == b.reference_field && a.value == b.value && a.time == b.time
            }
            _ => false,
        }
    }

    /// Whether derivatives are requested and meaningful here.
    pub fn wants_derivatives(&self) -> bool {
        self.number_of_derivatives() > 0
    }

    /// Short name of the variant, used in error messages and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ElementXi(_) => "element_xi",
            Self::Node(_) => "node",
            Self::FieldCoordinate(_) => "field_coordinate",
        }
    }

    pub fn as_element_xi(&self) -> Option<&ElementXiLocation> {
        match self {
            Self::ElementXi(loc) => Some(loc),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&NodeLocation> {
        match self {
            Self::Node(loc) => Some(loc),
            _ => None,
        }
    }

    pub fn as_field_coordinate(&self) -> Option<&FieldCoordinateLocation> {
        match self {
            Self::FieldCoordinate(loc) => Some(loc),
            _ => None,
        }
    }
}
