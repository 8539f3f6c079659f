//! Field cores — the closed set of operator kinds.
//!
//! A [`FieldCore`] decides how a field computes its value from its sources.
//! Each kind validates its sources at construction (returning the number of
//! components the field will have), evaluates, compares, describes itself as
//! a command string and, for kinds that read a curve or time keeper,
//! subscribes to that resource's manager.

pub mod arithmetic;
pub mod compose;
pub mod constant;
pub mod coordinate;
pub mod curve_lookup;
pub mod function;
pub mod image_filter;
pub mod logical;
pub mod node_value;
pub mod time_lookup;
pub mod time_value;
pub mod xi;

use std::rc::Rc;

use fieldgraph_core::{
    ChangeMessage, ConstructionError, EvaluationError, FieldValue, Location, ManagedRef, NodeId, Resource,
    Subscription,
};

use crate::describe::CommandBuilder;
use crate::field::Field;
use crate::module::Module;

pub use arithmetic::{AddCore, OffsetCore, ScaleCore};
pub use constant::ConstantCore;
pub use coordinate::{CoordinateSystem, CoordinateTransformationCore};
pub use curve_lookup::CurveLookupCore;
pub use image_filter::{ImageFilter, ThresholdMode};
pub use logical::LogicalOp;
pub use node_value::NodeValueCore;
pub use time_value::TimeValueCore;

/// How a field computes its values.
#[derive(Debug, Clone)]
pub enum FieldCore {
    Constant(ConstantCore),
    Xi,
    NodeValue(NodeValueCore),
    TimeValue(TimeValueCore),
    Add(AddCore),
    Multiply,
    Divide,
    Scale(ScaleCore),
    Offset(OffsetCore),
    Logical(LogicalOp),
    Not,
    CurveLookup(CurveLookupCore),
    TimeLookup,
    Function,
    CoordinateTransformation(CoordinateTransformationCore),
    Compose,
    ImageFilter(ImageFilter),
}

/// Every `describe` type token, in a stable order.
pub const CORE_TYPES: &[&str] = &[
    "constant",
    "xi",
    "node_value",
    "time_value",
    "add",
    "multiply",
    "divide",
    "scale",
    "offset",
    "and",
    "or",
    "xor",
    "equal_to",
    "greater_than",
    "less_than",
    "not",
    "curve_lookup",
    "time_lookup",
    "function",
    "coordinate_transformation",
    "compose",
    "binary_threshold_filter",
    "threshold_filter",
    "sigmoid_filter",
];

/// Result of assigning values at a node.
pub(crate) enum Assignment {
    /// The core stored the values itself.
    Stored,
    /// The values were mapped back and must be assigned to a source.
    Forward { source: Field, values: Vec<f64> },
}

impl FieldCore {
    /// The `describe` type token.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Constant(_) => "constant",
            Self::Xi => "xi",
            Self::NodeValue(_) => "node_value",
            Self::TimeValue(_) => "time_value",
            Self::Add(_) => "add",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
            Self::Scale(_) => "scale",
            Self::Offset(_) => "offset",
            Self::Logical(op) => op.token(),
            Self::Not => "not",
            Self::CurveLookup(_) => "curve_lookup",
            Self::TimeLookup => "time_lookup",
            Self::Function => "function",
            Self::CoordinateTransformation(_) => "coordinate_transformation",
            Self::Compose => "compose",
            Self::ImageFilter(filter) => filter.token(),
        }
    }

    /// Check `sources` and return the number of components of the field.
    pub fn validate(&self, sources: &[Field]) -> Result<usize, ConstructionError> {
        match self {
            Self::Constant(core) => {
                expect_sources(self.type_name(), sources, 0)?;
                Ok(core.values().len())
            }
            Self::Xi => {
                expect_sources("xi", sources, 0)?;
                Ok(xi::COMPONENTS)
            }
            Self::NodeValue(core) => {
                expect_sources("node_value", sources, 0)?;
                Ok(core.number_of_components())
            }
            Self::TimeValue(_) => {
                expect_sources("time_value", sources, 0)?;
                Ok(1)
            }
            Self::Add(_) | Self::Multiply | Self::Divide | Self::Logical(_) => {
                expect_sources(self.type_name(), sources, 2)?;
                broadcast_components(
                    self.type_name(),
                    sources[0].number_of_components(),
                    sources[1].number_of_components(),
                )
            }
            Self::Scale(core) => {
                expect_sources("scale", sources, 1)?;
                core.validate(&sources[0])
            }
            Self::Offset(core) => {
                expect_sources("offset", sources, 1)?;
                core.validate(&sources[0])
            }
            Self::Not => {
                expect_sources("not", sources, 1)?;
                Ok(sources[0].number_of_components())
            }
            Self::CurveLookup(core) => {
                expect_sources("curve_lookup", sources, 1)?;
                core.validate(&sources[0])
            }
            Self::TimeLookup => {
                expect_sources("time_lookup", sources, 2)?;
                time_lookup::validate(&sources[0], &sources[1])
            }
            Self::Function => {
                expect_sources("function", sources, 3)?;
                function::validate(&sources[0], &sources[1], &sources[2])
            }
            Self::CoordinateTransformation(_) => {
                expect_sources("coordinate_transformation", sources, 1)?;
                coordinate::validate(&sources[0])
            }
            Self::Compose => {
                expect_sources("compose", sources, 3)?;
                compose::validate(&sources[0], &sources[1], &sources[2])
            }
            Self::ImageFilter(filter) => {
                expect_sources(filter.token(), sources, 1)?;
                Ok(sources[0].number_of_components())
            }
        }
    }

    pub(crate) fn evaluate(&self, eval: &Evaluation<'_>, location: &Location) -> Result<FieldValue, EvaluationError> {
        match self {
            Self::Constant(core) => Ok(core.evaluate(location)),
            Self::Xi => xi::evaluate(eval, location),
            Self::NodeValue(core) => core.evaluate(eval, location),
            Self::TimeValue(core) => core.evaluate(eval, location),
            Self::Add(core) => core.evaluate(eval, location),
            Self::Multiply => arithmetic::multiply(eval, location),
            Self::Divide => arithmetic::divide(eval, location),
            Self::Scale(core) => core.evaluate(eval, location),
            Self::Offset(core) => core.evaluate(eval, location),
            Self::Logical(op) => logical::evaluate(*op, eval, location),
            Self::Not => logical::evaluate_not(eval, location),
            Self::CurveLookup(core) => core.evaluate(eval, location),
            Self::TimeLookup => time_lookup::evaluate(eval, location),
            Self::Function => function::evaluate(eval, location),
            Self::CoordinateTransformation(core) => core.evaluate(eval, location),
            Self::Compose => compose::evaluate(eval, location),
            Self::ImageFilter(filter) => filter.evaluate(eval, location),
        }
    }

    /// Structural equality of the core's own parameters.
    ///
    /// External resources compare by name, so a core rebuilt from its
    /// description compares equal to the original.
    pub fn compare(&self, other: &FieldCore) -> bool {
        match (self, other) {
            (Self::Constant(a), Self::Constant(b)) => a == b,
            (Self::NodeValue(a), Self::NodeValue(b)) => a == b,
            (Self::TimeValue(a), Self::TimeValue(b)) => a.keeper_name() == b.keeper_name(),
            (Self::Add(a), Self::Add(b)) => a == b,
            (Self::Scale(a), Self::Scale(b)) => a == b,
            (Self::Offset(a), Self::Offset(b)) => a == b,
            (Self::Logical(a), Self::Logical(b)) => a == b,
            (Self::CurveLookup(a), Self::CurveLookup(b)) => a.curve_name() == b.curve_name(),
            (Self::CoordinateTransformation(a), Self::CoordinateTransformation(b)) => a == b,
            (Self::ImageFilter(a), Self::ImageFilter(b)) => a == b,
            (Self::Xi, Self::Xi)
            | (Self::Multiply, Self::Multiply)
            | (Self::Divide, Self::Divide)
            | (Self::Not, Self::Not)
            | (Self::TimeLookup, Self::TimeLookup)
            | (Self::Function, Self::Function)
            | (Self::Compose, Self::Compose) => true,
            _ => false,
        }
    }

    /// Canonical command that rebuilds a field named `name` with this core.
    pub fn describe(&self, name: &str, sources: &[Field]) -> String {
        let source = |index: usize| sources.get(index).map(Field::name).unwrap_or_default();
        let mut cmd = CommandBuilder::new(self.type_name(), name);
        match self {
            Self::Constant(core) => {
                cmd.values("values", core.values());
            }
            Self::Xi => {}
            Self::NodeValue(core) => core.describe(&mut cmd),
            Self::TimeValue(core) => {
                cmd.named("time_keeper", &core.keeper_name());
            }
            Self::Add(core) => {
                cmd.keyword("fields").name(&source(0)).name(&source(1));
                cmd.values("scale_factors", &core.weights());
            }
            Self::Multiply | Self::Divide | Self::Logical(_) => {
                cmd.keyword("fields").name(&source(0)).name(&source(1));
            }
            Self::Scale(core) => {
                cmd.named("field", &source(0)).values("scale_factors", core.factors());
            }
            Self::Offset(core) => {
                cmd.named("field", &source(0)).values("offsets", core.offsets());
            }
            Self::Not => {
                cmd.named("field", &source(0));
            }
            Self::CurveLookup(core) => {
                cmd.named("curve", &core.curve_name()).named("source_field", &source(0));
            }
            Self::TimeLookup => {
                cmd.named("source_field", &source(0)).named("time_field", &source(1));
            }
            Self::Function => {
                cmd.named("source_field", &source(0))
                    .named("result_field", &source(1))
                    .named("reference_field", &source(2));
            }
            Self::CoordinateTransformation(core) => {
                cmd.named("field", &source(0))
                    .keyword("from")
                    .keyword(core.source_system().token())
                    .keyword("to")
                    .keyword(core.target_system().token());
            }
            Self::Compose => {
                cmd.named("texture_coordinates_field", &source(0))
                    .named("find_element_xi_field", &source(1))
                    .named("calculate_values_field", &source(2));
            }
            Self::ImageFilter(filter) => {
                cmd.named("field", &source(0));
                filter.describe(&mut cmd);
            }
        }
        cmd.finish()
    }

    /// Whether the core reads the external resource called `resource`.
    pub fn depends_on_external(&self, resource: &str) -> bool {
        match self {
            Self::TimeValue(core) => core.keeper_name() == resource,
            Self::CurveLookup(core) => core.curve_name() == resource,
            _ => false,
        }
    }

    /// Subscribe `on_change` to the managers of the resources this core reads.
    pub(crate) fn attach(&self, on_change: Rc<dyn Fn(&ChangeMessage)>) -> Vec<Subscription> {
        match self {
            Self::TimeValue(core) => vec![watch(core.keeper(), on_change)],
            Self::CurveLookup(core) => vec![watch(core.curve(), on_change)],
            _ => Vec::new(),
        }
    }

    /// Store or map back values assigned at a node.
    pub(crate) fn assign_at_node(
        &mut self,
        field: &str,
        sources: &[Field],
        node: NodeId,
        time: f64,
        values: &[f64],
    ) -> Result<Assignment, EvaluationError> {
        let forward = |values: Vec<f64>| -> Result<Assignment, EvaluationError> {
            let source = sources.first().ok_or_else(|| {
                EvaluationError::InvalidArgument(format!("field '{field}' has no source to assign to"))
            })?;
            Ok(Assignment::Forward {
                source: source.clone(),
                values,
            })
        };
        match self {
            Self::NodeValue(core) => {
                core.assign(node, time, values.to_vec())
                    .map_err(|e| EvaluationError::InvalidArgument(e.to_string()))?;
                Ok(Assignment::Stored)
            }
            Self::Scale(core) => forward(core.inverse(field, values)?),
            Self::Offset(core) => forward(core.inverse(values)),
            Self::CoordinateTransformation(core) => forward(core.inverse(values)),
            other => Err(EvaluationError::InvalidArgument(format!(
                "field '{field}' of type {} does not support assigning values",
                other.type_name()
            ))),
        }
    }
}

// ── Evaluation context ─────────────────────────────────────────────────────

/// What a core sees while evaluating: its field, the sources and the module.
pub(crate) struct Evaluation<'a> {
    field: &'a Field,
    sources: &'a [Field],
    module: &'a Module,
}

impl<'a> Evaluation<'a> {
    pub(crate) fn new(field: &'a Field, sources: &'a [Field], module: &'a Module) -> Self {
        Self { field, sources, module }
    }

    pub(crate) fn field_name(&self) -> String {
        self.field.name()
    }

    pub(crate) fn number_of_components(&self) -> usize {
        self.field.number_of_components()
    }

    pub(crate) fn source(&self, index: usize) -> Result<&'a Field, EvaluationError> {
        self.sources.get(index).ok_or_else(|| {
            EvaluationError::InvalidArgument(format!("field '{}' is missing source {index}", self.field.name()))
        })
    }

    pub(crate) fn module(&self) -> &'a Module {
        self.module
    }

    pub(crate) fn unsupported(&self, location: &Location) -> EvaluationError {
        EvaluationError::unsupported(&self.field.name(), location.kind())
    }

    pub(crate) fn not_defined(&self) -> EvaluationError {
        EvaluationError::NotDefined {
            field: self.field.name(),
        }
    }

    pub(crate) fn resource_unavailable(&self, resource: String) -> EvaluationError {
        EvaluationError::ExternalResourceUnavailable {
            field: self.field.name(),
            resource,
        }
    }
}

// ── Shared helpers ─────────────────────────────────────────────────────────

pub(crate) fn expect_sources(kind: &str, sources: &[Field], count: usize) -> Result<(), ConstructionError> {
    if sources.len() != count {
        return Err(ConstructionError::InvalidArgument(format!(
            "{kind} field takes {count} source field(s), {} given",
            sources.len()
        )));
    }
    Ok(())
}

/// Component count of a binary operation whose single-component operand
/// is broadcast across the other.
pub(crate) fn broadcast_components(kind: &str, a: usize, b: usize) -> Result<usize, ConstructionError> {
    if a == b || b == 1 {
        Ok(a)
    } else if a == 1 {
        Ok(b)
    } else {
        Err(ConstructionError::mismatch(format!("{kind} field operands"), a, b))
    }
}

/// Forward a resource manager's messages about `link`'s resource only.
fn watch<T: Resource + 'static>(link: &ManagedRef<T>, on_change: Rc<dyn Fn(&ChangeMessage)>) -> Subscription {
    let resource = link.downgrade();
    let fallback = link.name();
    link.subscribe(move |message| {
        let current = resource.upgrade().map(|r| r.name()).unwrap_or_else(|| fallback.clone());
        if message.concerns(&current) {
            on_change(message);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_rules() {
        assert_eq!(broadcast_components("add", 3, 3).unwrap(), 3);
        assert_eq!(broadcast_components("add", 3, 1).unwrap(), 3);
        assert_eq!(broadcast_components("add", 1, 2).unwrap(), 2);
        let err = broadcast_components("add", 2, 3).unwrap_err();
        assert!(matches!(err, ConstructionError::ComponentCountMismatch { expected: 2, found: 3, .. }));
    }

    #[test]
    fn every_type_token_is_listed() {
        let cores = [
            FieldCore::Xi,
            FieldCore::Multiply,
            FieldCore::Logical(LogicalOp::Xor),
            FieldCore::ImageFilter(ImageFilter::Sigmoid {
                minimum: 0.0,
                maximum: 1.0,
                alpha: 1.0,
                beta: 0.0,
            }),
        ];
        for core in &cores {
            assert!(CORE_TYPES.contains(&core.type_name()));
        }
        assert_eq!(CORE_TYPES.len(), 24);
    }

    #[test]
    fn compare_distinguishes_kinds_and_parameters() {
        assert!(FieldCore::Multiply.compare(&FieldCore::Multiply));
        assert!(!FieldCore::Multiply.compare(&FieldCore::Divide));
        let a = FieldCore::Add(AddCore::new(1.0, 2.0));
        assert!(a.compare(&FieldCore::Add(AddCore::new(1.0, 2.0))));
        assert!(!a.compare(&FieldCore::Add(AddCore::new(1.0, 1.0))));
    }
}
