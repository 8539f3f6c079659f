//! The field node — a named, cached computation in a module's graph.
//!
//! A [`Field`] is a cheap, clonable handle; the field lives as long as its
//! longest holder (its module, a dependent field, or a caller). Evaluation
//! walks the sources depth-first. Each field answers from its cache when the
//! cached location matches and nothing upstream changed since it was filled;
//! otherwise its core recomputes and the result is copied into the cache.

use std::cell::{Cell, Ref, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use fieldgraph_core::{
    ChangeKind, ChangeMessage, ConstructionError, Element, EvaluationError, FieldId, FieldValue, Location, NodeId,
    Subscription,
};
use tracing::{debug, trace};

use crate::cache::FieldCache;
use crate::module::{Module, ModuleInner};
use crate::ops::{Assignment, Evaluation, FieldCore};

pub(crate) struct FieldInner {
    pub(crate) id: FieldId,
    pub(crate) name: RefCell<String>,
    pub(crate) number_of_components: usize,
    pub(crate) core: RefCell<FieldCore>,
    pub(crate) sources: RefCell<Vec<Field>>,
    pub(crate) cache: RefCell<FieldCache>,
    pub(crate) evaluating: Cell<bool>,
    pub(crate) assigning: Cell<bool>,
    walking: Cell<bool>,
    /// `(clock, stamp)`: newest upstream change stamp as of a clock reading.
    upstream_change: Cell<Option<(u64, u64)>>,
    pub(crate) module: RefCell<Weak<ModuleInner>>,
    pub(crate) subscriptions: RefCell<Vec<Subscription>>,
    pub(crate) change_stamp: Cell<u64>,
    pub(crate) evaluation_count: Cell<u64>,
}

/// Handle to a field. Clones share the same field; equality is identity.
#[derive(Clone)]
pub struct Field(pub(crate) Rc<FieldInner>);

/// Clears a re-entrancy flag however the guarded call ends.
struct FlagGuard<'a>(&'a Cell<bool>);

impl<'a> FlagGuard<'a> {
    fn raise(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Field {
    pub(crate) fn new(
        id: FieldId,
        name: &str,
        number_of_components: usize,
        core: FieldCore,
        sources: Vec<Field>,
        module: &Module,
        change_stamp: u64,
    ) -> Self {
        Self(Rc::new(FieldInner {
            id,
            name: RefCell::new(name.to_string()),
            number_of_components,
            core: RefCell::new(core),
            sources: RefCell::new(sources),
            cache: RefCell::new(FieldCache::new(number_of_components)),
            evaluating: Cell::new(false),
            assigning: Cell::new(false),
            walking: Cell::new(false),
            upstream_change: Cell::new(None),
            module: RefCell::new(Rc::downgrade(&module.0)),
            subscriptions: RefCell::new(Vec::new()),
            change_stamp: Cell::new(change_stamp),
            evaluation_count: Cell::new(0),
        }))
    }

    // ── Identity ───────────────────────────────────────────────────────────

    pub fn id(&self) -> FieldId {
        self.0.id
    }

    pub fn name(&self) -> String {
        self.0.name.borrow().clone()
    }

    /// Rename the field. Names are unique within the module.
    pub fn set_name(&self, name: &str) -> Result<(), ConstructionError> {
        match self.module() {
            Some(module) => module.rename_field(self, name),
            None => {
                *self.0.name.borrow_mut() = name.to_string();
                Ok(())
            }
        }
    }

    /// Fixed at construction.
    pub fn number_of_components(&self) -> usize {
        self.0.number_of_components
    }

    pub fn sources(&self) -> Vec<Field> {
        self.0.sources.borrow().clone()
    }

    pub fn core(&self) -> Ref<'_, FieldCore> {
        self.0.core.borrow()
    }

    /// The core's `describe` type token.
    pub fn core_type(&self) -> &'static str {
        self.0.core.borrow().type_name()
    }

    /// The owning module, or `None` once the field was destroyed or the
    /// module dropped.
    pub fn module(&self) -> Option<Module> {
        self.0.module.borrow().upgrade().map(Module)
    }

    fn require_module(&self) -> Result<Module, EvaluationError> {
        self.module()
            .ok_or_else(|| EvaluationError::Detached { field: self.name() })
    }

    /// Canonical command that rebuilds this field.
    pub fn describe(&self) -> String {
        self.0.core.borrow().describe(&self.name(), &self.0.sources.borrow())
    }

    /// Same configuration: component count, core parameters and source names.
    pub fn compare(&self, other: &Field) -> bool {
        if self.number_of_components() != other.number_of_components() {
            return false;
        }
        if !self.0.core.borrow().compare(&other.0.core.borrow()) {
            return false;
        }
        let mine: Vec<String> = self.0.sources.borrow().iter().map(Field::name).collect();
        let theirs: Vec<String> = other.0.sources.borrow().iter().map(Field::name).collect();
        mine == theirs
    }

    // ── Evaluation ─────────────────────────────────────────────────────────

    /// Evaluate at `location`, with derivatives if the location asks for them.
    ///
    /// A field coordinate location naming this field returns its carried
    /// value directly. Requested derivatives may come back absent when an
    /// operand could not supply them.
    pub fn evaluate(&self, location: &Location) -> Result<FieldValue, EvaluationError> {
        let module = self.require_module()?;

        if let Location::FieldCoordinate(coordinates) = location {
            if coordinates.reference_field() == self.id() {
                return self.carried_value(location, coordinates.value());
            }
        }

        if self.0.evaluating.get() {
            module.record(|s| s.cycles_detected += 1);
            debug!(field = %self.name(), "Cyclic dependency detected");
            return Err(EvaluationError::CyclicDependency { field: self.name() });
        }

        let latest_change = self.latest_change(&module);
        if let Some(hit) = self.0.cache.borrow().lookup(location, latest_change) {
            module.record(|s| s.cache_hits += 1);
            trace!(field = %self.name(), location = location.kind(), "Cache hit");
            return Ok(hit);
        }
        module.record(|s| s.cache_misses += 1);
        trace!(field = %self.name(), location = location.kind(), "Cache miss");

        let _guard = FlagGuard::raise(&self.0.evaluating);
        self.0.evaluation_count.set(self.0.evaluation_count.get() + 1);

        let sources = self.0.sources.borrow().clone();
        let value = {
            let core = self.0.core.borrow();
            core.evaluate(&Evaluation::new(self, &sources, &module), location)?
        };
        debug_assert_eq!(value.len(), self.number_of_components(), "core returned wrong component count");
        let value = self.normalize(value, location, &module);

        self.0.cache.borrow_mut().store(location, &value, module.clock());
        module.record(|s| s.core_evaluations += 1);
        Ok(value)
    }

    /// Drop derivatives that were not asked for or do not match the location.
    fn normalize(&self, value: FieldValue, location: &Location, module: &Module) -> FieldValue {
        if !location.wants_derivatives() {
            return value.without_derivatives();
        }
        if value.has_derivatives() && value.number_of_derivatives == location.number_of_derivatives() {
            return value;
        }
        module.record(|s| s.derivatives_degraded += 1);
        debug!(field = %self.name(), location = location.kind(), "Derivatives not available");
        value.without_derivatives()
    }

    fn carried_value(&self, location: &Location, carried: &FieldValue) -> Result<FieldValue, EvaluationError> {
        if carried.len() != self.number_of_components() {
            return Err(EvaluationError::InvalidArgument(format!(
                "field '{}' has {} components but {} coordinate values were given",
                self.name(),
                self.number_of_components(),
                carried.len()
            )));
        }
        if location.wants_derivatives() {
            Ok(carried.clone())
        } else {
            Ok(carried.clone().without_derivatives())
        }
    }

    /// Evaluate at a mesh node.
    pub fn evaluate_at_node(&self, node: NodeId, time: f64) -> Result<FieldValue, EvaluationError> {
        self.evaluate(&Location::node(node, time))
    }

    /// Evaluate inside `element` at local coordinates `xi`.
    pub fn evaluate_at_element_xi(
        &self,
        element: &Element,
        xi: &[f64],
        time: f64,
        want_derivatives: bool,
    ) -> Result<FieldValue, EvaluationError> {
        let location = Location::element_xi(element.clone(), xi, time)?.with_derivatives(want_derivatives);
        self.evaluate(&location)
    }

    /// Evaluate where `reference` takes the values `values`.
    pub fn evaluate_at_field_coordinates(
        &self,
        reference: &Field,
        values: &[f64],
        time: f64,
    ) -> Result<FieldValue, EvaluationError> {
        if values.len() != reference.number_of_components() {
            return Err(EvaluationError::InvalidArgument(format!(
                "field '{}' has {} components but {} coordinate values were given",
                reference.name(),
                reference.number_of_components(),
                values.len()
            )));
        }
        let location = Location::field_coordinate(reference.id(), FieldValue::values_only(values.to_vec()), time);
        self.evaluate(&location)
    }

    /// Whether evaluation at `location` succeeds.
    pub fn is_defined_at(&self, location: &Location) -> bool {
        self.evaluate(&location.clone().with_derivatives(false)).is_ok()
    }

    /// Assign values at a node.
    ///
    /// Node value fields store them; scale, offset and coordinate
    /// transformation fields map them back and assign to their source. A
    /// chain of such fields leading back to itself is a cyclic dependency.
    pub fn set_values_at_node(&self, node: NodeId, time: f64, values: &[f64]) -> Result<(), EvaluationError> {
        let module = self.require_module()?;
        if self.0.assigning.get() {
            module.record(|s| s.cycles_detected += 1);
            debug!(field = %self.name(), "Cyclic assignment detected");
            return Err(EvaluationError::CyclicDependency { field: self.name() });
        }
        if values.len() != self.number_of_components() {
            return Err(EvaluationError::InvalidArgument(format!(
                "field '{}' has {} components but {} values were given",
                self.name(),
                self.number_of_components(),
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(EvaluationError::InvalidArgument("assigned values must be finite".into()));
        }
        if let Some(mesh) = module.mesh() {
            if !mesh.has_node(node) {
                return Err(EvaluationError::InvalidArgument(format!("node {node} is not in the mesh")));
            }
        }
        let sources = self.sources();
        let assignment = self
            .0
            .core
            .borrow_mut()
            .assign_at_node(&self.name(), &sources, node, time, values)?;
        match assignment {
            Assignment::Stored => {
                self.mark_changed();
                Ok(())
            }
            Assignment::Forward { source, values } => {
                let _guard = FlagGuard::raise(&self.0.assigning);
                source.set_values_at_node(node, time, &values)
            }
        }
    }

    // ── Cache and change tracking ──────────────────────────────────────────

    /// Forget the cached result.
    pub fn clear_cache(&self) {
        self.0.cache.borrow_mut().clear();
    }

    /// Module clock reading when the cache was last filled, if it holds a result.
    pub fn cache_stamp(&self) -> Option<u64> {
        self.0.cache.borrow().stamp()
    }

    /// Whether the cached result is still current with respect to every
    /// upstream change.
    pub fn has_valid_cache(&self) -> bool {
        let Some(module) = self.module() else {
            return false;
        };
        let latest = self.latest_change(&module);
        self.0.cache.borrow().is_current(latest)
    }

    /// Whether the cached result carries valid derivatives.
    pub fn cache_has_derivatives(&self) -> bool {
        self.0.cache.borrow().derivatives_valid()
    }

    /// Number of times the core has been asked to evaluate.
    pub fn evaluation_count(&self) -> u64 {
        self.0.evaluation_count.get()
    }

    /// Newest change stamp of this field, everything upstream of it and
    /// module-wide changes.
    pub(crate) fn latest_change(&self, module: &Module) -> u64 {
        let (upstream, _) = self.upstream_change(module.clock());
        upstream.max(module.global_change())
    }

    /// Newest change stamp of this field and its upstream closure.
    ///
    /// Every stamp or source change ticks the clock, so a result computed
    /// at the current clock reading is reused. Results that stopped at a
    /// cycle are not complete and are not kept.
    fn upstream_change(&self, clock: u64) -> (u64, bool) {
        if let Some((at, stamp)) = self.0.upstream_change.get() {
            if at == clock {
                return (stamp, true);
            }
        }
        if self.0.walking.get() {
            return (self.0.change_stamp.get(), false);
        }
        let _guard = FlagGuard::raise(&self.0.walking);
        let mut latest = self.0.change_stamp.get();
        let mut complete = true;
        for source in self.0.sources.borrow().iter() {
            let (stamp, whole) = source.upstream_change(clock);
            latest = latest.max(stamp);
            complete &= whole;
        }
        if complete {
            self.0.upstream_change.set(Some((clock, latest)));
        }
        (latest, complete)
    }

    /// Record that this field's values changed and tell the module.
    pub(crate) fn mark_changed(&self) {
        let Some(module) = self.module() else {
            return;
        };
        self.0.change_stamp.set(module.tick());
        self.0.cache.borrow_mut().clear();
        module.field_changed(self, ChangeKind::ObjectChanged, None);
    }

    /// Subscribe to the resources the current core reads, replacing any
    /// earlier subscriptions.
    pub(crate) fn attach_resources(&self) {
        let weak = Rc::downgrade(&self.0);
        let on_change: Rc<dyn Fn(&ChangeMessage)> = Rc::new(move |message: &ChangeMessage| {
            if let Some(inner) = weak.upgrade() {
                let field = Field(inner);
                debug!(
                    field = %field.name(),
                    resource = %message.name,
                    kind = ?message.kind,
                    "External resource changed"
                );
                field.mark_changed();
            }
        });
        let subscriptions = self.0.core.borrow().attach(on_change);
        *self.0.subscriptions.borrow_mut() = subscriptions;
    }

    /// Cut the field loose from its module.
    pub(crate) fn detach(&self) {
        *self.0.module.borrow_mut() = Weak::new();
        self.0.sources.borrow_mut().clear();
        self.0.subscriptions.borrow_mut().clear();
        self.0.cache.borrow_mut().clear();
    }

    // ── Dependencies ───────────────────────────────────────────────────────

    /// Whether `other` is reachable through this field's sources.
    pub fn depends_on_field(&self, other: &Field) -> bool {
        let mut visited = HashSet::new();
        let mut stack = self.sources();
        while let Some(field) = stack.pop() {
            if field == *other {
                return true;
            }
            if visited.insert(field.id()) {
                stack.extend(field.sources());
            }
        }
        false
    }

    /// Whether this field's core reads the external resource `resource`.
    pub fn depends_on_external(&self, resource: &str) -> bool {
        self.0.core.borrow().depends_on_external(resource)
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Field {}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("id", &self.0.id)
            .field("name", &*self.0.name.borrow())
            .field("type", &self.core_type())
            .field("components", &self.0.number_of_components)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::Module;
    use fieldgraph_core::{Element, ElementId, EvaluationError, Location, Mesh, NodeId};
    use std::rc::Rc;

    fn line_mesh() -> (Rc<Mesh>, Element) {
        let mut mesh = Mesh::new();
        mesh.add_node(NodeId(1));
        mesh.add_node(NodeId(2));
        let element = Element::new(ElementId(1), vec![NodeId(1), NodeId(2)]).unwrap();
        mesh.add_element(element.clone()).unwrap();
        (Rc::new(mesh), element)
    }

    #[test]
    fn second_evaluation_hits_cache() {
        let module = Module::new("test");
        let a = module.create_constant("a", vec![2.0]).unwrap();
        let b = module.create_constant("b", vec![3.0]).unwrap();
        let product = module.create_multiply("ab", &a, &b).unwrap();
        let here = Location::node(NodeId(1), 0.0);
        let first = product.evaluate(&here).unwrap();
        let second = product.evaluate(&here).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.values, vec![6.0]);
        assert_eq!(product.evaluation_count(), 1);
        assert!(product.has_valid_cache());
        assert_eq!(module.statistics().cache_hits, 1);
    }

    #[test]
    fn moving_location_recomputes() {
        let module = Module::new("test");
        let (mesh, element) = line_mesh();
        module.set_mesh(mesh);
        let xi = module.create_xi("xi").unwrap();
        let a = xi.evaluate_at_element_xi(&element, &[0.25], 0.0, false).unwrap();
        let b = xi.evaluate_at_element_xi(&element, &[0.75], 0.0, false).unwrap();
        assert_eq!(a.values, vec![0.25, 0.0, 0.0]);
        assert_eq!(b.values, vec![0.75, 0.0, 0.0]);
        assert_eq!(xi.evaluation_count(), 2);
    }

    #[test]
    fn derivative_request_after_plain_request_recomputes() {
        let module = Module::new("test");
        let (_, element) = line_mesh();
        let xi = module.create_xi("xi").unwrap();
        xi.evaluate_at_element_xi(&element, &[0.5], 0.0, false).unwrap();
        let with = xi.evaluate_at_element_xi(&element, &[0.5], 0.0, true).unwrap();
        assert_eq!(with.derivatives, Some(vec![1.0, 0.0, 0.0]));
        assert_eq!(xi.evaluation_count(), 2);
        assert!(xi.cache_has_derivatives());
        xi.evaluate_at_element_xi(&element, &[0.5], 0.0, false).unwrap();
        assert_eq!(xi.evaluation_count(), 2);
    }

    #[test]
    fn clear_cache_forces_recompute() {
        let module = Module::new("test");
        let c = module.create_constant("c", vec![1.0]).unwrap();
        let here = Location::node(NodeId(1), 0.0);
        c.evaluate(&here).unwrap();
        assert!(c.cache_stamp().is_some());
        c.clear_cache();
        assert!(c.cache_stamp().is_none());
        c.evaluate(&here).unwrap();
        assert_eq!(c.evaluation_count(), 2);
    }

    #[test]
    fn unsupported_location_is_reported() {
        let module = Module::new("test");
        let xi = module.create_xi("xi").unwrap();
        let err = xi.evaluate_at_node(NodeId(1), 0.0).unwrap_err();
        assert!(matches!(err, EvaluationError::UnsupportedLocation { ref location, .. } if location == "node"));
        assert!(!xi.is_defined_at(&Location::node(NodeId(1), 0.0)));
    }

    #[test]
    fn field_coordinate_reference_returns_carried_value() {
        let module = Module::new("test");
        let x = module.create_constant("x", vec![0.0]).unwrap();
        let two = module.create_constant("two", vec![2.0]).unwrap();
        let doubled = module.create_multiply("doubled", &x, &two).unwrap();
        let value = doubled.evaluate_at_field_coordinates(&x, &[1.5], 0.0).unwrap();
        assert_eq!(value.values, vec![3.0]);
        assert!(doubled.evaluate_at_field_coordinates(&x, &[1.0, 2.0], 0.0).is_err());
    }

    #[test]
    fn set_values_at_node_flows_back_through_offset() {
        let module = Module::new("test");
        let u = module.create_node_value("u", 2).unwrap();
        let shifted = module.create_offset("shifted", &u, vec![1.0, 10.0]).unwrap();
        shifted.set_values_at_node(NodeId(4), 0.0, &[3.0, 12.0]).unwrap();
        assert_eq!(u.evaluate_at_node(NodeId(4), 0.0).unwrap().values, vec![2.0, 2.0]);
        assert_eq!(shifted.evaluate_at_node(NodeId(4), 0.0).unwrap().values, vec![3.0, 12.0]);
        let err = shifted.set_values_at_node(NodeId(4), 0.0, &[1.0]).unwrap_err();
        assert!(matches!(err, EvaluationError::InvalidArgument(_)));
    }

    #[test]
    fn assignment_invalidates_dependents() {
        let module = Module::new("test");
        let u = module.create_node_value("u", 1).unwrap();
        let two = module.create_constant("two", vec![2.0]).unwrap();
        let doubled = module.create_multiply("doubled", &u, &two).unwrap();
        u.set_values_at_node(NodeId(1), 0.0, &[1.0]).unwrap();
        assert_eq!(doubled.evaluate_at_node(NodeId(1), 0.0).unwrap().values, vec![2.0]);
        u.set_values_at_node(NodeId(1), 0.0, &[5.0]).unwrap();
        assert!(!doubled.has_valid_cache());
        assert_eq!(doubled.evaluate_at_node(NodeId(1), 0.0).unwrap().values, vec![10.0]);
    }

    #[test]
    fn unsupported_assignment_is_refused() {
        let module = Module::new("test");
        let c = module.create_constant("c", vec![1.0]).unwrap();
        assert!(c.set_values_at_node(NodeId(1), 0.0, &[2.0]).is_err());
    }

    #[test]
    fn dependency_queries() {
        let module = Module::new("test");
        let a = module.create_constant("a", vec![1.0]).unwrap();
        let b = module.create_constant("b", vec![1.0]).unwrap();
        let sum = module.create_add("sum", &a, &b).unwrap();
        let twice = module.create_add("twice", &sum, &sum).unwrap();
        assert!(twice.depends_on_field(&a));
        assert!(!a.depends_on_field(&twice));
        assert!(!twice.depends_on_external("ramp"));
    }

    #[test]
    fn dropped_module_detaches_fields() {
        let module = Module::new("test");
        let c = module.create_constant("c", vec![1.0]).unwrap();
        drop(module);
        let err = c.evaluate_at_node(NodeId(1), 0.0).unwrap_err();
        assert!(matches!(err, EvaluationError::Detached { .. }));
        assert!(c.module().is_none());
    }
}
