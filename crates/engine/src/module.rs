//! Field modules — the registry owning every field of one scope.
//!
//! A [`Module`] creates and destroys fields, keeps their names unique,
//! hands out ids, owns the change clock that cache validity is judged
//! against, and broadcasts a [`FieldChange`] whenever a field is added,
//! renamed, redefined, changed or removed.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use fieldgraph_core::{
    ChangeKind, ConstructionError, Curve, EngineSettings, FieldId, Managed, MeshProvider, Notifier, Subscription,
    TimeKeeper,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::field::Field;
use crate::ops::{
    AddCore, ConstantCore, CoordinateSystem, CoordinateTransformationCore, CurveLookupCore, FieldCore, ImageFilter,
    LogicalOp, NodeValueCore, OffsetCore, ScaleCore, TimeValueCore,
};
use crate::stats::EvaluationStats;

/// A change to a field, broadcast by its module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub kind: ChangeKind,
    pub field: String,
    /// Name before the change, for `IdentifierChanged`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_name: Option<String>,
}

pub(crate) struct ModuleInner {
    name: String,
    settings: EngineSettings,
    fields: RefCell<BTreeMap<FieldId, Field>>,
    names: RefCell<HashMap<String, FieldId>>,
    next_id: Cell<u64>,
    clock: Cell<u64>,
    global_change: Cell<u64>,
    mesh: RefCell<Option<Rc<dyn MeshProvider>>>,
    notifier: Notifier<FieldChange>,
    stats: Cell<EvaluationStats>,
    change_level: Cell<u32>,
    pending: RefCell<Vec<FieldChange>>,
}

impl Drop for ModuleInner {
    fn drop(&mut self) {
        // Sources may form cycles through replace_core; release them so the
        // fields can be freed.
        for field in self.fields.get_mut().values() {
            field.0.sources.borrow_mut().clear();
            field.0.subscriptions.borrow_mut().clear();
        }
    }
}

/// Handle to a field module. Clones share the same module.
#[derive(Clone)]
pub struct Module(pub(crate) Rc<ModuleInner>);

impl Module {
    pub fn new(name: &str) -> Self {
        Self::with_settings(name, EngineSettings::default())
    }

    pub fn with_settings(name: &str, settings: EngineSettings) -> Self {
        Self(Rc::new(ModuleInner {
            name: name.to_string(),
            settings,
            fields: RefCell::new(BTreeMap::new()),
            names: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
            clock: Cell::new(0),
            global_change: Cell::new(0),
            mesh: RefCell::new(None),
            notifier: Notifier::new(),
            stats: Cell::new(EvaluationStats::default()),
            change_level: Cell::new(0),
            pending: RefCell::new(Vec::new()),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.0.settings
    }

    // ── Mesh ───────────────────────────────────────────────────────────────

    /// Attach the mesh searched by compose fields. Invalidates every cache.
    pub fn set_mesh(&self, mesh: Rc<dyn MeshProvider>) {
        *self.0.mesh.borrow_mut() = Some(mesh);
        self.0.global_change.set(self.tick());
        debug!(module = %self.0.name, "Mesh attached");
    }

    pub fn mesh(&self) -> Option<Rc<dyn MeshProvider>> {
        self.0.mesh.borrow().clone()
    }

    // ── Creation ───────────────────────────────────────────────────────────

    /// Create a field from a core and its sources.
    ///
    /// Nothing is registered unless every check passes: the name is free,
    /// every source belongs to this module and the core accepts the
    /// sources' component counts.
    pub fn create_field(&self, name: &str, core: FieldCore, sources: &[Field]) -> Result<Field, ConstructionError> {
        if name.is_empty() {
            return Err(ConstructionError::InvalidArgument("field name cannot be empty".into()));
        }
        if self.0.names.borrow().contains_key(name) {
            return Err(ConstructionError::DuplicateName(name.to_string()));
        }
        self.check_sources(name, sources)?;
        let components = core.validate(sources)?;

        let id = FieldId(self.0.next_id.get());
        self.0.next_id.set(id.0 + 1);
        let kind = core.type_name();
        let field = Field::new(id, name, components, core, sources.to_vec(), self, self.tick());
        field.attach_resources();

        self.0.fields.borrow_mut().insert(id, field.clone());
        self.0.names.borrow_mut().insert(name.to_string(), id);
        debug!(field = %name, id = %id, kind, components, "Created field");
        self.emit(FieldChange {
            kind: ChangeKind::Added,
            field: name.to_string(),
            previous_name: None,
        });
        Ok(field)
    }

    /// Create `name`, or give the existing field of that name a new core.
    pub fn define_field(&self, name: &str, core: FieldCore, sources: &[Field]) -> Result<Field, ConstructionError> {
        match self.find_field_by_name(name) {
            Some(existing) => {
                self.replace_core(&existing, core, sources)?;
                Ok(existing)
            }
            None => self.create_field(name, core, sources),
        }
    }

    /// Change what `field` computes. The component count must stay the same.
    pub fn replace_core(&self, field: &Field, core: FieldCore, sources: &[Field]) -> Result<(), ConstructionError> {
        if !self.owns(field) {
            return Err(ConstructionError::NotFound(field.name()));
        }
        let name = field.name();
        self.check_sources(&name, sources)?;
        let components = core.validate(sources)?;
        if components != field.number_of_components() {
            return Err(ConstructionError::mismatch(
                format!("redefinition of field '{name}'"),
                field.number_of_components(),
                components,
            ));
        }
        let kind = core.type_name();
        *field.0.core.borrow_mut() = core;
        *field.0.sources.borrow_mut() = sources.to_vec();
        field.attach_resources();
        field.0.change_stamp.set(self.tick());
        field.clear_cache();
        debug!(field = %name, kind, "Replaced field core");
        self.emit(FieldChange {
            kind: ChangeKind::ObjectChanged,
            field: name,
            previous_name: None,
        });
        Ok(())
    }

    fn check_sources(&self, name: &str, sources: &[Field]) -> Result<(), ConstructionError> {
        for source in sources {
            if !self.owns(source) {
                return Err(ConstructionError::ForeignSource {
                    field: name.to_string(),
                    source_field: source.name(),
                });
            }
        }
        Ok(())
    }

    /// Whether `field` is registered in this module.
    pub fn owns(&self, field: &Field) -> bool {
        self.0.fields.borrow().get(&field.id()).is_some_and(|f| f == field)
    }

    // ── Typed constructors ─────────────────────────────────────────────────

    pub fn create_constant(&self, name: &str, values: Vec<f64>) -> Result<Field, ConstructionError> {
        self.create_field(name, FieldCore::Constant(ConstantCore::new(values)?), &[])
    }

    pub fn create_xi(&self, name: &str) -> Result<Field, ConstructionError> {
        self.create_field(name, FieldCore::Xi, &[])
    }

    /// A node value field with no parameters yet; assign them with
    /// [`Field::set_values_at_node`].
    pub fn create_node_value(&self, name: &str, number_of_components: usize) -> Result<Field, ConstructionError> {
        let core = NodeValueCore::new(number_of_components)?;
        self.create_field(name, FieldCore::NodeValue(core), &[])
    }

    pub fn create_time_value(&self, name: &str, keeper: &Managed<TimeKeeper>) -> Result<Field, ConstructionError> {
        self.create_field(name, FieldCore::TimeValue(TimeValueCore::new(keeper)), &[])
    }

    pub fn create_add(&self, name: &str, a: &Field, b: &Field) -> Result<Field, ConstructionError> {
        self.create_weighted_add(name, a, b, 1.0, 1.0)
    }

    /// `w1·a + w2·b`.
    pub fn create_weighted_add(
        &self,
        name: &str,
        a: &Field,
        b: &Field,
        w1: f64,
        w2: f64,
    ) -> Result<Field, ConstructionError> {
        self.create_field(name, FieldCore::Add(AddCore::new(w1, w2)), &[a.clone(), b.clone()])
    }

    pub fn create_multiply(&self, name: &str, a: &Field, b: &Field) -> Result<Field, ConstructionError> {
        self.create_field(name, FieldCore::Multiply, &[a.clone(), b.clone()])
    }

    pub fn create_divide(&self, name: &str, a: &Field, b: &Field) -> Result<Field, ConstructionError> {
        self.create_field(name, FieldCore::Divide, &[a.clone(), b.clone()])
    }

    pub fn create_scale(&self, name: &str, source: &Field, factors: Vec<f64>) -> Result<Field, ConstructionError> {
        self.create_field(name, FieldCore::Scale(ScaleCore::new(factors)?), &[source.clone()])
    }

    pub fn create_offset(&self, name: &str, source: &Field, offsets: Vec<f64>) -> Result<Field, ConstructionError> {
        self.create_field(name, FieldCore::Offset(OffsetCore::new(offsets)?), &[source.clone()])
    }

    pub fn create_logical(&self, name: &str, op: LogicalOp, a: &Field, b: &Field) -> Result<Field, ConstructionError> {
        self.create_field(name, FieldCore::Logical(op), &[a.clone(), b.clone()])
    }

    pub fn create_not(&self, name: &str, source: &Field) -> Result<Field, ConstructionError> {
        self.create_field(name, FieldCore::Not, &[source.clone()])
    }

    pub fn create_curve_lookup(
        &self,
        name: &str,
        source: &Field,
        curve: &Managed<Curve>,
    ) -> Result<Field, ConstructionError> {
        let core = FieldCore::CurveLookup(CurveLookupCore::new(curve));
        self.create_field(name, core, &[source.clone()])
    }

    pub fn create_time_lookup(&self, name: &str, source: &Field, time_field: &Field) -> Result<Field, ConstructionError> {
        self.create_field(name, FieldCore::TimeLookup, &[source.clone(), time_field.clone()])
    }

    /// `result` evaluated where `reference` takes the values of `source`.
    pub fn create_function(
        &self,
        name: &str,
        source: &Field,
        result: &Field,
        reference: &Field,
    ) -> Result<Field, ConstructionError> {
        self.create_field(
            name,
            FieldCore::Function,
            &[source.clone(), result.clone(), reference.clone()],
        )
    }

    pub fn create_coordinate_transformation(
        &self,
        name: &str,
        source: &Field,
        from: CoordinateSystem,
        to: CoordinateSystem,
    ) -> Result<Field, ConstructionError> {
        let core = FieldCore::CoordinateTransformation(CoordinateTransformationCore::new(from, to));
        self.create_field(name, core, &[source.clone()])
    }

    pub fn create_compose(
        &self,
        name: &str,
        texture_coordinates: &Field,
        find_element_xi: &Field,
        calculate_values: &Field,
    ) -> Result<Field, ConstructionError> {
        self.create_field(
            name,
            FieldCore::Compose,
            &[
                texture_coordinates.clone(),
                find_element_xi.clone(),
                calculate_values.clone(),
            ],
        )
    }

    pub fn create_image_filter(
        &self,
        name: &str,
        source: &Field,
        filter: ImageFilter,
    ) -> Result<Field, ConstructionError> {
        self.create_field(name, FieldCore::ImageFilter(filter), &[source.clone()])
    }

    // ── Lookup, rename and destruction ─────────────────────────────────────

    pub fn find_field_by_name(&self, name: &str) -> Option<Field> {
        let id = *self.0.names.borrow().get(name)?;
        self.0.fields.borrow().get(&id).cloned()
    }

    /// All fields in creation order.
    pub fn fields(&self) -> Vec<Field> {
        self.0.fields.borrow().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.fields.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.fields.borrow().is_empty()
    }

    pub(crate) fn rename_field(&self, field: &Field, new_name: &str) -> Result<(), ConstructionError> {
        if new_name.is_empty() {
            return Err(ConstructionError::InvalidArgument("field name cannot be empty".into()));
        }
        let old_name = field.name();
        if old_name == new_name {
            return Ok(());
        }
        if self.0.names.borrow().contains_key(new_name) {
            return Err(ConstructionError::DuplicateName(new_name.to_string()));
        }
        {
            let mut names = self.0.names.borrow_mut();
            names.remove(&old_name);
            names.insert(new_name.to_string(), field.id());
        }
        *field.0.name.borrow_mut() = new_name.to_string();
        debug!(field = %new_name, previous = %old_name, "Renamed field");
        self.emit(FieldChange {
            kind: ChangeKind::IdentifierChanged,
            field: new_name.to_string(),
            previous_name: Some(old_name),
        });
        Ok(())
    }

    /// Deregister `field`. Refused while another field uses it as a source.
    ///
    /// Handles held elsewhere stay valid but the field no longer evaluates.
    pub fn destroy_field(&self, field: &Field) -> Result<(), ConstructionError> {
        if !self.owns(field) {
            return Err(ConstructionError::NotFound(field.name()));
        }
        let users: Vec<String> = self
            .0
            .fields
            .borrow()
            .values()
            .filter(|f| *f != field && f.0.sources.borrow().contains(field))
            .map(Field::name)
            .collect();
        let name = field.name();
        if !users.is_empty() {
            return Err(ConstructionError::InUse { field: name, users });
        }
        self.0.fields.borrow_mut().remove(&field.id());
        self.0.names.borrow_mut().remove(&name);
        field.detach();
        debug!(field = %name, "Destroyed field");
        self.emit(FieldChange {
            kind: ChangeKind::Removed,
            field: name,
            previous_name: None,
        });
        Ok(())
    }

    // ── Change notification ────────────────────────────────────────────────

    /// Subscribe to field changes. The subscription ends when the token drops.
    pub fn subscribe(&self, callback: impl Fn(&FieldChange) + 'static) -> Subscription {
        self.0.notifier.subscribe(callback)
    }

    /// Hold field change messages until the matching [`end_change`](Self::end_change).
    /// Calls nest.
    pub fn begin_change(&self) {
        self.0.change_level.set(self.0.change_level.get() + 1);
    }

    /// Close a [`begin_change`](Self::begin_change); the outermost call
    /// delivers the held messages, each distinct message once.
    pub fn end_change(&self) {
        let level = self.0.change_level.get();
        if level == 0 {
            warn!(module = %self.0.name, "end_change without begin_change");
            return;
        }
        self.0.change_level.set(level - 1);
        if level == 1 {
            let pending = std::mem::take(&mut *self.0.pending.borrow_mut());
            for change in &pending {
                self.0.notifier.notify(change);
            }
        }
    }

    fn emit(&self, change: FieldChange) {
        if self.0.change_level.get() > 0 {
            let mut pending = self.0.pending.borrow_mut();
            if !pending.contains(&change) {
                pending.push(change);
            }
            return;
        }
        self.0.notifier.notify(&change);
    }

    pub(crate) fn field_changed(&self, field: &Field, kind: ChangeKind, previous_name: Option<String>) {
        self.emit(FieldChange {
            kind,
            field: field.name(),
            previous_name,
        });
    }

    // ── Clock, caches and statistics ───────────────────────────────────────

    /// Advance the change clock and return the new reading.
    pub(crate) fn tick(&self) -> u64 {
        let now = self.0.clock.get() + 1;
        self.0.clock.set(now);
        now
    }

    pub(crate) fn clock(&self) -> u64 {
        self.0.clock.get()
    }

    pub(crate) fn global_change(&self) -> u64 {
        self.0.global_change.get()
    }

    /// Forget every cached result in the module.
    pub fn clear_caches(&self) {
        for field in self.0.fields.borrow().values() {
            field.clear_cache();
        }
    }

    pub fn statistics(&self) -> EvaluationStats {
        self.0.stats.get()
    }

    pub fn reset_statistics(&self) {
        self.0.stats.set(EvaluationStats::default());
    }

    pub(crate) fn record(&self, update: impl FnOnce(&mut EvaluationStats)) {
        if !self.0.settings.record_statistics {
            return;
        }
        let mut stats = self.0.stats.get();
        update(&mut stats);
        self.0.stats.set(stats);
    }
}

impl PartialEq for Module {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.0.name)
            .field("fields", &self.0.fields.borrow().len())
            .field("clock", &self.0.clock.get())
            .finish()
    }
}
