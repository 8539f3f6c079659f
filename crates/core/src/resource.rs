//! External resources, their managers and change notification.
//!
//! Curves and time keepers live outside the field graph. A field that reads
//! one keeps only a weak reference to it plus a [`Subscription`] to the
//! resource's manager; when the manager reports a change the field drops its
//! cached values. Subscriptions deregister themselves when dropped.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConstructionError;

// ── Observer ───────────────────────────────────────────────────────────────

type Callback<M> = Rc<dyn Fn(&M)>;

struct Registry<M> {
    next_id: u64,
    callbacks: Vec<(u64, Callback<M>)>,
}

/// A list of callbacks interested in messages of type `M`.
///
/// Cloning shares the same callback list.
pub struct Notifier<M> {
    registry: Rc<RefCell<Registry<M>>>,
}

impl<M: 'static> Notifier<M> {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                next_id: 1,
                callbacks: Vec::new(),
            })),
        }
    }

    /// Register a callback. It stays registered while the returned token lives.
    pub fn subscribe(&self, callback: impl Fn(&M) + 'static) -> Subscription {
        let id = {
            let mut registry = self.registry.borrow_mut();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.callbacks.push((id, Rc::new(callback)));
            id
        };
        let weak: Weak<RefCell<Registry<M>>> = Rc::downgrade(&self.registry);
        Subscription {
            id,
            release: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    registry.borrow_mut().callbacks.retain(|(cb_id, _)| *cb_id != id);
                }
            })),
        }
    }

    /// Deliver `message` to every callback registered at the time of the call.
    ///
    /// Callbacks may subscribe or unsubscribe while being notified.
    pub fn notify(&self, message: &M) {
        let snapshot: Vec<Callback<M>> = self
            .registry
            .borrow()
            .callbacks
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();
        for callback in snapshot {
            callback(message);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.borrow().callbacks.len()
    }
}

impl<M: 'static> Default for Notifier<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for Notifier<M> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
        }
    }
}

impl<M> fmt::Debug for Notifier<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("subscribers", &self.registry.borrow().callbacks.len())
            .finish()
    }
}

/// Scoped registration with a [`Notifier`]. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// ── Change messages ────────────────────────────────────────────────────────

/// What happened to a managed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    IdentifierChanged,
    ObjectChanged,
}

/// A change broadcast by a [`Manager`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeMessage {
    pub kind: ChangeKind,
    /// Name of the object after the change.
    pub name: String,
    /// Name before the change, for `IdentifierChanged`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_name: Option<String>,
}

impl ChangeMessage {
    /// Whether the message is about the object currently or previously called `name`.
    pub fn concerns(&self, name: &str) -> bool {
        self.name == name || self.previous_name.as_deref() == Some(name)
    }
}

// ── Managed resources ──────────────────────────────────────────────────────

/// An object a [`Manager`] can hold: anything with a mutable name.
pub trait Resource {
    fn name(&self) -> String;
    fn set_name(&self, name: &str);
}

/// A managed resource together with its manager's notifier.
///
/// This is what fields receive when they are built on a resource: enough to
/// read it and to subscribe to its changes, without owning the manager.
pub struct Managed<T> {
    resource: Rc<T>,
    notifier: Notifier<ChangeMessage>,
}

impl<T: Resource + 'static> Managed<T> {
    pub fn resource(&self) -> &Rc<T> {
        &self.resource
    }

    /// Weak reference to the resource, as held by dependent fields.
    pub fn downgrade(&self) -> Weak<T> {
        Rc::downgrade(&self.resource)
    }

    /// Non-owning handle that can still subscribe to the manager.
    pub fn weak(&self) -> ManagedRef<T> {
        ManagedRef {
            resource: Rc::downgrade(&self.resource),
            last_name: self.resource.name(),
            notifier: self.notifier.clone(),
        }
    }

    /// Subscribe to the owning manager's change messages.
    pub fn subscribe(&self, callback: impl Fn(&ChangeMessage) + 'static) -> Subscription {
        self.notifier.subscribe(callback)
    }

    /// Apply `f` to the resource, then broadcast `ObjectChanged`.
    pub fn modify<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let result = f(&self.resource);
        self.notifier.notify(&ChangeMessage {
            kind: ChangeKind::ObjectChanged,
            name: self.resource.name(),
            previous_name: None,
        });
        result
    }
}

impl<T> Clone for Managed<T> {
    fn clone(&self) -> Self {
        Self {
            resource: Rc::clone(&self.resource),
            notifier: self.notifier.clone(),
        }
    }
}

impl<T> Deref for Managed<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.resource
    }
}

impl<T: fmt::Debug> fmt::Debug for Managed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.resource.fmt(f)
    }
}

/// Weak counterpart of [`Managed`], held by readers that must not keep the
/// resource alive.
pub struct ManagedRef<T> {
    resource: Weak<T>,
    last_name: String,
    notifier: Notifier<ChangeMessage>,
}

impl<T: Resource + 'static> ManagedRef<T> {
    pub fn upgrade(&self) -> Option<Rc<T>> {
        self.resource.upgrade()
    }

    /// Current name, or the name at the time the handle was taken if the
    /// resource is gone.
    pub fn name(&self) -> String {
        self.resource
            .upgrade()
            .map(|r| r.name())
            .unwrap_or_else(|| self.last_name.clone())
    }

    pub fn downgrade(&self) -> Weak<T> {
        Weak::clone(&self.resource)
    }

    pub fn is_alive(&self) -> bool {
        self.resource.strong_count() > 0
    }

    pub fn subscribe(&self, callback: impl Fn(&ChangeMessage) + 'static) -> Subscription {
        self.notifier.subscribe(callback)
    }

    /// Whether both handles refer to the same resource object.
    pub fn ptr_eq(&self, other: &ManagedRef<T>) -> bool {
        Weak::ptr_eq(&self.resource, &other.resource)
    }
}

impl<T> Clone for ManagedRef<T> {
    fn clone(&self) -> Self {
        Self {
            resource: Weak::clone(&self.resource),
            last_name: self.last_name.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

impl<T> fmt::Debug for ManagedRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedRef")
            .field("name", &self.last_name)
            .field("alive", &(self.resource.strong_count() > 0))
            .finish()
    }
}

/// Named registry of resources of one type, broadcasting every change.
pub struct Manager<T> {
    items: RefCell<BTreeMap<String, Rc<T>>>,
    notifier: Notifier<ChangeMessage>,
}

impl<T: Resource + 'static> Manager<T> {
    pub fn new() -> Self {
        Self {
            items: RefCell::new(BTreeMap::new()),
            notifier: Notifier::new(),
        }
    }

    /// Add a resource under its own name. Names must be unique.
    pub fn add(&self, resource: T) -> Result<Managed<T>, ConstructionError> {
        let name = resource.name();
        if name.is_empty() {
            return Err(ConstructionError::InvalidArgument("resource name cannot be empty".into()));
        }
        if self.items.borrow().contains_key(&name) {
            return Err(ConstructionError::DuplicateName(name));
        }
        let resource = Rc::new(resource);
        self.items.borrow_mut().insert(name.clone(), Rc::clone(&resource));
        debug!(resource = %name, "Added managed resource");
        self.broadcast(ChangeKind::Added, name, None);
        Ok(Managed {
            resource,
            notifier: self.notifier.clone(),
        })
    }

    pub fn get(&self, name: &str) -> Option<Managed<T>> {
        self.items.borrow().get(name).map(|resource| Managed {
            resource: Rc::clone(resource),
            notifier: self.notifier.clone(),
        })
    }

    /// Remove a resource. Readers holding only weak references lose it.
    pub fn remove(&self, name: &str) -> Option<Rc<T>> {
        let removed = self.items.borrow_mut().remove(name);
        if removed.is_some() {
            debug!(resource = %name, "Removed managed resource");
            self.broadcast(ChangeKind::Removed, name.to_string(), None);
        }
        removed
    }

    pub fn rename(&self, name: &str, new_name: &str) -> Result<(), ConstructionError> {
        if new_name.is_empty() {
            return Err(ConstructionError::InvalidArgument("resource name cannot be empty".into()));
        }
        if name == new_name {
            return Ok(());
        }
        let mut items = self.items.borrow_mut();
        if items.contains_key(new_name) {
            return Err(ConstructionError::DuplicateName(new_name.to_string()));
        }
        let resource = items
            .remove(name)
            .ok_or_else(|| ConstructionError::NotFound(name.to_string()))?;
        resource.set_name(new_name);
        items.insert(new_name.to_string(), resource);
        drop(items);
        self.broadcast(
            ChangeKind::IdentifierChanged,
            new_name.to_string(),
            Some(name.to_string()),
        );
        Ok(())
    }

    /// Apply `f` to a resource, then broadcast `ObjectChanged`.
    pub fn modify<R>(&self, name: &str, f: impl FnOnce(&T) -> R) -> Result<R, ConstructionError> {
        let managed = self
            .get(name)
            .ok_or_else(|| ConstructionError::NotFound(name.to_string()))?;
        Ok(managed.modify(f))
    }

    /// Broadcast `ObjectChanged` for a resource mutated in place.
    pub fn notify_changed(&self, name: &str) {
        self.broadcast(ChangeKind::ObjectChanged, name.to_string(), None);
    }

    pub fn subscribe(&self, callback: impl Fn(&ChangeMessage) + 'static) -> Subscription {
        self.notifier.subscribe(callback)
    }

    pub fn names(&self) -> Vec<String> {
        self.items.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    fn broadcast(&self, kind: ChangeKind, name: String, previous_name: Option<String>) {
        self.notifier.notify(&ChangeMessage {
            kind,
            name,
            previous_name,
        });
    }
}

impl<T: Resource + 'static> Default for Manager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Manager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("items", &self.items.borrow().keys().collect::<Vec<_>>())
            .field("notifier", &self.notifier)
            .finish()
    }
}
