//! # fieldgraph core
//!
//! Domain types for the fieldgraph evaluation engine. This crate holds no
//! evaluation logic; it defines what the engine consumes and produces:
//!
//! - [`Location`]: where and when a field is evaluated
//! - [`FieldValue`]: component values plus optional xi derivatives
//! - [`Element`], [`MeshProvider`]: the mesh collaborator
//! - [`Curve`], [`TimeKeeper`]: external mutable resources, held in a
//!   [`Manager`] that broadcasts [`ChangeMessage`]s
//! - [`Notifier`] / [`Subscription`]: observer registration that ends when
//!   the token is dropped
//!
//! Everything here is single-threaded (`Rc`, `RefCell`); one evaluation pass
//! runs at a time.

pub mod curve;
pub mod error;
pub mod location;
pub mod mesh;
pub mod resource;
pub mod settings;
pub mod time;
pub mod value;

// Re-export key types at crate root for ergonomics
pub use curve::{Curve, Knot};
pub use error::{ConstructionError, Error, EvaluationError, Result};
pub use location::{FieldId, Location};
pub use mesh::{Element, ElementId, Mesh, MeshProvider, NodeId};
pub use resource::{
    ChangeKind, ChangeMessage, Managed, ManagedRef, Manager, Notifier, Resource, Subscription,
};
pub use settings::EngineSettings;
pub use time::TimeKeeper;
pub use value::FieldValue;
