//! # fieldgraph engine
//!
//! The field graph: modules own named fields, each field computes its value
//! from source fields through a [`FieldCore`], and every field keeps a
//! single-entry cache of its last result.
//!
//! - [`Module`]: creates, renames, redefines and destroys fields; owns the
//!   change clock that cache validity is judged against
//! - [`Field`]: evaluation at element/xi, node and field coordinate
//!   locations, with optional first derivatives
//! - [`ops`]: the operator kinds (constants, arithmetic, curve and time
//!   lookups, function composition, coordinate transforms, mesh search,
//!   image filters)
//! - [`describe`]: canonical command strings that rebuild a field
//!
//! ```
//! use fieldgraph_engine::Module;
//! use fieldgraph_core::{Location, NodeId};
//!
//! let module = Module::new("demo");
//! let a = module.create_constant("a", vec![2.0]).unwrap();
//! let b = module.create_constant("b", vec![3.0]).unwrap();
//! let sum = module.create_add("sum", &a, &b).unwrap();
//! let value = sum.evaluate(&Location::node(NodeId(1), 0.0)).unwrap();
//! assert_eq!(value.values, vec![5.0]);
//! ```

mod cache;
pub mod describe;
pub mod field;
pub mod module;
pub mod ops;
pub mod stats;

// Re-export key types at crate root for ergonomics
pub use describe::{CommandBuilder, quote};
pub use field::Field;
pub use module::{FieldChange, Module};
pub use ops::{
    AddCore, CORE_TYPES, ConstantCore, CoordinateSystem, CoordinateTransformationCore, CurveLookupCore, FieldCore,
    ImageFilter, LogicalOp, NodeValueCore, OffsetCore, ScaleCore, ThresholdMode, TimeValueCore,
};
pub use stats::EvaluationStats;
