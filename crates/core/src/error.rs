//! Error types for the fieldgraph domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Construction and evaluation each have their own error enum; the
//! top-level [`Error`] wraps both for callers that do not care which
//! phase failed.

use thiserror::Error;

/// The top-level error type for all fieldgraph operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Construction errors ---
    #[error("Construction error: {0}")]
    Construction(#[from] ConstructionError),

    // --- Evaluation errors ---
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Errors raised while building or redefining a field.
///
/// Construction is all-or-nothing: when one of these is returned the
/// owning module's registry has not been touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstructionError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Component count mismatch in {context}: expected {expected}, found {found}")]
    ComponentCountMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    #[error("A field named '{0}' already exists")]
    DuplicateName(String),

    #[error("Field '{field}' cannot use '{source_field}' as a source: it belongs to another module")]
    ForeignSource { field: String, source_field: String },

    #[error("Field '{field}' is in use by: {}", .users.join(", "))]
    InUse { field: String, users: Vec<String> },

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Errors raised while evaluating a field at a location.
///
/// An evaluation error aborts the whole top-level request. Caches touched
/// before the failure may hold partial results and are not meaningful.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Field '{field}' cannot be evaluated at a {location} location")]
    UnsupportedLocation { field: String, location: String },

    #[error("Cyclic dependency detected while evaluating field '{field}'")]
    CyclicDependency { field: String },

    #[error("Field '{field}' refers to {resource} which no longer exists")]
    ExternalResourceUnavailable { field: String, resource: String },

    #[error("Field '{field}' is not defined at this location")]
    NotDefined { field: String },

    #[error("Field '{field}' has been detached from its module")]
    Detached { field: String },
}

impl EvaluationError {
    /// Shorthand used by operator implementations.
    pub fn unsupported(field: &str, location: &str) -> Self {
        Self::UnsupportedLocation {
            field: field.to_string(),
            location: location.to_string(),
        }
    }

    /// Whether this error only means "no value here" rather than a fault.
    pub fn is_not_defined(&self) -> bool {
        matches!(
            self,
            Self::NotDefined { .. } | Self::UnsupportedLocation { .. }
        )
    }
}

impl ConstructionError {
    /// Shorthand for a component count mismatch.
    pub fn mismatch(context: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::ComponentCountMismatch {
            context: context.into(),
            expected,
            found,
        }
    }
}
