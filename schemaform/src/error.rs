//! Error types for schema resolution, data navigation and array mutations.

use thiserror::Error;

/// Result alias used across the engine.
pub type Result<T, E = FormError> = std::result::Result<T, E>;

/// Errors raised by the form engine.
#[derive(Debug, Error)]
pub enum FormError {
    /// A `$ref` pointer has no matching definition.
    #[error("unresolved reference `{pointer}`")]
    UnresolvedReference {
        /// The pointer as written in the schema.
        pointer: String,
    },

    /// Reference expansion looped back onto a pointer already being expanded.
    #[error("cyclic reference: {}", chain.join(" -> "))]
    CyclicReference {
        /// Pointers in expansion order, ending with the repeated one.
        chain: Vec<String>,
    },

    /// An array action was issued although its precondition does not hold.
    #[error("invalid array operation `{action}` at `{path}`: {reason}")]
    InvalidArrayOperation {
        /// Action name (`append`, `remove`, ...).
        action: &'static str,
        /// Data path of the array field.
        path: String,
        /// Violated precondition.
        reason: String,
    },

    /// No rendering strategy exists for the declared type.
    #[error("unsupported schema type `{type_name}`")]
    UnsupportedSchemaType {
        /// The declared type, or `<none>` if missing.
        type_name: String,
    },

    /// A data path does not address the expected kind of value.
    #[error("invalid data path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Loaded data does not fit the schema at `path`.
    #[error("type mismatch at `{path}`: expected {expected}, got {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// Schema or UI schema (de)serialisation failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl FormError {
    pub(crate) fn invalid_array(
        action: &'static str,
        path: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        let err = FormError::InvalidArrayOperation {
            action,
            path: path.to_string(),
            reason: reason.into(),
        };
        error!("{err}");
        err
    }

    /// Whether the error comes from reference expansion.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            FormError::UnresolvedReference { .. } | FormError::CyclicReference { .. }
        )
    }
}
