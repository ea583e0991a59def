//! Error types for the account model.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Invalid schema definition. Always fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// A configured field reuses the name of an existing field.
    #[error("field {0}: duplicate definition")]
    DuplicateField(String),

    /// A configuration entry refers to a field that is not defined.
    #[error("field {0}: not defined")]
    UnknownField(String),

    /// Two fields map to the same remote attribute.
    #[error("remote attribute {0}: mapped more than once")]
    DuplicateRemoteAttribute(String),

    /// A field was assigned to more than one category.
    #[error("field {0}: cannot be both a detail and a create-only field")]
    ConflictingCategory(String),

    #[error("template {template:?}: {reason}")]
    InvalidTemplate { template: String, reason: String },
}

/// Operation not allowed in the record's soft-delete state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("account {0} is marked for deletion")]
    MarkedForDeletion(String),
}

/// Errors that can occur when building or converting account records.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    State(#[from] StateError),

    /// Invalid persisted value.
    #[error("value error: {0}")]
    Value(#[from] acctsync_types::Error),

    /// A required field could neither be read from the directory nor generated.
    #[error("missing required attribute for field {0}")]
    MissingAttribute(String),

    /// A field needed for the requested conversion is absent.
    #[error("record has no {0}")]
    MissingField(String),

    #[error("unknown class of service name {0}")]
    UnknownClassOfService(String),

    #[error("unknown class of service id {0}")]
    UnknownClassOfServiceId(String),

    #[error("persisted record is not a JSON object")]
    NotAnObject,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
