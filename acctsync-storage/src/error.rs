//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The store could not be opened or initialized.
    #[error("cannot open store {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A stored record could not be decoded.
    #[error("account {id}: corrupt record: {source}")]
    Corrupt {
        id: String,
        #[source]
        source: acctsync_model::ModelError,
    },

    /// Encoding a record failed.
    #[error("encoding error: {0}")]
    Encoding(#[from] acctsync_model::ModelError),

    /// The record cannot be stored as given.
    #[error("invalid data: {0}")]
    InvalidData(String),
}
