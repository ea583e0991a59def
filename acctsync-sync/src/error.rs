//! Error types for the sync layer.

use crate::remote::RemoteError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
///
/// Everything except [`SyncError::Remote`] and per-account
/// [`SyncError::Model`] failures aborts the run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Settings could not be read or extracted.
    #[error("settings error: {0}")]
    Settings(#[from] figment::Error),

    /// Settings were read but are unusable.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("schema error: {0}")]
    Schema(#[from] acctsync_model::SchemaError),

    #[error("rule error: {0}")]
    Rule(#[from] acctsync_rules::RuleError),

    #[error("alias error: {0}")]
    Alias(#[from] acctsync_aliases::AliasError),

    #[error("account error: {0}")]
    Model(#[from] acctsync_model::ModelError),

    #[error("storage error: {0}")]
    Storage(#[from] acctsync_storage::StorageError),

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The directory could not be read.
    #[error("directory error: {0}")]
    Directory(String),

    /// Any other condition that must abort the run.
    #[error("fatal: {0}")]
    Fatal(String),
}
