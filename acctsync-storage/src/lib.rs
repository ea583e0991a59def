//! Local account cache.
//!
//! The cache mirrors what the remote service is believed to hold. Each
//! account is one row keyed by its identifier, with the record stored as
//! tagged JSON (see [`acctsync_types::encode_value`]). A second table holds
//! small blobs under a `(namespace, key)` pair.
//!
//! Writes are single statements; callers persist each confirmed step as
//! soon as it happens.

mod error;
mod sqlite;

pub use error::{StorageError, StorageResult};
pub use sqlite::SqliteStore;

use acctsync_model::AccountRecord;
use acctsync_types::AccountId;
use std::collections::BTreeMap;

/// Persistent account cache plus namespaced blobs.
pub trait LocalStore {
    /// Every stored record, by identifier. Rows that cannot be decoded are
    /// logged and left out; [`LocalStore::get`] still reports them.
    fn load_all(&self) -> StorageResult<BTreeMap<AccountId, AccountRecord>>;

    fn get(&self, id: &AccountId) -> StorageResult<Option<AccountRecord>>;

    /// Inserts or replaces a record. The record must carry a valid id.
    fn put(&self, record: &AccountRecord) -> StorageResult<()>;

    /// Inserts or replaces several records in one transaction.
    fn put_many(&self, records: &[AccountRecord]) -> StorageResult<()>;

    /// Removes a record. Returns whether it existed.
    fn delete(&self, id: &AccountId) -> StorageResult<bool>;

    fn put_data(&self, namespace: &str, key: &str, data: &str) -> StorageResult<()>;

    fn get_data(&self, namespace: &str, key: &str) -> StorageResult<Option<String>>;

    /// Removes a blob. Returns whether it existed.
    fn remove_data(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// Every `(key, data)` pair in a namespace, by key.
    fn list_data(&self, namespace: &str) -> StorageResult<Vec<(String, String)>>;
}
