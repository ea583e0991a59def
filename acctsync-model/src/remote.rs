//! Remote service representation of accounts.

use crate::error::{ModelError, ModelResult, StateError};
use crate::record::AccountRecord;
use crate::schema::Schema;
use acctsync_types::{DeletionMarker, FieldValue};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Lifecycle state of a remote account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Locked,
    Closed,
}

/// An account as the remote service describes it. Keyed by mail address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAccount {
    pub name: String,
    pub status: AccountStatus,
    /// Remote internal id of the class of service.
    pub cos_id: Option<String>,
    /// Remote attribute name -> value.
    pub attributes: BTreeMap<String, FieldValue>,
    pub aliases: BTreeSet<String>,
}

impl RemoteAccount {
    /// An active account with no attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: AccountStatus::Active,
            cos_id: None,
            attributes: BTreeMap::new(),
            aliases: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }
}

/// Bidirectional class-of-service name <-> remote id lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassOfServiceMap {
    by_name: BTreeMap<String, String>,
    by_id: BTreeMap<String, String>,
}

impl ClassOfServiceMap {
    /// Builds the map from `(name, id)` pairs.
    pub fn new<I, N, D>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, D)>,
        N: Into<String>,
        D: Into<String>,
    {
        let mut map = Self::default();
        for (name, id) in pairs {
            let (name, id) = (name.into(), id.into());
            map.by_id.insert(id.clone(), name.clone());
            map.by_name.insert(name, id);
        }
        map
    }

    #[must_use]
    pub fn id_for(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn name_for(&self, id: &str) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl AccountRecord {
    /// Builds the remote representation of this record.
    ///
    /// Create-only attributes are included only when `for_creation` is set.
    /// Aliases are not part of the representation; they are managed one by
    /// one. Fails for deletion-marked records.
    pub fn to_remote(
        &self,
        schema: &Schema,
        coses: &ClassOfServiceMap,
        for_creation: bool,
    ) -> ModelResult<RemoteAccount> {
        if self.is_marked_for_deletion() {
            return Err(StateError::MarkedForDeletion(self.to_string()).into());
        }
        let mail = self
            .mail()
            .ok_or_else(|| ModelError::MissingField("mail".to_string()))?;

        let mut remote = RemoteAccount::new(mail);
        for mapping in schema.remote_mappings() {
            if mapping.create_only && !for_creation {
                continue;
            }
            if let Some(value) = self.get(&mapping.field) {
                remote.attributes.insert(mapping.remote.clone(), value.clone());
            }
        }
        if let Some(cos) = self.cos() {
            let id = coses
                .id_for(cos)
                .ok_or_else(|| ModelError::UnknownClassOfService(cos.to_string()))?;
            remote.cos_id = Some(id.to_string());
        }
        Ok(remote)
    }

    /// Builds a record from a remote account.
    ///
    /// A closed account named `del-<secs>-...` carries a deletion marker.
    /// Fails if the class of service id is unknown.
    pub fn from_remote(
        schema: &Schema,
        coses: &ClassOfServiceMap,
        remote: &RemoteAccount,
    ) -> ModelResult<Self> {
        let mut record = Self::new();
        record.set_mail(remote.name.clone());
        if remote.status == AccountStatus::Closed {
            record.set_deletion_marker(DeletionMarker::parse_retired_address(&remote.name));
        }
        for mapping in schema.remote_mappings() {
            if let Some(value) = remote.attributes.get(&mapping.remote) {
                record.set(&mapping.field, value.clone());
            }
        }
        record.set_aliases(remote.aliases.clone());
        if let Some(id) = &remote.cos_id {
            let name = coses
                .name_for(id)
                .ok_or_else(|| ModelError::UnknownClassOfServiceId(id.clone()))?;
            record.set_cos(name);
        }
        Ok(record)
    }
}
