//! The account record.
//!
//! Records are map-backed: each present field maps to a [`FieldValue`] and
//! absent fields have no entry. The [`Schema`] decides which names are
//! meaningful; typed accessors cover the fields every schema defines.

use crate::error::{ModelError, ModelResult};
use crate::schema::{fields, Schema};
use acctsync_types::{decode_value, encode_value, AccountId, DeletionMarker, FieldValue};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::trace;

/// One account as known by a single store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountRecord {
    values: BTreeMap<String, FieldValue>,
}

impl AccountRecord {
    /// Creates a record with no fields set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── Generic access ───────────────────────────────────────────

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    /// Sets a field. Empty sets are stored as absent.
    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) {
        let value = value.into();
        if value.is_empty_collection() {
            self.values.remove(field);
        } else {
            self.values.insert(field.to_string(), value);
        }
    }

    /// Sets or clears a field.
    pub fn set_opt(&mut self, field: &str, value: Option<FieldValue>) {
        match value {
            Some(v) => self.set(field, v),
            None => {
                self.clear(field);
            }
        }
    }

    pub fn clear(&mut self, field: &str) -> Option<FieldValue> {
        self.values.remove(field)
    }

    /// Present fields, in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copies the listed fields from `other`, clearing those `other` lacks.
    pub fn copy_fields_from<'a>(&mut self, other: &Self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            self.set_opt(name, other.get(name).cloned());
        }
    }

    // ── Typed access ─────────────────────────────────────────────

    /// The identifier, if present and valid.
    #[must_use]
    pub fn id(&self) -> Option<AccountId> {
        self.text(fields::ID).and_then(|s| AccountId::parse(s).ok())
    }

    pub fn set_id(&mut self, id: &AccountId) {
        self.set(fields::ID, id.as_str());
    }

    #[must_use]
    pub fn mail(&self) -> Option<&str> {
        self.text(fields::MAIL)
    }

    pub fn set_mail(&mut self, mail: impl Into<String>) {
        self.set(fields::MAIL, mail.into());
    }

    #[must_use]
    pub fn credential(&self) -> Option<&FieldValue> {
        self.get(fields::CREDENTIAL)
    }

    /// The credential as the ASCII text the remote service expects.
    /// `None` if absent or not ASCII.
    #[must_use]
    pub fn credential_text(&self) -> Option<String> {
        match self.credential()? {
            FieldValue::Text(t) if t.is_ascii() => Some(t.clone()),
            FieldValue::Bytes(b) if b.is_ascii() => String::from_utf8(b.clone()).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn cos(&self) -> Option<&str> {
        self.text(fields::COS)
    }

    pub fn set_cos(&mut self, cos: impl Into<String>) {
        self.set(fields::COS, cos.into());
    }

    #[must_use]
    pub fn directory_mail(&self) -> Option<&str> {
        self.text(fields::DIRECTORY_MAIL)
    }

    /// Alias addresses, empty if none.
    #[must_use]
    pub fn aliases(&self) -> BTreeSet<String> {
        self.string_set(fields::ALIASES)
    }

    pub fn set_aliases(&mut self, aliases: BTreeSet<String>) {
        self.set(fields::ALIASES, aliases);
    }

    /// Group names, empty if none.
    #[must_use]
    pub fn groups(&self) -> BTreeSet<String> {
        self.string_set(fields::GROUPS)
    }

    pub fn add_group(&mut self, group: &str) {
        let mut groups = self.groups();
        groups.insert(group.to_string());
        self.set(fields::GROUPS, groups);
    }

    #[must_use]
    pub fn deletion_marker(&self) -> Option<DeletionMarker> {
        self.get(fields::DELETION_MARKER)
            .and_then(FieldValue::as_integer)
            .map(DeletionMarker::from_secs)
    }

    pub fn set_deletion_marker(&mut self, marker: Option<DeletionMarker>) {
        self.set_opt(
            fields::DELETION_MARKER,
            marker.map(|m| FieldValue::Integer(m.secs())),
        );
    }

    #[must_use]
    pub fn is_marked_for_deletion(&self) -> bool {
        self.deletion_marker().is_some()
    }

    fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    /// Reads a field as a set, treating a scalar as a singleton.
    fn string_set(&self, field: &str) -> BTreeSet<String> {
        match self.get(field) {
            Some(FieldValue::Set(s)) => s.clone(),
            Some(FieldValue::Text(t)) => [t.clone()].into(),
            _ => BTreeSet::new(),
        }
    }

    // ── Persistent form ──────────────────────────────────────────

    /// Encodes the schema fields as a JSON object, omitting absent and
    /// empty values.
    #[must_use]
    pub fn to_json(&self, schema: &Schema) -> Value {
        let mut obj = Map::new();
        for name in schema.field_names() {
            if let Some(v) = self.values.get(name) {
                if !v.is_empty_collection() {
                    obj.insert(name.to_string(), encode_value(v));
                }
            }
        }
        Value::Object(obj)
    }

    pub fn to_json_string(&self, schema: &Schema) -> ModelResult<String> {
        Ok(serde_json::to_string(&self.to_json(schema))?)
    }

    /// Decodes a persisted record. Keys outside the schema are ignored.
    pub fn from_json(schema: &Schema, value: &Value) -> ModelResult<Self> {
        let obj = value.as_object().ok_or(ModelError::NotAnObject)?;
        let mut record = Self::new();
        for (key, raw) in obj {
            if !schema.contains(key) {
                trace!(field = %key, "ignoring field outside schema");
                continue;
            }
            // null means "no value".
            if raw.is_null() {
                continue;
            }
            record.set(key, decode_value(raw)?);
        }
        Ok(record)
    }

    pub fn from_json_str(schema: &Schema, data: &str) -> ModelResult<Self> {
        let value: Value = serde_json::from_str(data)?;
        Self::from_json(schema, &value)
    }
}

impl fmt::Display for AccountRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.text(fields::ID) {
            Some(id) => f.write_str(id),
            None => f.write_str("(invalid account)"),
        }
    }
}
