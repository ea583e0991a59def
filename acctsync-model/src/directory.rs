//! Directory entries and record construction from them.

use crate::error::{ModelError, ModelResult};
use crate::record::AccountRecord;
use crate::schema::Schema;
use acctsync_types::FieldValue;
use std::collections::BTreeMap;
use tracing::warn;

/// An entry read from the authoritative directory: named attributes with
/// zero or more values each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    attributes: BTreeMap<String, Vec<FieldValue>>,
}

impl DirectoryEntry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`DirectoryEntry::push`].
    #[must_use]
    pub fn with(mut self, attribute: &str, value: impl Into<FieldValue>) -> Self {
        self.push(attribute, value);
        self
    }

    /// Appends a value to an attribute.
    pub fn push(&mut self, attribute: &str, value: impl Into<FieldValue>) {
        self.attributes
            .entry(attribute.to_string())
            .or_default()
            .push(value.into());
    }

    /// All values of an attribute.
    #[must_use]
    pub fn values(&self, attribute: &str) -> &[FieldValue] {
        self.attributes
            .get(attribute)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First value of an attribute, if it is text.
    #[must_use]
    pub fn first_text(&self, attribute: &str) -> Option<&str> {
        self.values(attribute).first().and_then(FieldValue::as_text)
    }

    /// The attribute collapsed to a single field value: nothing for no
    /// values, the value itself for one, a set of the text values for
    /// several. Binary values cannot form a set; only the first is kept.
    #[must_use]
    pub fn value(&self, attribute: &str) -> Option<FieldValue> {
        match self.values(attribute) {
            [] => None,
            [single] => Some(single.clone()),
            many if many.iter().any(|v| matches!(v, FieldValue::Bytes(_))) => {
                warn!(
                    attribute,
                    count = many.len(),
                    "multiple binary values, keeping the first"
                );
                many.first().cloned()
            }
            many => Some(FieldValue::set(many.iter().map(ToString::to_string))),
        }
    }
}

impl AccountRecord {
    /// Builds a record from a directory entry using the schema's attribute
    /// sources. Fails if a required field can neither be read nor generated.
    pub fn from_directory(schema: &Schema, entry: &DirectoryEntry) -> ModelResult<Self> {
        let mut record = Self::new();
        for source in schema.sources() {
            let value = source
                .attribute
                .as_deref()
                .and_then(|a| entry.value(a))
                .or_else(|| {
                    source
                        .fallback
                        .as_ref()
                        .and_then(|t| t.render(entry))
                        .map(FieldValue::Text)
                });
            if value.is_none() && !source.optional {
                return Err(ModelError::MissingAttribute(source.field.clone()));
            }
            record.set_opt(&source.field, value);
        }
        Ok(record)
    }
}
