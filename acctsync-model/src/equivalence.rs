//! Record comparison.
//!
//! Three levels, all built on [`multivalued_equals`]:
//! - [`full_equals`]: every schema field;
//! - [`details_differ`]: the detail fields only;
//! - [`remote_equivalent`]: mail, deletion marker, detail fields and aliases,
//!   i.e. everything a remote account can tell us.

use crate::record::AccountRecord;
use crate::schema::{fields, Schema};
use acctsync_types::multivalued_equals;

fn field_equals(a: &AccountRecord, b: &AccountRecord, name: &str) -> bool {
    multivalued_equals(a.get(name), b.get(name))
}

/// True if every schema field is equivalent.
#[must_use]
pub fn full_equals(schema: &Schema, a: &AccountRecord, b: &AccountRecord) -> bool {
    schema.field_names().all(|name| field_equals(a, b, name))
}

/// True if at least one detail field differs.
#[must_use]
pub fn details_differ(schema: &Schema, a: &AccountRecord, b: &AccountRecord) -> bool {
    schema.detail_fields().any(|name| !field_equals(a, b, name))
}

/// True if the records agree on everything the remote service exposes.
#[must_use]
pub fn remote_equivalent(schema: &Schema, a: &AccountRecord, b: &AccountRecord) -> bool {
    [fields::MAIL, fields::DELETION_MARKER, fields::ALIASES]
        .into_iter()
        .all(|name| field_equals(a, b, name))
        && !details_differ(schema, a, b)
}

/// Names of the schema fields that differ, for diagnostics.
#[must_use]
pub fn differing_fields<'s>(
    schema: &'s Schema,
    a: &AccountRecord,
    b: &AccountRecord,
) -> Vec<&'s str> {
    schema
        .field_names()
        .filter(|name| !field_equals(a, b, name))
        .collect()
}
