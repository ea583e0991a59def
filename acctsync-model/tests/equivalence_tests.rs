use acctsync_model::{
    details_differ, differing_fields, fields, full_equals, remote_equivalent, AccountRecord,
    Schema, SchemaConfig,
};
use acctsync_types::{DeletionMarker, FieldValue};

fn make_schema() -> Schema {
    Schema::new(&SchemaConfig::new("example.org", "example.org")).unwrap()
}

fn make_record() -> AccountRecord {
    let mut r = AccountRecord::new();
    r.set(fields::ID, "jdoe@example.org");
    r.set_mail("jdoe@example.org");
    r.set(fields::SURNAME, "Doe");
    r.set(fields::GIVEN_NAME, "John");
    r.set(fields::DISPLAY_NAME, "John Doe");
    r.set(fields::CREDENTIAL, b"hash".to_vec());
    r.set_cos("staff");
    r
}

// ── Full equality ────────────────────────────────────────────────

#[test]
fn identical_records_are_fully_equal() {
    let schema = make_schema();
    assert!(full_equals(&schema, &make_record(), &make_record()));
}

#[test]
fn full_equality_uses_multivalued_rules() {
    let schema = make_schema();
    let a = make_record();
    let mut b = make_record();
    b.set(fields::SURNAME, FieldValue::set(["Doe"]));
    assert!(full_equals(&schema, &a, &b));
}

#[test]
fn storage_field_breaks_full_equality_only() {
    let schema = make_schema();
    let a = make_record();
    let mut b = make_record();
    b.add_group("staff");
    assert!(!full_equals(&schema, &a, &b));
    assert!(!details_differ(&schema, &a, &b));
    assert!(remote_equivalent(&schema, &a, &b));
    assert_eq!(differing_fields(&schema, &a, &b), vec!["groups"]);
}

#[test]
fn credential_does_not_affect_remote_equivalence() {
    let schema = make_schema();
    let a = make_record();
    let mut b = make_record();
    b.set(fields::CREDENTIAL, b"other".to_vec());
    assert!(!full_equals(&schema, &a, &b));
    assert!(remote_equivalent(&schema, &a, &b));
}

// ── Details ──────────────────────────────────────────────────────

#[test]
fn detail_change_detected() {
    let schema = make_schema();
    let a = make_record();
    let mut b = make_record();
    b.set_cos("faculty");
    assert!(details_differ(&schema, &a, &b));
    assert!(!remote_equivalent(&schema, &a, &b));
}

// ── Remote equivalence ───────────────────────────────────────────

#[test]
fn mail_change_breaks_remote_equivalence() {
    let schema = make_schema();
    let a = make_record();
    let mut b = make_record();
    b.set_mail("other@example.org");
    assert!(!details_differ(&schema, &a, &b));
    assert!(!remote_equivalent(&schema, &a, &b));
}

#[test]
fn deletion_marker_breaks_remote_equivalence() {
    let schema = make_schema();
    let a = make_record();
    let mut b = make_record();
    b.set_deletion_marker(Some(DeletionMarker::from_secs(5)));
    assert!(!remote_equivalent(&schema, &a, &b));
}

#[test]
fn aliases_break_remote_equivalence() {
    let schema = make_schema();
    let a = make_record();
    let mut b = make_record();
    b.set_aliases(["x@example.org".to_string()].into());
    assert!(!remote_equivalent(&schema, &a, &b));
}
