use acctsync_model::{fields, AccountRecord, DirectoryEntry, ModelError, Schema, SchemaConfig};
use acctsync_types::FieldValue;
use pretty_assertions::assert_eq;

fn make_schema() -> Schema {
    let mut config = SchemaConfig::new("eppn.example.org", "mail.example.org");
    config.extra_fields.push("office".into());
    config.directory_attributes.insert("office".into(), "roomNumber".into());
    Schema::new(&config).unwrap()
}

fn make_entry() -> DirectoryEntry {
    DirectoryEntry::new()
        .with("uid", "jdoe")
        .with("eduPersonPrincipalName", "jdoe@eppn.example.org")
        .with("sn", "Doe")
        .with("givenName", "John")
        .with("displayName", "Johnny Doe")
        .with("mail", "john.doe@mail.example.org")
        .with("userPassword", b"{SSHA}xyz".to_vec())
}

// ── Entry values ─────────────────────────────────────────────────

#[test]
fn value_collapses_by_count() {
    let entry = DirectoryEntry::new().with("one", "a").with("many", "x").with("many", "y");
    assert_eq!(entry.value("none"), None);
    assert_eq!(entry.value("one"), Some(FieldValue::from("a")));
    assert_eq!(entry.value("many"), Some(FieldValue::set(["x", "y"])));
    assert_eq!(entry.values("many").len(), 2);
}

#[test]
fn several_binary_values_keep_the_first() {
    let entry = DirectoryEntry::new()
        .with("userPassword", b"{SSHA}first".to_vec())
        .with("userPassword", b"{SSHA}second".to_vec());
    assert_eq!(
        entry.value("userPassword"),
        Some(FieldValue::Bytes(b"{SSHA}first".to_vec()))
    );
}

// ── Record construction ──────────────────────────────────────────

#[test]
fn reads_mapped_attributes() {
    let schema = make_schema();
    let r = AccountRecord::from_directory(&schema, &make_entry()).unwrap();
    assert_eq!(r.id().unwrap().as_str(), "jdoe@eppn.example.org");
    assert_eq!(r.get(fields::SURNAME), Some(&FieldValue::from("Doe")));
    assert_eq!(r.get(fields::DISPLAY_NAME), Some(&FieldValue::from("Johnny Doe")));
    assert_eq!(r.directory_mail(), Some("john.doe@mail.example.org"));
    assert_eq!(r.credential_text().as_deref(), Some("{SSHA}xyz"));
}

#[test]
fn mail_is_always_generated() {
    let schema = make_schema();
    let r = AccountRecord::from_directory(&schema, &make_entry()).unwrap();
    assert_eq!(r.mail(), Some("jdoe@mail.example.org"));
}

#[test]
fn id_falls_back_to_uid_at_eppn_domain() {
    let schema = make_schema();
    let full = make_entry();
    let mut entry = DirectoryEntry::new();
    for attr in ["uid", "sn", "givenName", "userPassword"] {
        for v in full.values(attr) {
            entry.push(attr, v.clone());
        }
    }
    let r = AccountRecord::from_directory(&schema, &entry).unwrap();
    assert_eq!(r.id().unwrap().as_str(), "jdoe@eppn.example.org");
    assert_eq!(r.get(fields::DISPLAY_NAME), Some(&FieldValue::from("John Doe")));
    assert_eq!(r.directory_mail(), None);
}

#[test]
fn missing_required_attribute_fails() {
    let schema = make_schema();
    let entry = DirectoryEntry::new()
        .with("uid", "jdoe")
        .with("givenName", "John")
        .with("userPassword", b"h".to_vec());
    let err = AccountRecord::from_directory(&schema, &entry).unwrap_err();
    assert!(matches!(err, ModelError::MissingAttribute(ref f) if f == "surname"));
}

#[test]
fn optional_extra_attribute() {
    let schema = make_schema();
    let without = AccountRecord::from_directory(&schema, &make_entry()).unwrap();
    assert_eq!(without.get("office"), None);

    let with = AccountRecord::from_directory(&schema, &make_entry().with("roomNumber", "B-12"))
        .unwrap();
    assert_eq!(with.get("office"), Some(&FieldValue::from("B-12")));
}

#[test]
fn second_password_leaves_credential_usable() {
    let schema = make_schema();
    let entry = make_entry().with("userPassword", b"{SSHA}other".to_vec());
    let r = AccountRecord::from_directory(&schema, &entry).unwrap();
    assert_eq!(r.credential_text().as_deref(), Some("{SSHA}xyz"));
}

#[test]
fn multi_valued_attribute_becomes_set() {
    let schema = make_schema();
    let entry = make_entry().with("roomNumber", "B-12").with("roomNumber", "C-3");
    let r = AccountRecord::from_directory(&schema, &entry).unwrap();
    assert_eq!(r.get("office"), Some(&FieldValue::set(["B-12", "C-3"])));
}
