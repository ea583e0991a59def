use acctsync_model::{fields, AccountRecord, Schema, SchemaConfig};
use acctsync_storage::{LocalStore, SqliteStore, StorageError};
use acctsync_types::{AccountId, DeletionMarker, FieldValue};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use tempfile::TempDir;

fn make_schema() -> Schema {
    Schema::new(&SchemaConfig::new("example.org", "example.org")).unwrap()
}

fn make_store() -> SqliteStore {
    SqliteStore::open_in_memory(make_schema()).unwrap()
}

fn id(s: &str) -> AccountId {
    AccountId::parse(s).unwrap()
}

fn make_record(uid: &str) -> AccountRecord {
    let mut r = AccountRecord::new();
    r.set(fields::ID, format!("{uid}@example.org"));
    r.set_mail(format!("{uid}@example.org"));
    r.set(fields::SURNAME, "Doe");
    r.set_cos("staff");
    r
}

// ── Records ──────────────────────────────────────────────────────

#[test]
fn put_then_get() {
    let store = make_store();
    let record = make_record("jdoe");
    store.put(&record).unwrap();
    assert_eq!(store.get(&id("jdoe@example.org")).unwrap(), Some(record));
    assert_eq!(store.get(&id("nobody@example.org")).unwrap(), None);
}

#[test]
fn stores_every_value_kind() {
    let store = make_store();
    let mut record = make_record("jdoe");
    record.set(fields::CREDENTIAL, FieldValue::Bytes(vec![0, 159, 255]));
    record.set_aliases(BTreeSet::from(["j.doe@example.org".to_string()]));
    record.set_deletion_marker(Some(DeletionMarker::from_secs(1_700_000_000)));
    store.put(&record).unwrap();
    assert_eq!(store.get(&id("jdoe@example.org")).unwrap(), Some(record));
}

#[test]
fn put_replaces() {
    let store = make_store();
    let mut record = make_record("jdoe");
    store.put(&record).unwrap();
    record.set_cos("gold");
    store.put(&record).unwrap();

    let all = store.load_all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[&id("jdoe@example.org")].cos(), Some("gold"));
}

#[test]
fn put_requires_id() {
    let store = make_store();
    let mut record = AccountRecord::new();
    record.set_mail("x@example.org");
    assert!(matches!(store.put(&record), Err(StorageError::InvalidData(_))));
}

#[test]
fn put_many_is_all_or_nothing_on_encoding() {
    let store = make_store();
    let records = vec![make_record("a"), AccountRecord::new()];
    assert!(store.put_many(&records).is_err());
    assert!(store.load_all().unwrap().is_empty());

    store.put_many(&[make_record("a"), make_record("b")]).unwrap();
    let ids: Vec<String> = store
        .load_all()
        .unwrap()
        .keys()
        .map(|k| k.to_string())
        .collect();
    assert_eq!(ids, vec!["a@example.org", "b@example.org"]);
}

#[test]
fn delete_reports_existence() {
    let store = make_store();
    store.put(&make_record("jdoe")).unwrap();
    assert!(store.delete(&id("jdoe@example.org")).unwrap());
    assert!(!store.delete(&id("jdoe@example.org")).unwrap());
    assert!(store.load_all().unwrap().is_empty());
}

// ── Misc data ────────────────────────────────────────────────────

#[test]
fn namespaced_data() {
    let store = make_store();
    store.put_data("lists", "staff", "[1,2]").unwrap();
    store.put_data("lists", "admins", "[3]").unwrap();
    store.put_data("other", "staff", "x").unwrap();

    assert_eq!(store.get_data("lists", "staff").unwrap().as_deref(), Some("[1,2]"));
    assert_eq!(
        store.list_data("lists").unwrap(),
        vec![
            ("admins".to_string(), "[3]".to_string()),
            ("staff".to_string(), "[1,2]".to_string()),
        ]
    );

    assert!(store.remove_data("lists", "staff").unwrap());
    assert!(!store.remove_data("lists", "staff").unwrap());
    assert_eq!(store.get_data("lists", "staff").unwrap(), None);
    assert_eq!(store.get_data("other", "staff").unwrap().as_deref(), Some("x"));
}

// ── On disk ──────────────────────────────────────────────────────

#[test]
fn reopen_keeps_records() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.db");
    {
        let store = SqliteStore::open(&path, make_schema()).unwrap();
        store.put(&make_record("jdoe")).unwrap();
        store.put_data("ns", "k", "v").unwrap();
    }
    let store = SqliteStore::open(&path, make_schema()).unwrap();
    assert_eq!(store.load_all().unwrap().len(), 1);
    assert_eq!(store.get_data("ns", "k").unwrap().as_deref(), Some("v"));
}

#[test]
fn fields_outside_schema_are_dropped_on_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.db");

    let mut wide = SchemaConfig::new("example.org", "example.org");
    wide.extra_fields.push("office".into());
    {
        let store = SqliteStore::open(&path, Schema::new(&wide).unwrap()).unwrap();
        let mut r = make_record("jdoe");
        r.set("office", "B12");
        store.put(&r).unwrap();
    }
    let store = SqliteStore::open(&path, make_schema()).unwrap();
    let r = store.get(&id("jdoe@example.org")).unwrap().unwrap();
    assert_eq!(r.get("office"), None);
    assert_eq!(r.cos(), Some("staff"));
}

#[test]
fn load_all_skips_undecodable_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.db");
    let store = SqliteStore::open(&path, make_schema()).unwrap();
    store.put(&make_record("jdoe")).unwrap();

    let raw = rusqlite::Connection::open(&path).unwrap();
    raw.execute(
        "INSERT INTO accounts (id, record) VALUES (?1, ?2)",
        rusqlite::params!["bad@example.org", r#"{"id": "bad@example.org", "cos": true}"#],
    )
    .unwrap();
    raw.execute(
        "INSERT INTO accounts (id, record) VALUES (?1, ?2)",
        rusqlite::params![" padded", r#"{"id": " padded"}"#],
    )
    .unwrap();

    let all = store.load_all().unwrap();
    assert_eq!(all.keys().collect::<Vec<_>>(), vec![&id("jdoe@example.org")]);
    assert!(matches!(
        store.get(&id("bad@example.org")),
        Err(StorageError::Corrupt { .. })
    ));
}

#[test]
fn null_fields_load_as_absent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.db");
    let store = SqliteStore::open(&path, make_schema()).unwrap();

    let raw = rusqlite::Connection::open(&path).unwrap();
    raw.execute(
        "INSERT INTO accounts (id, record) VALUES (?1, ?2)",
        rusqlite::params!["old@example.org", r#"{"id": "old@example.org", "mail": null}"#],
    )
    .unwrap();

    let all = store.load_all().unwrap();
    let record = &all[&id("old@example.org")];
    assert_eq!(record.mail(), None);
    assert_eq!(record.id(), Some(id("old@example.org")));
}

#[test]
fn open_fails_on_directory() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        SqliteStore::open(dir.path(), make_schema()),
        Err(StorageError::Open { .. })
    ));
}
