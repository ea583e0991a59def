use acctsync_model::{DirectoryEntry, FieldTemplate, SchemaError};

#[test]
fn render_substitutes_attributes() {
    let t = FieldTemplate::parse("{givenName} {sn}").unwrap();
    let entry = DirectoryEntry::new().with("givenName", "Jane").with("sn", "Doe");
    assert_eq!(t.render(&entry).as_deref(), Some("Jane Doe"));
    assert_eq!(t.attributes().collect::<Vec<_>>(), vec!["givenName", "sn"]);
}

#[test]
fn render_fails_on_missing_attribute() {
    let t = FieldTemplate::parse("{uid}@example.org").unwrap();
    assert_eq!(t.render(&DirectoryEntry::new()), None);
}

#[test]
fn render_uses_first_value() {
    let t = FieldTemplate::parse("{uid}@x").unwrap();
    let entry = DirectoryEntry::new().with("uid", "a").with("uid", "b");
    assert_eq!(t.render(&entry).as_deref(), Some("a@x"));
}

#[test]
fn literal_only_template() {
    let t = FieldTemplate::parse("fixed").unwrap();
    assert_eq!(t.render(&DirectoryEntry::new()).as_deref(), Some("fixed"));
    assert_eq!(t.to_string(), "fixed");
}

#[test]
fn parse_errors() {
    for bad in ["{uid", "uid}", "{}", "{a{b}}"] {
        assert!(
            matches!(FieldTemplate::parse(bad), Err(SchemaError::InvalidTemplate { .. })),
            "{bad} should not parse"
        );
    }
}
