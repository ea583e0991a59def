use acctsync_aliases::{AliasResolver, AliasTable};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ── Parsing ──────────────────────────────────────────────────────

#[test]
fn parses_lines_and_comments() {
    let table = AliasTable::parse(
        "# header\n\
         postmaster: root\n\
         \n\
         team: alice , bob # trailing\n",
    );
    assert_eq!(table.len(), 2);
    assert_eq!(table.get("postmaster"), Some(&set(&["root"])));
    assert_eq!(table.get("team"), Some(&set(&["alice", "bob"])));
}

#[test]
fn skips_include_malformed_and_duplicate_lines() {
    let table = AliasTable::parse(
        "lists::include:/etc/lists\n\
         no colon here\n\
         a: b: c\n\
         dup: first\n\
         dup: second\n\
         empty:\n",
    );
    assert_eq!(table.len(), 1);
    assert_eq!(table.get("dup"), Some(&set(&["first"])));
}

#[test]
fn extend_keeps_existing_entries() {
    let mut table = AliasTable::parse("a: one\n");
    table.extend_from_text("a: two\nb: three\n");
    assert_eq!(table.get("a"), Some(&set(&["one"])));
    assert_eq!(table.get("b"), Some(&set(&["three"])));
}

// ── Applying ─────────────────────────────────────────────────────

#[test]
fn applies_single_in_domain_targets() {
    let table = AliasTable::parse(
        "postmaster: root\n\
         john.doe: jdoe@example.org\n\
         team: alice, bob\n\
         outside: someone@elsewhere.net\n",
    );
    let mut resolver = AliasResolver::new();
    table.apply(&mut resolver, "example.org").unwrap();

    assert_eq!(resolver.get_main_account("postmaster@example.org"), "root@example.org");
    assert_eq!(resolver.get_main_account("john.doe@example.org"), "jdoe@example.org");
    assert!(!resolver.is_alias("team@example.org"));
    assert!(!resolver.is_alias("outside@example.org"));
    assert_eq!(resolver.len(), 2);
}

#[test]
fn apply_reports_resolver_errors() {
    let table = AliasTable::parse("jdoe: jdoe\n");
    let mut resolver = AliasResolver::new();
    assert!(table.apply(&mut resolver, "example.org").is_err());
}
