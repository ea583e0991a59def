use acctsync_types::DeletionMarker;

// ── Construction ──────────────────────────────────────────────────

#[test]
fn from_secs_and_back() {
    let m = DeletionMarker::from_secs(1_500_000_000);
    assert_eq!(m.secs(), 1_500_000_000);
    assert_eq!(m.to_string(), "1500000000");
}

#[test]
fn now_is_recent() {
    let m = DeletionMarker::now();
    // 2020-01-01
    assert!(m.secs() > 1_577_836_800);
}

#[test]
fn age_at() {
    let m = DeletionMarker::from_secs(1000);
    assert_eq!(m.age_at(1500), 500);
    assert_eq!(m.age_at(900), -100);
    assert_eq!(DeletionMarker::from_secs(i64::MIN).age_at(1_700_000_000), i64::MAX);
    assert_eq!(DeletionMarker::from_secs(i64::MAX).age_at(-10), i64::MIN);
}

#[test]
fn ordering() {
    assert!(DeletionMarker::from_secs(1) < DeletionMarker::from_secs(2));
}

// ── Retired addresses ─────────────────────────────────────────────

#[test]
fn retired_address_embeds_marker() {
    let m = DeletionMarker::from_secs(1234);
    assert_eq!(m.retired_address("jdoe@example.org"), "del-1234-jdoe@example.org");
}

#[test]
fn parse_retired_address_roundtrip() {
    let m = DeletionMarker::from_secs(1_600_000_000);
    let addr = m.retired_address("a-b@example.org");
    assert_eq!(DeletionMarker::parse_retired_address(&addr), Some(m));
}

#[test]
fn parse_retired_address_rejects_other_shapes() {
    assert_eq!(DeletionMarker::parse_retired_address("jdoe@example.org"), None);
    assert_eq!(DeletionMarker::parse_retired_address("del-jdoe@example.org"), None);
    assert_eq!(DeletionMarker::parse_retired_address("del--jdoe@example.org"), None);
    assert_eq!(DeletionMarker::parse_retired_address("del-12a-jdoe@example.org"), None);
    assert_eq!(DeletionMarker::parse_retired_address("del-123"), None);
}
