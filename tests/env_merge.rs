// tests/env_merge.rs

use envconsul::env::{EnvironmentMap, KeyTransform, Merger};
use envconsul_test_utils::snapshot;

#[test]
fn later_prefix_overrides_earlier() {
    let mut merger = Merger::new(2, KeyTransform::default());
    merger.update(0, snapshot(1, &[("x", "1"), ("only_a", "a")]));
    let env = merger.update(1, snapshot(1, &[("x", "2")]));

    assert_eq!(env.get("x"), Some("2"));
    assert_eq!(env.get("only_a"), Some("a"));
    assert_eq!(env.len(), 2);
}

#[test]
fn precedence_follows_position_not_arrival_order() {
    let mut merger = Merger::new(2, KeyTransform::default());
    merger.update(1, snapshot(7, &[("x", "from_b")]));
    let env = merger.update(0, snapshot(9, &[("x", "from_a")]));

    assert_eq!(env.get("x"), Some("from_b"));
}

#[test]
fn all_received_only_after_every_prefix_reported() {
    let mut merger = Merger::new(3, KeyTransform::default());
    assert!(!merger.all_received());
    merger.update(0, snapshot(1, &[]));
    merger.update(2, snapshot(1, &[]));
    assert!(!merger.all_received());
    merger.update(1, snapshot(1, &[]));
    assert!(merger.all_received());
}

#[test]
fn transform_applies_before_collision_resolution() {
    let mut merger = Merger::new(2, KeyTransform::new(true, true));
    merger.update(0, snapshot(1, &[("db-host", "a")]));
    let env = merger.update(1, snapshot(1, &[("DB_HOST", "b")]));

    assert_eq!(env.get("DB_HOST"), Some("b"));
    assert_eq!(env.len(), 1);
}

#[test]
fn replaced_snapshot_drops_removed_keys() {
    let mut merger = Merger::new(1, KeyTransform::default());
    merger.update(0, snapshot(1, &[("a", "1"), ("b", "2")]));
    let env = merger.update(0, snapshot(2, &[("a", "1")]));

    assert_eq!(env.get("b"), None);
    assert_eq!(env.len(), 1);
}

#[test]
fn non_utf8_values_are_replaced_lossily() {
    let mut merger = Merger::new(1, KeyTransform::default());
    let snap = envconsul::store::KvSnapshot::new(1).with_pair("bin", vec![0x66, 0xff, 0x6f]);
    let env = merger.update(0, snap);

    assert_eq!(env.get("bin"), Some("f\u{FFFD}o"));
}

#[test]
fn fingerprint_tracks_content() {
    let a: EnvironmentMap = [("A", "1"), ("B", "2")].into_iter().collect();
    let b: EnvironmentMap = [("B", "2"), ("A", "1")].into_iter().collect();
    let c: EnvironmentMap = [("A", "12")].into_iter().collect();
    let d: EnvironmentMap = [("A1", "2")].into_iter().collect();

    assert_eq!(a, b);
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_ne!(c.fingerprint(), d.fingerprint());
}
