//! Routing and ordering of registered synchronizers

use artsync_synchronizer::{InMemoryDatabase, ParseError, RuntimeRegistry, SynchronizerRegistry};
use artsync_test_utils::RecordingSynchronizer;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn builtin() -> SynchronizerRegistry {
    SynchronizerRegistry::with_builtin(
        &Arc::new(RuntimeRegistry::new()),
        Arc::new(InMemoryDatabase::new()),
    )
}

#[test]
fn builtin_kinds_run_tables_first() {
    assert_eq!(builtin().artefact_types(), vec!["table", "role", "listener"]);
}

#[test]
fn locations_route_by_extension() {
    let registry = builtin();
    assert_eq!(registry.find_for_path("/sec/app.roles").unwrap().artefact_type(), "role");
    assert_eq!(
        registry.find_for_path("/app/orders.listener").unwrap().artefact_type(),
        "listener"
    );
    assert!(registry.find_for_type("table").is_some());
    assert!(registry.find_for_type("view").is_none());
}

#[test]
fn unknown_extension_has_no_synchronizer() {
    let err = builtin().find_for_path("/notes.txt").unwrap_err();
    assert!(matches!(err, ParseError::NoSynchronizer(ref location) if location == "/notes.txt"));
}

#[test]
fn overlapping_extensions_are_ambiguous() {
    let mut registry = SynchronizerRegistry::new();
    registry.register(RecordingSynchronizer::new("alpha", ".rec", 0));
    registry.register(RecordingSynchronizer::new("beta", ".rec", 1));
    match registry.find_for_path("/x.rec").unwrap_err() {
        ParseError::Ambiguous { types, .. } => assert_eq!(types, vec!["alpha", "beta"]),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn equal_orders_keep_registration_order() {
    let mut registry = SynchronizerRegistry::new();
    registry.register(RecordingSynchronizer::new("late", ".late", 5));
    registry.register(RecordingSynchronizer::new("first", ".first", 0));
    registry.register(RecordingSynchronizer::new("second", ".second", 0));
    assert_eq!(registry.artefact_types(), vec!["first", "second", "late"]);
    let reversed: Vec<_> = registry.iter().rev().map(|s| s.artefact_type()).collect();
    assert_eq!(reversed, vec!["late", "second", "first"]);
}
