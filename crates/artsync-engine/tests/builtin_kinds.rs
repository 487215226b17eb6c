//! End-to-end passes over the built-in kinds

use artsync_artefact::{ArtefactKey, ArtefactLifecycle, ArtefactPhase, ArtefactState};
use artsync_engine::{DefinitionState, InMemoryDefinitionSource, ReconciliationDriver};
use artsync_synchronizer::{InMemoryDatabase, RuntimeRegistry, SynchronizerRegistry};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const ORDERS_TABLE: &str = r#"{
    "name": "ORDERS",
    "columns": [{"name": "ID", "type": "INTEGER", "primary_key": true, "nullable": false}]
}"#;

const ORDERS_LISTENER: &str = r#"{
    "name": "orders",
    "handler": "shop.orders",
    "kind": "queue",
    "dependencies": ["table:/shop/orders.table:ORDERS"]
}"#;

struct Fixture {
    source: Arc<InMemoryDefinitionSource>,
    runtime: Arc<RuntimeRegistry>,
    database: Arc<InMemoryDatabase>,
    driver: ReconciliationDriver,
}

fn fixture() -> Fixture {
    let source = Arc::new(InMemoryDefinitionSource::new());
    let runtime = Arc::new(RuntimeRegistry::new());
    let database = Arc::new(InMemoryDatabase::new());
    let registry = SynchronizerRegistry::with_builtin(&runtime, database.clone());
    let driver = ReconciliationDriver::new("default", registry, Arc::clone(&source));
    Fixture {
        source,
        runtime,
        database,
        driver,
    }
}

fn table_key() -> ArtefactKey {
    ArtefactKey::derive("table", "/shop/orders.table", "ORDERS")
}

fn listener_key() -> ArtefactKey {
    ArtefactKey::derive("listener", "/shop/orders.listener", "orders")
}

fn status(driver: &ReconciliationDriver, key: &ArtefactKey) -> (ArtefactLifecycle, ArtefactState) {
    let artefact_type = key.as_str().split(':').next().unwrap();
    let artefact = driver
        .registry()
        .find_for_type(artefact_type)
        .unwrap()
        .find(key)
        .unwrap()
        .unwrap();
    (artefact.lifecycle(), artefact.state())
}

#[test]
fn first_pass_applies_everything() {
    let f = fixture();
    f.source.put("/shop/orders.table", ORDERS_TABLE);
    f.source.put("/shop/orders.listener", ORDERS_LISTENER);

    let report = f.driver.reconcile().unwrap();

    assert!(report.is_clean(), "{:?}", report.errors);
    assert_eq!(report.parsed, 2);
    assert_eq!(report.completed_in(ArtefactPhase::Create), &[table_key(), listener_key()]);
    assert_eq!(f.database.table_names(), vec!["ORDERS".to_string()]);
    assert!(f.runtime.is_running("orders"));
    assert_eq!(
        status(&f.driver, &table_key()),
        (ArtefactLifecycle::Created, ArtefactState::SuccessfulCreateUpdate)
    );
    assert_eq!(
        f.driver.definitions().get("/shop/orders.listener").unwrap().state,
        DefinitionState::Processed
    );
}

#[test]
fn unchanged_declarations_are_not_parsed_again() {
    let f = fixture();
    f.source.put("/shop/orders.table", ORDERS_TABLE);
    f.driver.reconcile().unwrap();

    let second = f.driver.reconcile().unwrap();
    assert_eq!(second.parsed, 0);
    assert!(second.is_clean());
    assert!(second.deleted.is_empty());
    assert_eq!(f.database.table_names().len(), 1);
}

#[test]
fn changed_table_is_rebuilt() {
    let f = fixture();
    f.source.put("/shop/orders.table", ORDERS_TABLE);
    f.driver.reconcile().unwrap();

    f.source.put(
        "/shop/orders.table",
        r#"{"name": "ORDERS", "columns": [
            {"name": "ID", "type": "INTEGER"},
            {"name": "TOTAL", "type": "DECIMAL"}
        ]}"#,
    );
    let report = f.driver.reconcile().unwrap();

    assert_eq!(report.completed_in(ArtefactPhase::Update), &[table_key()]);
    assert_eq!(f.database.columns("ORDERS").unwrap().len(), 2);
    assert_eq!(status(&f.driver, &table_key()).0, ArtefactLifecycle::Updated);
}

#[test]
fn removed_declaration_is_torn_down() {
    let f = fixture();
    f.source.put("/shop/orders.table", ORDERS_TABLE);
    f.source.put("/shop/orders.listener", ORDERS_LISTENER);
    f.driver.reconcile().unwrap();

    f.source.remove("/shop/orders.listener");
    let report = f.driver.reconcile().unwrap();

    assert_eq!(report.deleted, vec![listener_key()]);
    assert!(f.runtime.listener("orders").is_none());
    assert!(f.driver.definitions().get("/shop/orders.listener").is_none());
    assert!(f
        .driver
        .registry()
        .find_for_type("listener")
        .unwrap()
        .find(&listener_key())
        .unwrap()
        .is_none());
    // the table is still declared
    assert_eq!(f.database.table_names(), vec!["ORDERS".to_string()]);
}

#[test]
fn broken_file_does_not_stop_the_others() {
    let f = fixture();
    f.source.put("/shop/orders.table", ORDERS_TABLE);
    f.source.put("/shop/broken.listener", "{ not json");

    let report = f.driver.reconcile().unwrap();

    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("/shop/broken.listener"));
    assert_eq!(f.database.table_names(), vec!["ORDERS".to_string()]);
    assert_eq!(
        f.driver.definitions().get("/shop/broken.listener").unwrap().state,
        DefinitionState::Failed
    );

    // unchanged and failed: skipped without a new error
    let again = f.driver.reconcile().unwrap();
    assert!(again.is_clean());
    assert_eq!(again.parsed, 0);
}

#[test]
fn breaking_a_file_keeps_its_artefacts() {
    let f = fixture();
    f.source.put("/shop/orders.listener", ORDERS_LISTENER);
    f.driver.reconcile().unwrap();
    assert!(f.runtime.is_running("orders"));

    f.source.put("/shop/orders.listener", r#"{"name": "orders"}"#);
    let report = f.driver.reconcile().unwrap();

    assert_eq!(report.errors.len(), 1);
    assert!(report.deleted.is_empty());
    assert!(f.runtime.is_running("orders"));
}

#[test]
fn unrelated_files_are_ignored() {
    let f = fixture();
    f.source.put("/README.md", "# registry");
    let report = f.driver.reconcile().unwrap();
    assert!(report.is_clean());
    assert!(f.driver.definitions().is_empty());
}

#[test]
fn stop_all_stops_running_listeners() {
    let f = fixture();
    f.source.put("/shop/orders.listener", ORDERS_LISTENER);
    f.driver.reconcile().unwrap();

    let report = f.driver.stop_all().unwrap();

    assert_eq!(report.completed_in(ArtefactPhase::Stop), &[listener_key()]);
    assert!(!f.runtime.is_running("orders"));
    // the next pass starts it again
    f.driver.reconcile().unwrap();
    assert!(f.runtime.is_running("orders"));
}

#[test]
fn database_outage_fails_the_table_and_blocks_nothing_else() {
    let f = fixture();
    f.database.set_offline(true);
    f.source.put("/shop/orders.table", ORDERS_TABLE);
    f.source.put(
        "/app/audit.listener",
        r#"{"name": "audit", "handler": "audit.h", "kind": "topic"}"#,
    );

    let report = f.driver.reconcile().unwrap();

    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("table:/shop/orders.table:ORDERS"));
    assert_eq!(
        status(&f.driver, &table_key()),
        (ArtefactLifecycle::New, ArtefactState::FailedCreate)
    );
    assert!(f.runtime.is_running("audit"));

    f.database.set_offline(false);
    let recovered = f.driver.reconcile().unwrap();
    assert!(recovered.is_clean(), "{:?}", recovered.errors);
    assert_eq!(status(&f.driver, &table_key()).0, ArtefactLifecycle::Created);
}

#[test]
fn role_removed_from_a_shared_file_is_torn_down_alone() {
    let f = fixture();
    f.source.put(
        "/sec/app.roles",
        r#"[{"name": "Admin"}, {"name": "Op", "description": "operators"}]"#,
    );
    f.driver.reconcile().unwrap();
    assert!(f.runtime.has_role("Op"));

    f.source.put("/sec/app.roles", r#"[{"name": "Admin"}]"#);
    let report = f.driver.reconcile().unwrap();

    let op = ArtefactKey::derive("role", "/sec/app.roles", "Op");
    assert!(report.is_clean(), "{:?}", report.errors);
    assert_eq!(report.deleted, vec![op.clone()]);
    assert_eq!(f.runtime.roles(), vec!["Admin".to_string()]);
    assert!(f
        .driver
        .registry()
        .find_for_type("role")
        .unwrap()
        .find(&op)
        .unwrap()
        .is_none());
    assert_eq!(
        f.driver.definitions().get("/sec/app.roles").unwrap().state,
        DefinitionState::Processed
    );
}
