//! Message listener artefacts (`.listener`)

use crate::callback::SynchronizerCallback;
use crate::error::{ParseError, SynchronizerError};
use crate::runtime::{ListenerKind, RuntimeRegistry};
use crate::store::ArtefactStore;
use crate::synchronizer::{drive_phase, PhaseEffects, Synchronizer};
use artsync_artefact::{Artefact, ArtefactPhase, Artefactual};
use artsync_topology::{CompletionOutcome, TopologyWrapper};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// A consumer bound to a queue or topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
    artefact: Artefact,
    handler: String,
    kind: ListenerKind,
}

impl Listener {
    pub const ARTEFACT_TYPE: &'static str = "listener";

    #[must_use]
    pub fn handler(&self) -> &str {
        &self.handler
    }

    #[must_use]
    pub fn kind(&self) -> ListenerKind {
        self.kind
    }
}

impl Artefactual for Listener {
    fn artefact(&self) -> &Artefact {
        &self.artefact
    }

    fn artefact_mut(&mut self) -> &mut Artefact {
        &mut self.artefact
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ListenerDeclaration {
    name: String,
    handler: String,
    kind: ListenerKind,
    #[serde(default)]
    dependencies: Vec<String>,
}

/// Registers listeners and starts/stops their consumers
pub struct ListenerSynchronizer {
    store: Arc<dyn ArtefactStore<Listener>>,
    runtime: Arc<RuntimeRegistry>,
}

impl ListenerSynchronizer {
    #[must_use]
    pub fn new(store: Arc<dyn ArtefactStore<Listener>>, runtime: Arc<RuntimeRegistry>) -> Self {
        Self { store, runtime }
    }
}

impl PhaseEffects<Listener> for ListenerSynchronizer {
    fn create(&self, listener: &Listener) -> Result<(), SynchronizerError> {
        self.runtime
            .register_listener(listener.artefact.name(), &listener.handler, listener.kind);
        info!(name = listener.artefact.name(), kind = %listener.kind, "listener registered");
        Ok(())
    }

    fn update(&self, listener: &Listener) -> Result<(), SynchronizerError> {
        let was_running = self.runtime.stop_listener(listener.artefact.name());
        self.runtime.unregister_listener(listener.artefact.name());
        self.create(listener)?;
        if was_running {
            self.start(listener)?;
        }
        Ok(())
    }

    fn delete(&self, listener: &Listener) -> Result<(), SynchronizerError> {
        self.runtime.stop_listener(listener.artefact.name());
        if self.runtime.unregister_listener(listener.artefact.name()).is_some() {
            info!(name = listener.artefact.name(), "listener unregistered");
        }
        Ok(())
    }

    fn start(&self, listener: &Listener) -> Result<(), SynchronizerError> {
        let name = listener.artefact.name();
        if self.runtime.listener(name).is_none() {
            // Registry is process-local: recover after a restart.
            self.create(listener)?;
        }
        match self.runtime.start_listener(name) {
            Some(true) => {
                info!(name, "listener started");
                Ok(())
            }
            Some(false) => Ok(()),
            None => Err(SynchronizerError::runtime(format!(
                "listener {name} is not registered"
            ))),
        }
    }

    fn stop(&self, listener: &Listener) -> Result<(), SynchronizerError> {
        if self.runtime.stop_listener(listener.artefact.name()) {
            info!(name = listener.artefact.name(), "listener stopped");
        }
        Ok(())
    }
}

impl Synchronizer for ListenerSynchronizer {
    type Artefact = Listener;

    fn artefact_type(&self) -> &'static str {
        Listener::ARTEFACT_TYPE
    }

    fn file_extension(&self) -> &'static str {
        ".listener"
    }

    fn order(&self) -> i32 {
        30
    }

    fn store(&self) -> &dyn ArtefactStore<Listener> {
        self.store.as_ref()
    }

    fn parse_impl(&self, location: &str, content: &[u8]) -> Result<Vec<Listener>, ParseError> {
        let declaration: ListenerDeclaration =
            serde_json::from_slice(content).map_err(|e| ParseError::malformed(location, e))?;
        if declaration.handler.trim().is_empty() {
            return Err(ParseError::invalid(location, "handler must not be empty"));
        }
        let artefact = Artefact::new(Listener::ARTEFACT_TYPE, location, declaration.name)
            .map_err(|e| ParseError::invalid(location, e))?
            .with_dependencies(declaration.dependencies);
        Ok(vec![Listener {
            artefact,
            handler: declaration.handler,
            kind: declaration.kind,
        }])
    }

    fn complete(
        &self,
        wrapper: &mut TopologyWrapper<Listener>,
        phase: ArtefactPhase,
        callback: &dyn SynchronizerCallback,
    ) -> Result<CompletionOutcome, SynchronizerError> {
        drive_phase(self, self, wrapper, phase, callback)
    }

    fn cleanup_impl(&self, listener: &Listener) -> Result<(), SynchronizerError> {
        PhaseEffects::delete(self, listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::PassCallback;
    use crate::store::InMemoryArtefactStore;
    use crate::synchronizer::DynSynchronizer;
    use artsync_artefact::{ArtefactKey, ArtefactLifecycle, ArtefactState};
    use artsync_topology::TopologicalDepleter;
    use pretty_assertions::assert_eq;

    const ORDERS: &[u8] = br#"{"name": "orders", "handler": "orders.handle", "kind": "queue"}"#;

    fn fixture() -> (ListenerSynchronizer, Arc<InMemoryArtefactStore<Listener>>, Arc<RuntimeRegistry>) {
        let store: Arc<InMemoryArtefactStore<Listener>> = Arc::new(InMemoryArtefactStore::new());
        let runtime = Arc::new(RuntimeRegistry::new());
        let synchronizer = ListenerSynchronizer::new(store.clone(), runtime.clone());
        (synchronizer, store, runtime)
    }

    fn key() -> ArtefactKey {
        ArtefactKey::new("listener:/app/orders.listener:orders")
    }

    fn run(sync: &ListenerSynchronizer, phase: ArtefactPhase, callback: &PassCallback) {
        DynSynchronizer::run_phase(sync, &[key()], phase, &TopologicalDepleter::new(), callback)
            .unwrap();
    }

    #[test]
    fn parse_assigns_identity() {
        let (sync, _, _) = fixture();
        let parsed = Synchronizer::parse(&sync, "/app/orders.listener", ORDERS).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].key(), &key());
        assert_eq!(parsed[0].kind(), ListenerKind::Queue);
        assert!(parsed[0].artefact().id().is_some());
    }

    #[test]
    fn malformed_declaration_saves_nothing() {
        let (sync, store, _) = fixture();
        let err = Synchronizer::parse(&sync, "/app/bad.listener", b"{ nope").unwrap_err();
        assert!(matches!(err, ParseError::Malformed { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn create_then_start_runs_consumer() {
        let (sync, store, runtime) = fixture();
        Synchronizer::parse(&sync, "/app/orders.listener", ORDERS).unwrap();
        let callback = PassCallback::new();
        run(&sync, ArtefactPhase::Create, &callback);
        run(&sync, ArtefactPhase::Start, &callback);

        assert!(runtime.is_running("orders"));
        let stored = store.find_by_key(&key()).unwrap().unwrap();
        assert_eq!(stored.artefact().lifecycle(), ArtefactLifecycle::Created);
        assert_eq!(stored.artefact().state(), ArtefactState::SuccessfulCreateUpdate);
        assert!(callback.errors().is_empty());
    }

    #[test]
    fn double_start_and_stop_are_no_ops() {
        let (sync, _, runtime) = fixture();
        Synchronizer::parse(&sync, "/app/orders.listener", ORDERS).unwrap();
        let callback = PassCallback::new();
        run(&sync, ArtefactPhase::Create, &callback);
        run(&sync, ArtefactPhase::Start, &callback);
        run(&sync, ArtefactPhase::Start, &callback);
        assert!(runtime.is_running("orders"));
        run(&sync, ArtefactPhase::Stop, &callback);
        run(&sync, ArtefactPhase::Stop, &callback);
        assert!(!runtime.is_running("orders"));
        assert!(callback.errors().is_empty());
    }

    #[test]
    fn start_on_failed_lifecycle_is_fatal() {
        let (sync, store, runtime) = fixture();
        let mut parsed = Synchronizer::parse(&sync, "/app/orders.listener", ORDERS).unwrap();
        let record = parsed[0].artefact_mut();
        record
            .transition(ArtefactLifecycle::Failed, ArtefactState::FailedCreate, None)
            .unwrap();
        store.update_status(record).unwrap();

        let callback = PassCallback::new();
        let outcome =
            DynSynchronizer::run_phase(&sync, &[key()], ArtefactPhase::Start, &TopologicalDepleter::new(), &callback)
                .unwrap();
        assert_eq!(outcome.failed, vec![key()]);
        assert!(!runtime.is_running("orders"));
        let stored = store.find_by_key(&key()).unwrap().unwrap();
        assert_eq!(stored.artefact().state(), ArtefactState::Fatal);
        assert_eq!(callback.errors().len(), 1);
    }

    #[test]
    fn update_restarts_running_consumer() {
        let (sync, _, runtime) = fixture();
        Synchronizer::parse(&sync, "/app/orders.listener", ORDERS).unwrap();
        let callback = PassCallback::new();
        run(&sync, ArtefactPhase::Create, &callback);
        run(&sync, ArtefactPhase::Start, &callback);

        let changed = br#"{"name": "orders", "handler": "orders.v2", "kind": "topic"}"#;
        let reparsed = Synchronizer::parse(&sync, "/app/orders.listener", changed).unwrap();
        assert_eq!(reparsed[0].artefact().lifecycle(), ArtefactLifecycle::Modified);

        run(&sync, ArtefactPhase::Update, &callback);
        let listener = runtime.listener("orders").unwrap();
        assert_eq!(listener.handler, "orders.v2");
        assert!(listener.running);
    }

    #[test]
    fn cleanup_unregisters_and_removes_record() {
        let (sync, store, runtime) = fixture();
        Synchronizer::parse(&sync, "/app/orders.listener", ORDERS).unwrap();
        let callback = PassCallback::new();
        run(&sync, ArtefactPhase::Create, &callback);
        run(&sync, ArtefactPhase::Delete, &callback);
        assert_eq!(
            store.find_by_key(&key()).unwrap().unwrap().artefact().lifecycle(),
            ArtefactLifecycle::Deleted
        );
        DynSynchronizer::cleanup(&sync, &key()).unwrap();
        assert!(store.is_empty());
        assert!(runtime.listener("orders").is_none());
    }
}
