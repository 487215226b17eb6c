//! Testing utilities for the artsync workspace
//!
//! Shared fixtures: artefact builders and a [`RecordingSynchronizer`] whose
//! side effects only append to a call log.

#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]

use artsync_artefact::{Artefact, ArtefactKey, ArtefactPhase};
use artsync_synchronizer::{
    drive_phase, ArtefactStore, InMemoryArtefactStore, ParseError, PhaseEffects, Synchronizer,
    SynchronizerCallback, SynchronizerError,
};
use artsync_topology::{CompletionOutcome, TopologyWrapper};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Artefact of type `artefact_type` declared at `location`
pub fn artefact(artefact_type: &str, location: &str, name: &str) -> Artefact {
    Artefact::new(artefact_type, location, name).unwrap()
}

/// Artefact depending on the given keys
pub fn artefact_with_deps(
    artefact_type: &str,
    location: &str,
    name: &str,
    dependencies: &[&str],
) -> Artefact {
    artefact(artefact_type, location, name).with_dependencies(dependencies.iter().copied())
}

/// JSON declaration understood by [`RecordingSynchronizer`]
pub fn declaration(name: &str, dependencies: &[&str]) -> Vec<u8> {
    serde_json::json!({ "name": name, "dependencies": dependencies })
        .to_string()
        .into_bytes()
}

/// Side effect invocations, in call order
pub type CallLog = Arc<Mutex<Vec<(ArtefactKey, ArtefactPhase)>>>;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RecordDeclaration {
    name: String,
    #[serde(default)]
    dependencies: Vec<String>,
}

/// Synchronizer over plain [`Artefact`]s recording every side effect
///
/// Files are JSON objects `{"name": .., "dependencies": [..]}`. Effects for
/// names registered through [`Self::fail_on`] return a retryable runtime
/// error; [`Self::reject_on`] returns a non-retryable one. Clones share
/// the store, the call log and the fault lists, so a test can keep one
/// while the registry owns the other.
#[derive(Clone)]
pub struct RecordingSynchronizer {
    artefact_type: &'static str,
    extension: &'static str,
    order: i32,
    store: Arc<InMemoryArtefactStore<Artefact>>,
    calls: CallLog,
    failing: Arc<Mutex<HashSet<(String, ArtefactPhase)>>>,
    rejecting: Arc<Mutex<HashSet<(String, ArtefactPhase)>>>,
}

impl RecordingSynchronizer {
    pub fn new(artefact_type: &'static str, extension: &'static str, order: i32) -> Self {
        Self {
            artefact_type,
            extension,
            order,
            store: Arc::new(InMemoryArtefactStore::new()),
            calls: CallLog::default(),
            failing: Arc::default(),
            rejecting: Arc::default(),
        }
    }

    /// Share `calls` with other synchronizers to observe cross-type ordering
    #[must_use]
    pub fn with_call_log(mut self, calls: CallLog) -> Self {
        self.calls = calls;
        self
    }

    pub fn call_log(&self) -> CallLog {
        Arc::clone(&self.calls)
    }

    pub fn shared_store(&self) -> Arc<InMemoryArtefactStore<Artefact>> {
        Arc::clone(&self.store)
    }

    pub fn calls(&self) -> Vec<(ArtefactKey, ArtefactPhase)> {
        self.calls.lock().clone()
    }

    /// Make the `phase` effect of `name` fail with a retryable error
    pub fn fail_on(&self, name: &str, phase: ArtefactPhase) {
        self.failing.lock().insert((name.to_string(), phase));
    }

    /// Make the `phase` effect of `name` fail with a non-retryable error
    pub fn reject_on(&self, name: &str, phase: ArtefactPhase) {
        self.rejecting.lock().insert((name.to_string(), phase));
    }

    pub fn heal(&self) {
        self.failing.lock().clear();
        self.rejecting.lock().clear();
    }

    fn effect(&self, artefact: &Artefact, phase: ArtefactPhase) -> Result<(), SynchronizerError> {
        let probe = (artefact.name().to_string(), phase);
        if self.rejecting.lock().contains(&probe) {
            return Err(SynchronizerError::invalid(format!(
                "{} rejected on {phase}",
                artefact.name()
            )));
        }
        if self.failing.lock().contains(&probe) {
            return Err(SynchronizerError::runtime(format!(
                "{} failed on {phase}",
                artefact.name()
            )));
        }
        self.calls.lock().push((artefact.key().clone(), phase));
        Ok(())
    }
}

impl PhaseEffects<Artefact> for RecordingSynchronizer {
    fn create(&self, artefact: &Artefact) -> Result<(), SynchronizerError> {
        self.effect(artefact, ArtefactPhase::Create)
    }

    fn update(&self, artefact: &Artefact) -> Result<(), SynchronizerError> {
        self.effect(artefact, ArtefactPhase::Update)
    }

    fn delete(&self, artefact: &Artefact) -> Result<(), SynchronizerError> {
        self.effect(artefact, ArtefactPhase::Delete)
    }

    fn start(&self, artefact: &Artefact) -> Result<(), SynchronizerError> {
        self.effect(artefact, ArtefactPhase::Start)
    }

    fn stop(&self, artefact: &Artefact) -> Result<(), SynchronizerError> {
        self.effect(artefact, ArtefactPhase::Stop)
    }
}

impl Synchronizer for RecordingSynchronizer {
    type Artefact = Artefact;

    fn artefact_type(&self) -> &'static str {
        self.artefact_type
    }

    fn file_extension(&self) -> &'static str {
        self.extension
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn store(&self) -> &dyn ArtefactStore<Artefact> {
        self.store.as_ref()
    }

    fn parse_impl(&self, location: &str, content: &[u8]) -> Result<Vec<Artefact>, ParseError> {
        let declaration: RecordDeclaration =
            serde_json::from_slice(content).map_err(|e| ParseError::malformed(location, e))?;
        let artefact = Artefact::new(self.artefact_type, location, declaration.name)
            .map_err(|e| ParseError::invalid(location, e))?
            .with_dependencies(declaration.dependencies);
        Ok(vec![artefact])
    }

    fn complete(
        &self,
        wrapper: &mut TopologyWrapper<Artefact>,
        phase: ArtefactPhase,
        callback: &dyn SynchronizerCallback,
    ) -> Result<CompletionOutcome, SynchronizerError> {
        drive_phase(self, self, wrapper, phase, callback)
    }
}
