//! Pass-scoped observer of artefact outcomes

use crate::store::StatusSink;
use artsync_artefact::{Artefact, ArtefactKey, ArtefactLifecycle, ArtefactPhase, ArtefactState};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, error};

/// Observer handed to every synchronizer call of one reconciliation pass
pub trait SynchronizerCallback: Send + Sync {
    /// Record `(lifecycle, state)` on `artefact` and persist it through `sink`
    ///
    /// Never fails: an illegal transition or a persistence failure is itself
    /// recorded as a pass error.
    fn register_state(
        &self,
        sink: &dyn StatusSink,
        artefact: &mut Artefact,
        lifecycle: ArtefactLifecycle,
        state: ArtefactState,
        message: Option<String>,
    );

    /// Record wrappers of one `(type, phase)` batch that were never attempted
    fn register_residual(&self, artefact_type: &str, phase: ArtefactPhase, keys: &[ArtefactKey]);

    /// Free-text diagnostic not tied to one artefact
    fn add_error(&self, message: String);
}

/// One `register_state` call as observed by [`PassCallback`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateRecord {
    pub key: ArtefactKey,
    pub lifecycle: ArtefactLifecycle,
    pub state: ArtefactState,
}

/// Default callback: accumulates the error list of one pass
///
/// A failure is listed once per artefact and state: later phases of the same
/// pass re-registering an unchanged failed pair add no second line.
#[derive(Debug, Default)]
pub struct PassCallback {
    errors: Mutex<Vec<String>>,
    records: Mutex<Vec<StateRecord>>,
    reported: Mutex<HashSet<(ArtefactKey, ArtefactState)>>,
}

impl PassCallback {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors recorded so far, in order
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    /// Every state registration, in order
    #[must_use]
    pub fn records(&self) -> Vec<StateRecord> {
        self.records.lock().clone()
    }

    /// Drain the error list
    pub fn take_errors(&self) -> Vec<String> {
        std::mem::take(&mut *self.errors.lock())
    }
}

impl SynchronizerCallback for PassCallback {
    fn register_state(
        &self,
        sink: &dyn StatusSink,
        artefact: &mut Artefact,
        lifecycle: ArtefactLifecycle,
        state: ArtefactState,
        message: Option<String>,
    ) {
        let key = artefact.key().clone();
        if let Err(err) = artefact.transition(lifecycle, state, message) {
            self.add_error(format!("{key}: {err}"));
            return;
        }
        if let Err(err) = sink.update_status(artefact) {
            self.add_error(format!("{key}: cannot persist {lifecycle}/{state}: {err}"));
        }

        if state.is_failure() && self.reported.lock().insert((key.clone(), state)) {
            self.add_error(format!(
                "{key}: {state}: {}",
                artefact.message().unwrap_or("no message")
            ));
        } else {
            debug!(%key, %lifecycle, %state, "state registered");
        }
        self.records.lock().push(StateRecord {
            key,
            lifecycle,
            state,
        });
    }

    fn register_residual(&self, artefact_type: &str, phase: ArtefactPhase, keys: &[ArtefactKey]) {
        if keys.is_empty() {
            return;
        }
        let keys: Vec<&str> = keys.iter().map(ArtefactKey::as_str).collect();
        self.add_error(format!(
            "[{artefact_type}] {phase}: {} artefact(s) left unresolved by dependencies: {}",
            keys.len(),
            keys.join(", ")
        ));
    }

    fn add_error(&self, message: String) {
        error!(%message, "reconciliation error");
        self.errors.lock().push(message);
    }
}
