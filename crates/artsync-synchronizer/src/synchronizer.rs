//! Synchronizer plugin contract
//!
//! Implement [`Synchronizer`] to add support for a new artefact type. The
//! driver only ever sees the type-erased [`DynSynchronizer`], obtained for
//! free through the blanket implementation.

use crate::callback::SynchronizerCallback;
use crate::error::{ParseError, StoreError, SynchronizerError};
use crate::store::{ArtefactStore, StoreSink};
use artsync_artefact::{
    Artefact, ArtefactKey, ArtefactLifecycle, ArtefactPhase, ArtefactState, Artefactual, Checksum,
};
use artsync_topology::{CompletionOutcome, TopologicalDepleter, TopologyWrapper};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Per-type plugin: parsing, persistence access and side effects
pub trait Synchronizer: Send + Sync + 'static {
    /// Typed artefact this synchronizer manages
    type Artefact: Artefactual;

    /// Artefact type tag, e.g. `"table"`
    fn artefact_type(&self) -> &'static str;

    /// Declaration file extension, with the dot, e.g. `".table"`
    fn file_extension(&self) -> &'static str;

    /// Position in the phase plan; lower values run first in forward phases
    fn order(&self) -> i32 {
        0
    }

    /// Persistence collaborator for this type
    fn store(&self) -> &dyn ArtefactStore<Self::Artefact>;

    fn is_accepted_path(&self, location: &str) -> bool {
        location.ends_with(self.file_extension())
    }

    fn is_accepted_type(&self, artefact_type: &str) -> bool {
        artefact_type == self.artefact_type()
    }

    /// Deserialize declaration content into artefacts
    ///
    /// Location, type and key are assigned afterwards by [`Self::parse`].
    fn parse_impl(&self, location: &str, content: &[u8])
        -> Result<Vec<Self::Artefact>, ParseError>;

    /// Parse and persist a declaration
    ///
    /// Re-declared artefacts keep the numeric identity and status of their
    /// stored record. Changed content reopens a settled or failed artefact
    /// (CREATED/UPDATED → MODIFIED, never-created FAILED → NEW); unchanged
    /// content leaves the stored status as it is. Nothing is saved unless the
    /// whole declaration is valid.
    fn parse(&self, location: &str, content: &[u8]) -> Result<Vec<Self::Artefact>, ParseError> {
        let checksum = Checksum::compute(content);
        let mut parsed = self.parse_impl(location, content)?;

        let mut keys = HashSet::new();
        for artefact in &mut parsed {
            let record = artefact.artefact_mut();
            record
                .set_location(location)
                .and_then(|()| record.set_artefact_type(self.artefact_type()))
                .map_err(|e| ParseError::invalid(location, e))?;
            record.set_checksum(Some(checksum));
            if !keys.insert(record.key().clone()) {
                return Err(ParseError::invalid(
                    location,
                    format!("duplicate artefact {}", record.key()),
                ));
            }
        }

        let mut saved = Vec::with_capacity(parsed.len());
        for mut artefact in parsed {
            if let Some(existing) = self.store().find_by_key(artefact.key())? {
                redeclare(artefact.artefact_mut(), existing.artefact())
                    .map_err(|e| ParseError::invalid(location, e))?;
            }
            debug!(
                key = %artefact.key(),
                lifecycle = %artefact.artefact().lifecycle(),
                "artefact parsed"
            );
            saved.push(self.store().save(artefact)?);
        }
        Ok(saved)
    }

    /// All persisted artefacts of this type
    fn retrieve(&self) -> Result<Vec<Self::Artefact>, StoreError> {
        self.store().get_all()
    }

    /// Perform the side effect of `phase` for one wrapper
    ///
    /// Every path must call `callback.register_state` exactly once, except
    /// when returning `Err`: the caller then registers the failure. Calling
    /// it again for a phase that already succeeded must be a no-op.
    fn complete(
        &self,
        wrapper: &mut TopologyWrapper<Self::Artefact>,
        phase: ArtefactPhase,
        callback: &dyn SynchronizerCallback,
    ) -> Result<CompletionOutcome, SynchronizerError>;

    /// Tear down runtime side effects of an artefact about to be removed
    fn cleanup_impl(&self, _artefact: &Self::Artefact) -> Result<(), SynchronizerError> {
        Ok(())
    }

    /// Tear down and remove the persisted record
    fn cleanup(&self, artefact: &Self::Artefact) -> Result<(), SynchronizerError> {
        self.cleanup_impl(artefact)?;
        self.store().delete(artefact.key())?;
        info!(key = %artefact.key(), "artefact removed");
        Ok(())
    }
}

fn redeclare(
    record: &mut Artefact,
    existing: &Artefact,
) -> Result<(), artsync_artefact::ArtefactError> {
    let checksum = record.checksum();
    record.adopt_identity(existing);
    if existing.checksum() == checksum && existing.lifecycle() != ArtefactLifecycle::Deleted {
        return Ok(());
    }
    let lifecycle = if existing.lifecycle().is_pending() {
        existing.lifecycle()
    } else {
        existing.reopened_lifecycle()
    };
    record.transition(lifecycle, ArtefactState::Initial, None)
}

/// Side effect hooks for [`drive_phase`]
pub trait PhaseEffects<A: Artefactual> {
    fn create(&self, artefact: &A) -> Result<(), SynchronizerError>;

    /// Full teardown then rebuild
    fn update(&self, artefact: &A) -> Result<(), SynchronizerError>;

    fn delete(&self, artefact: &A) -> Result<(), SynchronizerError>;

    fn start(&self, _artefact: &A) -> Result<(), SynchronizerError> {
        Ok(())
    }

    fn stop(&self, _artefact: &A) -> Result<(), SynchronizerError> {
        Ok(())
    }
}

/// Phase dispatch shared by the built-in kinds
///
/// - CREATE acts on NEW, UPDATE on MODIFIED; otherwise a no-op
/// - DELETE tears down anything that may have a side effect in place; a NEW
///   artefact is marked DELETED without one
/// - START refuses a FAILED lifecycle with FATAL and only runs on settled
///   artefacts; STOP always runs its (guarded) side effect
///
/// Side effect errors are returned to the caller, which registers them.
/// Exactly one state is registered per call; IN_PROGRESS is never recorded.
pub fn drive_phase<S>(
    synchronizer: &S,
    effects: &dyn PhaseEffects<S::Artefact>,
    wrapper: &mut TopologyWrapper<S::Artefact>,
    phase: ArtefactPhase,
    callback: &dyn SynchronizerCallback,
) -> Result<CompletionOutcome, SynchronizerError>
where
    S: Synchronizer + ?Sized,
{
    use ArtefactLifecycle as L;

    let sink = StoreSink::new(synchronizer.store());
    let lifecycle = wrapper.artefact().artefact().lifecycle();
    let state = wrapper.artefact().artefact().state();

    let (next_lifecycle, next_state, outcome) = match phase {
        ArtefactPhase::Create if lifecycle == L::New => {
            effects.create(wrapper.artefact())?;
            (L::Created, phase.success_state(), CompletionOutcome::Completed)
        }
        ArtefactPhase::Update if lifecycle == L::Modified => {
            effects.update(wrapper.artefact())?;
            (L::Updated, phase.success_state(), CompletionOutcome::Completed)
        }
        ArtefactPhase::Create | ArtefactPhase::Update => {
            (lifecycle, state, CompletionOutcome::Completed)
        }
        ArtefactPhase::Delete => match lifecycle {
            L::Deleted => (lifecycle, state, CompletionOutcome::Completed),
            L::New => (L::Deleted, phase.success_state(), CompletionOutcome::Completed),
            _ => {
                effects.delete(wrapper.artefact())?;
                (L::Deleted, phase.success_state(), CompletionOutcome::Completed)
            }
        },
        ArtefactPhase::Start => match lifecycle {
            L::Failed => (
                L::Failed,
                ArtefactState::Fatal,
                CompletionOutcome::Blocked("lifecycle is FAILED".into()),
            ),
            L::Created | L::Updated => {
                effects.start(wrapper.artefact())?;
                (lifecycle, phase.success_state(), CompletionOutcome::Completed)
            }
            _ => (
                lifecycle,
                state,
                CompletionOutcome::Blocked(format!("not started, lifecycle is {lifecycle}")),
            ),
        },
        ArtefactPhase::Stop => {
            if lifecycle == L::New || lifecycle == L::Deleted {
                (lifecycle, state, CompletionOutcome::Completed)
            } else {
                effects.stop(wrapper.artefact())?;
                let next_state = if lifecycle.is_pending() || lifecycle == L::Failed {
                    state
                } else {
                    phase.success_state()
                };
                (lifecycle, next_state, CompletionOutcome::Completed)
            }
        }
    };

    let unchanged = next_lifecycle == lifecycle && next_state == state;
    let message = if unchanged {
        wrapper.artefact().artefact().message().map(str::to_string)
    } else {
        outcome.reason().map(str::to_string)
    };
    callback.register_state(
        &sink,
        wrapper.artefact_mut().artefact_mut(),
        next_lifecycle,
        next_state,
        message,
    );
    Ok(outcome)
}

/// Keys of one `(type, phase)` depletion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseOutcome {
    pub completed: Vec<ArtefactKey>,
    /// Attempted and not completed (failed or blocked)
    pub failed: Vec<ArtefactKey>,
    /// Never attempted: a dependency did not complete, or a cycle
    pub unresolved: Vec<ArtefactKey>,
}

impl PhaseOutcome {
    #[must_use]
    pub fn residual_len(&self) -> usize {
        self.failed.len() + self.unresolved.len()
    }
}

/// Type-erased synchronizer stored in the registry
pub trait DynSynchronizer: Send + Sync {
    fn artefact_type(&self) -> &'static str;

    fn file_extension(&self) -> &'static str;

    fn order(&self) -> i32;

    fn is_accepted_path(&self, location: &str) -> bool;

    fn is_accepted_type(&self, artefact_type: &str) -> bool;

    /// Parse and persist, returning the common records
    fn parse(&self, location: &str, content: &[u8]) -> Result<Vec<Artefact>, ParseError>;

    fn retrieve(&self) -> Result<Vec<Artefact>, StoreError>;

    fn find(&self, key: &ArtefactKey) -> Result<Option<Artefact>, StoreError>;

    /// Deplete the stored artefacts named by `keys` (in that order) for `phase`
    ///
    /// # Errors
    /// Only a failing store while loading the batch; artefact-level failures
    /// are recorded through `callback`.
    fn run_phase(
        &self,
        keys: &[ArtefactKey],
        phase: ArtefactPhase,
        depleter: &TopologicalDepleter,
        callback: &dyn SynchronizerCallback,
    ) -> Result<PhaseOutcome, StoreError>;

    /// Tear down and remove one stored artefact; absent keys are ignored
    fn cleanup(&self, key: &ArtefactKey) -> Result<(), SynchronizerError>;

    /// Reopen a FAILED or FATAL artefact for the next pass
    ///
    /// Returns `false` if the artefact needed no retry.
    fn retry(&self, key: &ArtefactKey) -> Result<bool, SynchronizerError>;
}

impl std::fmt::Debug for dyn DynSynchronizer + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynSynchronizer")
            .field("artefact_type", &self.artefact_type())
            .finish_non_exhaustive()
    }
}

impl<S> DynSynchronizer for S
where
    S: Synchronizer,
{
    fn artefact_type(&self) -> &'static str {
        Synchronizer::artefact_type(self)
    }

    fn file_extension(&self) -> &'static str {
        Synchronizer::file_extension(self)
    }

    fn order(&self) -> i32 {
        Synchronizer::order(self)
    }

    fn is_accepted_path(&self, location: &str) -> bool {
        Synchronizer::is_accepted_path(self, location)
    }

    fn is_accepted_type(&self, artefact_type: &str) -> bool {
        Synchronizer::is_accepted_type(self, artefact_type)
    }

    fn parse(&self, location: &str, content: &[u8]) -> Result<Vec<Artefact>, ParseError> {
        Ok(Synchronizer::parse(self, location, content)?
            .into_iter()
            .map(|a| a.artefact().clone())
            .collect())
    }

    fn retrieve(&self) -> Result<Vec<Artefact>, StoreError> {
        Ok(Synchronizer::retrieve(self)?
            .into_iter()
            .map(|a| a.artefact().clone())
            .collect())
    }

    fn find(&self, key: &ArtefactKey) -> Result<Option<Artefact>, StoreError> {
        Ok(self.store().find_by_key(key)?.map(|a| a.artefact().clone()))
    }

    fn run_phase(
        &self,
        keys: &[ArtefactKey],
        phase: ArtefactPhase,
        depleter: &TopologicalDepleter,
        callback: &dyn SynchronizerCallback,
    ) -> Result<PhaseOutcome, StoreError> {
        let mut batch = Vec::with_capacity(keys.len());
        for key in keys {
            match self.store().find_by_key(key)? {
                Some(artefact) => batch.push(artefact),
                None => warn!(%key, %phase, "artefact vanished from store, skipped"),
            }
        }
        if batch.is_empty() {
            return Ok(PhaseOutcome::default());
        }

        let sink = StoreSink::new(self.store());
        let mut completer = |wrapper: &mut TopologyWrapper<S::Artefact>, phase: ArtefactPhase| {
            match self.complete(wrapper, phase, callback) {
                Ok(outcome) => outcome,
                Err(err) => {
                    let record = wrapper.artefact_mut().artefact_mut();
                    let lifecycle = if err.is_retryable() {
                        record.lifecycle()
                    } else {
                        ArtefactLifecycle::Failed
                    };
                    let reason = err.to_string();
                    callback.register_state(
                        &sink,
                        record,
                        lifecycle,
                        phase.failure_state(),
                        Some(reason.clone()),
                    );
                    CompletionOutcome::Failed(reason)
                }
            }
        };

        let depletion = depleter.deplete(TopologyWrapper::wrap_all(batch), phase, &mut completer);
        let outcome = PhaseOutcome {
            completed: depletion.completed().iter().map(|w| w.key().clone()).collect(),
            failed: depletion
                .residual_keys()
                .filter(|key| depletion.attempt(key).is_some())
                .cloned()
                .collect(),
            unresolved: depletion.unattempted_keys().cloned().collect(),
        };
        callback.register_residual(Synchronizer::artefact_type(self), phase, &outcome.unresolved);
        info!(
            artefact_type = Synchronizer::artefact_type(self),
            %phase,
            completed = outcome.completed.len(),
            failed = outcome.failed.len(),
            unresolved = outcome.unresolved.len(),
            "phase finished"
        );
        Ok(outcome)
    }

    fn cleanup(&self, key: &ArtefactKey) -> Result<(), SynchronizerError> {
        match self.store().find_by_key(key)? {
            Some(artefact) => Synchronizer::cleanup(self, &artefact),
            None => Ok(()),
        }
    }

    fn retry(&self, key: &ArtefactKey) -> Result<bool, SynchronizerError> {
        let mut artefact = self
            .store()
            .find_by_key(key)?
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        let record = artefact.artefact_mut();
        if record.lifecycle() != ArtefactLifecycle::Failed && !record.is_fatal() {
            return Ok(false);
        }
        let lifecycle = record.reopened_lifecycle();
        record.transition(lifecycle, ArtefactState::Initial, None)?;
        self.store().update_status(record)?;
        info!(%key, %lifecycle, "artefact reopened for retry");
        Ok(true)
    }
}
