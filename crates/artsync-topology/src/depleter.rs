//! Fixed-point depletion of a batch for one phase

use crate::outcome::{Completer, CompletionOutcome};
use crate::wrapper::TopologyWrapper;
use artsync_artefact::{ArtefactKey, ArtefactPhase, Artefactual};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Drives one phase over a batch in dependency order
///
/// Repeatedly sweeps the pending wrappers in input order and completes every
/// wrapper whose in-batch dependencies already left the pending set. A
/// wrapper whose attempt fails or is blocked stays pending and is never
/// attempted again within the same call, so the loop ends on the first sweep
/// that completes nothing.
///
/// Teardown phases (STOP, DELETE) run in the opposite direction: a wrapper is
/// ready once no pending wrapper depends on it.
///
/// # Complexity
/// At most `n + 1` sweeps of `n` wrappers each.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopologicalDepleter;

impl TopologicalDepleter {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Deplete `wrappers` for `phase`
    pub fn deplete<A, C>(
        &self,
        wrappers: Vec<TopologyWrapper<A>>,
        phase: ArtefactPhase,
        completer: &mut C,
    ) -> Depletion<A>
    where
        A: Artefactual,
        C: Completer<A> + ?Sized,
    {
        let mut slots: Vec<Option<TopologyWrapper<A>>> = wrappers.into_iter().map(Some).collect();
        let mut pending: HashSet<ArtefactKey> = slots
            .iter()
            .flatten()
            .map(|w| w.key().clone())
            .collect();
        let dependents = if phase.is_teardown() {
            dependents_of(&slots)
        } else {
            HashMap::new()
        };

        let mut attempts: IndexMap<ArtefactKey, CompletionOutcome> = IndexMap::new();
        let mut completed = Vec::new();
        let mut sweeps = 0;

        loop {
            sweeps += 1;
            let mut progressed = false;

            for slot in &mut slots {
                let Some(wrapper) = slot.as_mut() else {
                    continue;
                };
                if attempts.contains_key(wrapper.key()) {
                    continue;
                }
                let ready = if phase.is_teardown() {
                    dependents
                        .get(wrapper.key())
                        .map_or(true, |ds| ds.iter().all(|d| !pending.contains(d)))
                } else {
                    wrapper.is_ready(&pending)
                };
                if !ready {
                    continue;
                }

                let outcome = completer.complete(wrapper, phase);
                trace!(key = %wrapper.key(), %phase, %outcome, "completion attempt");
                if outcome.is_completed() {
                    pending.remove(wrapper.key());
                    if let Some(done) = slot.take() {
                        completed.push(done);
                    }
                    progressed = true;
                } else {
                    attempts.insert(wrapper.key().clone(), outcome);
                }
            }

            if !progressed || slots.iter().all(Option::is_none) {
                break;
            }
        }

        let residual: Vec<TopologyWrapper<A>> = slots.into_iter().flatten().collect();
        debug!(
            %phase,
            sweeps,
            completed = completed.len(),
            residual = residual.len(),
            "depletion finished"
        );
        Depletion {
            completed,
            residual,
            attempts,
            sweeps,
        }
    }
}

fn dependents_of<A: Artefactual>(
    slots: &[Option<TopologyWrapper<A>>],
) -> HashMap<ArtefactKey, Vec<ArtefactKey>> {
    let mut dependents: HashMap<ArtefactKey, Vec<ArtefactKey>> = HashMap::new();
    for wrapper in slots.iter().flatten() {
        for dependency in wrapper.dependencies() {
            dependents
                .entry(dependency.clone())
                .or_default()
                .push(wrapper.key().clone());
        }
    }
    dependents
}

/// Outcome of one [`TopologicalDepleter::deplete`] call
#[derive(Debug)]
pub struct Depletion<A: Artefactual> {
    completed: Vec<TopologyWrapper<A>>,
    residual: Vec<TopologyWrapper<A>>,
    attempts: IndexMap<ArtefactKey, CompletionOutcome>,
    sweeps: usize,
}

impl<A: Artefactual> Depletion<A> {
    /// Completed wrappers, in completion order
    #[inline]
    #[must_use]
    pub fn completed(&self) -> &[TopologyWrapper<A>] {
        &self.completed
    }

    /// Wrappers not completed, in input order
    #[inline]
    #[must_use]
    pub fn residual(&self) -> &[TopologyWrapper<A>] {
        &self.residual
    }

    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.residual.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    /// Outcome of the attempt on a residual wrapper, if it was attempted
    #[must_use]
    pub fn attempt(&self, key: &ArtefactKey) -> Option<&CompletionOutcome> {
        self.attempts.get(key)
    }

    pub fn residual_keys(&self) -> impl Iterator<Item = &ArtefactKey> {
        self.residual.iter().map(TopologyWrapper::key)
    }

    /// Residual wrappers that were never attempted (dependency stuck or cycle)
    pub fn unattempted_keys(&self) -> impl Iterator<Item = &ArtefactKey> {
        self.residual_keys()
            .filter(|key| !self.attempts.contains_key(*key))
    }

    /// Split into `(completed, residual)`
    #[must_use]
    pub fn into_parts(self) -> (Vec<TopologyWrapper<A>>, Vec<TopologyWrapper<A>>) {
        (self.completed, self.residual)
    }
}
