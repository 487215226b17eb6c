//! Reconciliation pass for one tenant
//!
//! A pass runs, under an exclusive lock:
//!
//! 1. collect declaration files and parse new or changed ones
//! 2. load every persisted artefact and pre-sort them by dependency
//! 3. teardown of artefacts whose declaration disappeared: STOP then DELETE,
//!    registry order reversed, then `cleanup` of each deleted record
//! 4. forward phases CREATE, UPDATE, START in registry order
//! 5. settle the state of each declaration file
//!
//! Artefact-level failures are recorded in the [`PassReport`]; only a failing
//! store or definition source aborts the pass.

use crate::definition::{DefinitionDecision, DefinitionStore};
use crate::error::ReconcileError;
use crate::logging::pass_span;
use crate::report::PassReport;
use crate::source::DefinitionSource;
use artsync_artefact::{Artefact, ArtefactKey, ArtefactPhase, Checksum};
use artsync_synchronizer::{
    DynSynchronizer, ParseError, PassCallback, SynchronizerCallback, SynchronizerRegistry,
};
use artsync_topology::{TopologicalDepleter, TopologicalSorter, TopologyWrapper};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Result of collecting and parsing the declaration files
#[derive(Debug, Default)]
struct Collected {
    /// Keys of freshly parsed artefacts
    parsed: HashSet<ArtefactKey>,
    /// Locations whose persisted artefacts stay declared without a re-parse
    kept: HashSet<String>,
    /// Every location a synchronizer accepts
    present: HashSet<String>,
}

/// Drives reconciliation passes for one tenant
pub struct ReconciliationDriver {
    tenant: String,
    registry: SynchronizerRegistry,
    source: Box<dyn DefinitionSource>,
    definitions: DefinitionStore,
    sorter: TopologicalSorter,
    depleter: TopologicalDepleter,
    pass_lock: Mutex<()>,
}

impl std::fmt::Debug for ReconciliationDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationDriver")
            .field("tenant", &self.tenant)
            .field("registry", &self.registry)
            .field("source", &self.source.describe())
            .finish_non_exhaustive()
    }
}

impl ReconciliationDriver {
    pub fn new(
        tenant: impl Into<String>,
        registry: SynchronizerRegistry,
        source: impl DefinitionSource + 'static,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            registry,
            source: Box::new(source),
            definitions: DefinitionStore::new(),
            sorter: TopologicalSorter::new(),
            depleter: TopologicalDepleter::new(),
            pass_lock: Mutex::new(()),
        }
    }

    #[inline]
    #[must_use]
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &SynchronizerRegistry {
        &self.registry
    }

    #[inline]
    #[must_use]
    pub fn definitions(&self) -> &DefinitionStore {
        &self.definitions
    }

    /// Whether a pass currently holds the lock
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.pass_lock.is_locked()
    }

    /// Run one full reconciliation pass
    ///
    /// # Errors
    /// - [`ReconcileError::PassInProgress`] if another pass holds the lock
    /// - [`ReconcileError::Source`] if the declarations cannot be collected
    /// - [`ReconcileError::Store`] if an artefact store fails
    pub fn reconcile(&self) -> Result<PassReport, ReconcileError> {
        let _pass = self
            .pass_lock
            .try_lock()
            .ok_or_else(|| ReconcileError::PassInProgress(self.tenant.clone()))?;
        let mut report = PassReport::new(&self.tenant);
        let span = pass_span(&self.tenant, &report.pass_id.to_string());
        let _entered = span.enter();
        info!(source = %self.source.describe(), "pass started");

        let callback = PassCallback::new();
        let collected = self.collect(&callback, &mut report)?;
        let sorted = self.sorted_universe(&mut report)?;

        let mut declared = collected.parsed;
        declared.extend(
            sorted
                .iter()
                .filter(|a| collected.kept.contains(a.location()))
                .map(|a| a.key().clone()),
        );
        let (forward, teardown): (Vec<&Artefact>, Vec<&Artefact>) =
            sorted.iter().partition(|a| declared.contains(a.key()));

        self.teardown(&teardown, &callback, &mut report)?;
        self.forward(&forward, &callback, &mut report)?;
        self.settle_definitions(&collected.present)?;

        report.finish(callback.take_errors());
        info!(
            parsed = report.parsed,
            deleted = report.deleted.len(),
            errors = report.errors.len(),
            "pass finished"
        );
        Ok(report)
    }

    /// Parse and sort without running any phase
    ///
    /// Parsed artefacts are saved to this driver's stores, so a dry run is
    /// meant for a throwaway driver.
    ///
    /// # Errors
    /// As for [`Self::reconcile`].
    pub fn check(&self) -> Result<PassReport, ReconcileError> {
        let _pass = self
            .pass_lock
            .try_lock()
            .ok_or_else(|| ReconcileError::PassInProgress(self.tenant.clone()))?;
        let mut report = PassReport::new(&self.tenant);
        let span = pass_span(&self.tenant, &report.pass_id.to_string());
        let _entered = span.enter();

        let callback = PassCallback::new();
        self.collect(&callback, &mut report)?;
        self.sorted_universe(&mut report)?;
        for cycle in &report.cycles {
            let keys: Vec<&str> = cycle.iter().map(ArtefactKey::as_str).collect();
            callback.add_error(format!("dependency cycle: {}", keys.join(", ")));
        }
        report.finish(callback.take_errors());
        Ok(report)
    }

    /// Reopen a FAILED or FATAL artefact so the next pass attempts it again
    ///
    /// Returns `false` if the artefact was neither.
    ///
    /// # Errors
    /// [`ReconcileError::UnknownArtefact`] if no store holds `key`.
    pub fn retry(&self, key: &ArtefactKey) -> Result<bool, ReconcileError> {
        let _pass = self.pass_lock.lock();
        for synchronizer in self.registry.iter() {
            if synchronizer.find(key)?.is_some() {
                return Ok(synchronizer.retry(key)?);
            }
        }
        Err(ReconcileError::UnknownArtefact(key.clone()))
    }

    /// STOP every persisted artefact, dependents first
    ///
    /// # Errors
    /// [`ReconcileError::Store`] if an artefact store fails.
    pub fn stop_all(&self) -> Result<PassReport, ReconcileError> {
        let _pass = self.pass_lock.lock();
        let mut report = PassReport::new(&self.tenant);
        let span = pass_span(&self.tenant, &report.pass_id.to_string());
        let _entered = span.enter();

        let callback = PassCallback::new();
        let sorted = self.sorted_universe(&mut report)?;
        for synchronizer in self.registry.iter().rev() {
            let keys = keys_of(sorted.iter().rev(), synchronizer);
            if keys.is_empty() {
                continue;
            }
            let outcome =
                synchronizer.run_phase(&keys, ArtefactPhase::Stop, &self.depleter, &callback)?;
            report.record(ArtefactPhase::Stop, outcome);
        }
        report.finish(callback.take_errors());
        info!(
            stopped = report.completed_in(ArtefactPhase::Stop).len(),
            "all artefacts stopped"
        );
        Ok(report)
    }

    fn collect(
        &self,
        callback: &PassCallback,
        report: &mut PassReport,
    ) -> Result<Collected, ReconcileError> {
        let mut collected = Collected::default();
        for file in self.source.collect()? {
            let location = file.location.as_str();
            let synchronizer = match self.registry.find_for_path(location) {
                Ok(synchronizer) => synchronizer,
                Err(ParseError::NoSynchronizer(_)) => {
                    debug!(location, "no synchronizer, ignored");
                    continue;
                }
                Err(err) => {
                    warn!(location, error = %err, "declaration not routed");
                    callback.add_error(err.to_string());
                    collected.kept.insert(location.to_string());
                    collected.present.insert(location.to_string());
                    continue;
                }
            };
            collected.present.insert(location.to_string());

            let checksum = Checksum::compute(&file.content);
            match self.definitions.observe(location, checksum) {
                DefinitionDecision::Process => {
                    match synchronizer.parse(location, &file.content) {
                        Ok(artefacts) => {
                            report.parsed += artefacts.len();
                            collected
                                .parsed
                                .extend(artefacts.iter().map(|a| a.key().clone()));
                        }
                        Err(err) if err.is_structural() => return Err(err.into()),
                        Err(err) => {
                            let message = err.to_string();
                            warn!(location, error = %message, "declaration skipped");
                            self.definitions.mark_parse_failed(location, message.clone());
                            callback.add_error(message);
                            collected.kept.insert(location.to_string());
                        }
                    }
                }
                DefinitionDecision::Skip | DefinitionDecision::SkipFailed => {
                    collected.kept.insert(location.to_string());
                }
            }
        }
        debug!(
            parsed = collected.parsed.len(),
            kept = collected.kept.len(),
            "definitions collected"
        );
        Ok(collected)
    }

    /// Every persisted artefact, dependencies first
    fn sorted_universe(&self, report: &mut PassReport) -> Result<Vec<Artefact>, ReconcileError> {
        let mut universe = Vec::new();
        for synchronizer in self.registry.iter() {
            universe.extend(synchronizer.retrieve()?);
        }
        let sorted = self.sorter.sort(TopologyWrapper::wrap_all(universe));
        report.cycles = sorted.cycles().to_vec();
        Ok(sorted
            .into_wrappers()
            .into_iter()
            .map(TopologyWrapper::into_inner)
            .collect())
    }

    fn teardown(
        &self,
        artefacts: &[&Artefact],
        callback: &PassCallback,
        report: &mut PassReport,
    ) -> Result<(), ReconcileError> {
        if artefacts.is_empty() {
            return Ok(());
        }
        info!(count = artefacts.len(), "tearing down undeclared artefacts");
        for phase in ArtefactPhase::TEARDOWN {
            for synchronizer in self.registry.iter().rev() {
                let keys = keys_of(artefacts.iter().rev().copied(), synchronizer);
                if keys.is_empty() {
                    continue;
                }
                let outcome = synchronizer.run_phase(&keys, phase, &self.depleter, callback)?;
                if phase == ArtefactPhase::Delete {
                    for key in &outcome.completed {
                        match synchronizer.cleanup(key) {
                            Ok(()) => report.deleted.push(key.clone()),
                            Err(err) => callback.add_error(format!("{key}: cleanup failed: {err}")),
                        }
                    }
                }
                report.record(phase, outcome);
            }
        }
        Ok(())
    }

    fn forward(
        &self,
        artefacts: &[&Artefact],
        callback: &PassCallback,
        report: &mut PassReport,
    ) -> Result<(), ReconcileError> {
        let live: Vec<&Artefact> = artefacts
            .iter()
            .copied()
            .filter(|a| {
                if a.is_fatal() {
                    debug!(key = %a.key(), "FATAL artefact excluded");
                }
                !a.is_fatal()
            })
            .collect();
        for phase in ArtefactPhase::FORWARD {
            for synchronizer in self.registry.iter() {
                let keys = keys_of(live.iter().copied(), synchronizer);
                if keys.is_empty() {
                    continue;
                }
                let outcome = synchronizer.run_phase(&keys, phase, &self.depleter, callback)?;
                report.record(phase, outcome);
            }
        }
        Ok(())
    }

    fn settle_definitions(&self, present: &HashSet<String>) -> Result<(), ReconcileError> {
        let mut universe = Vec::new();
        for synchronizer in self.registry.iter() {
            universe.extend(synchronizer.retrieve()?);
        }
        let mut by_location: HashMap<&str, Vec<&Artefact>> = HashMap::new();
        for artefact in &universe {
            by_location
                .entry(artefact.location())
                .or_default()
                .push(artefact);
        }
        for location in present {
            let artefacts = by_location.get(location.as_str()).map_or(&[][..], Vec::as_slice);
            self.definitions.settle(location, artefacts);
        }
        for removed in self.definitions.retain_locations(present) {
            debug!(location = %removed, "definition removed");
        }
        Ok(())
    }
}

fn keys_of<'a>(
    artefacts: impl Iterator<Item = &'a Artefact>,
    synchronizer: &dyn DynSynchronizer,
) -> Vec<ArtefactKey> {
    artefacts
        .filter(|a| synchronizer.is_accepted_type(a.artefact_type()))
        .map(|a| a.key().clone())
        .collect()
}
