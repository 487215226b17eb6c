//! Outcome of one reconciliation pass

use artsync_artefact::{ArtefactKey, ArtefactPhase};
use artsync_synchronizer::PhaseOutcome;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use ulid::Ulid;

/// Summary of a pass, surfaced to operators
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub pass_id: Ulid,
    pub tenant: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Artefacts parsed from new or changed declarations
    pub parsed: usize,
    /// Completed keys per phase, across types
    pub completed: IndexMap<ArtefactPhase, Vec<ArtefactKey>>,
    /// Failed or unresolved keys per phase
    pub residual: IndexMap<ArtefactPhase, Vec<ArtefactKey>>,
    /// Records removed after a successful DELETE
    pub deleted: Vec<ArtefactKey>,
    pub cycles: Vec<Vec<ArtefactKey>>,
    /// Every error of the pass, in the order recorded
    pub errors: Vec<String>,
}

impl PassReport {
    #[must_use]
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            pass_id: Ulid::new(),
            tenant: tenant.into(),
            started_at: Utc::now(),
            finished_at: None,
            parsed: 0,
            completed: IndexMap::new(),
            residual: IndexMap::new(),
            deleted: Vec::new(),
            cycles: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Merge the outcome of one `(type, phase)` depletion
    pub fn record(&mut self, phase: ArtefactPhase, outcome: PhaseOutcome) {
        let PhaseOutcome {
            completed,
            failed,
            unresolved,
        } = outcome;
        if !completed.is_empty() {
            self.completed.entry(phase).or_default().extend(completed);
        }
        if !failed.is_empty() || !unresolved.is_empty() {
            let residual = self.residual.entry(phase).or_default();
            residual.extend(failed);
            residual.extend(unresolved);
        }
    }

    pub fn finish(&mut self, errors: Vec<String>) {
        self.errors = errors;
        self.finished_at = Some(Utc::now());
    }

    #[must_use]
    pub fn completed_in(&self, phase: ArtefactPhase) -> &[ArtefactKey] {
        self.completed.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    #[must_use]
    pub fn residual_in(&self, phase: ArtefactPhase) -> &[ArtefactKey] {
        self.residual.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pass {} (tenant {})", self.pass_id, self.tenant)?;
        writeln!(f, "  parsed:  {}", self.parsed)?;
        for phase in ArtefactPhase::FORWARD.iter().chain(ArtefactPhase::TEARDOWN.iter()) {
            let completed = self.completed_in(*phase).len();
            let residual = self.residual_in(*phase).len();
            if completed + residual > 0 {
                writeln!(
                    f,
                    "  {:<7} {completed} completed, {residual} residual",
                    phase.as_str()
                )?;
            }
        }
        writeln!(f, "  deleted: {}", self.deleted.len())?;
        if self.errors.is_empty() {
            write!(f, "  no errors")
        } else {
            write!(f, "  errors ({}):", self.errors.len())?;
            for error in &self.errors {
                write!(f, "\n    - {error}")?;
            }
            Ok(())
        }
    }
}
