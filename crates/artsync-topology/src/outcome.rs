//! Result of one completion attempt

use crate::wrapper::TopologyWrapper;
use artsync_artefact::{ArtefactPhase, Artefactual};
use std::fmt;

/// What a completion attempt did to one wrapper
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Side effect in place (or already in place) for the phase
    Completed,
    /// Side effect attempted and failed; retried on a later pass
    Failed(String),
    /// Not attempted because the artefact refuses the phase (e.g. FATAL)
    Blocked(String),
}

impl CompletionOutcome {
    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Reason text for non-completed outcomes
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Completed => None,
            Self::Failed(reason) | Self::Blocked(reason) => Some(reason),
        }
    }
}

impl fmt::Display for CompletionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Blocked(reason) => write!(f, "blocked: {reason}"),
        }
    }
}

/// Performs the side effect of one wrapper for one phase
///
/// Any error must already be folded into [`CompletionOutcome::Failed`]; the
/// depleter never sees an error value.
pub trait Completer<A: Artefactual> {
    fn complete(&mut self, wrapper: &mut TopologyWrapper<A>, phase: ArtefactPhase)
        -> CompletionOutcome;
}

impl<A, F> Completer<A> for F
where
    A: Artefactual,
    F: FnMut(&mut TopologyWrapper<A>, ArtefactPhase) -> CompletionOutcome,
{
    fn complete(
        &mut self,
        wrapper: &mut TopologyWrapper<A>,
        phase: ArtefactPhase,
    ) -> CompletionOutcome {
        self(wrapper, phase)
    }
}
