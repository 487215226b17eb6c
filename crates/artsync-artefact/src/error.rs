//! Errors raised by the artefact data model

use crate::lifecycle::{ArtefactLifecycle, ArtefactState};

/// Errors related to artefact identity and state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArtefactError {
    /// Lifecycle change not permitted by the state machine
    #[error("illegal lifecycle transition: {from} -> {to}")]
    IllegalTransition {
        from: ArtefactLifecycle,
        to: ArtefactLifecycle,
    },

    /// Success recorded before the side effect ran
    #[error("state {state} cannot be recorded while lifecycle is {lifecycle}")]
    SuccessWhilePending {
        lifecycle: ArtefactLifecycle,
        state: ArtefactState,
    },

    /// FATAL outcome outside a FAILED lifecycle
    #[error("FATAL requires lifecycle FAILED, found {0}")]
    FatalOutsideFailed(ArtefactLifecycle),

    /// One of type, location or name is empty
    #[error("artefact {0} must not be empty")]
    EmptyKeyPart(&'static str),
}
