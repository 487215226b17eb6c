use crate::error::ArtefactError;
use crate::lifecycle::{ArtefactLifecycle, ArtefactState};

/// Validates a lifecycle transition.
///
/// Self transitions are always allowed: a synchronizer that finds nothing to
/// do for a phase still registers the pair it left the artefact in.
pub fn validate_transition(
    from: ArtefactLifecycle,
    to: ArtefactLifecycle,
) -> Result<(), ArtefactError> {
    if from == to || allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(ArtefactError::IllegalTransition { from, to })
    }
}

pub fn allowed_transitions(from: ArtefactLifecycle) -> Vec<ArtefactLifecycle> {
    use ArtefactLifecycle::*;
    match from {
        New => vec![Created, Failed, Deleted],
        Modified => vec![Updated, Failed, Deleted],
        Created | Updated => vec![Modified, Failed, Deleted],
        Failed => vec![New, Modified, Deleted],
        Deleted => vec![New],
    }
}

/// Validates that a `(lifecycle, state)` pair may be recorded together.
pub fn validate_outcome(
    lifecycle: ArtefactLifecycle,
    state: ArtefactState,
) -> Result<(), ArtefactError> {
    if state.is_successful() && lifecycle.is_pending() {
        return Err(ArtefactError::SuccessWhilePending { lifecycle, state });
    }
    if state.is_fatal() && lifecycle != ArtefactLifecycle::Failed {
        return Err(ArtefactError::FatalOutsideFailed(lifecycle));
    }
    Ok(())
}
