//! Lifecycle, outcome and phase enumerations
//!
//! Two orthogonal axes describe an artefact:
//! - [`ArtefactLifecycle`]: the transition being driven (intent)
//! - [`ArtefactState`]: the recorded outcome of the last attempt
//!
//! [`ArtefactPhase`] names the step a reconciliation pass drives.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Phase intent of an artefact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtefactLifecycle {
    /// Declared for the first time, not yet created
    New,
    /// Re-declared with different content, not yet updated
    Modified,
    /// Side effect created
    Created,
    /// Side effect rebuilt after modification
    Updated,
    /// Side effect torn down
    Deleted,
    /// Dead end until re-declared or retried
    Failed,
}

impl ArtefactLifecycle {
    /// All lifecycle values
    pub const ALL: [Self; 6] = [
        Self::New,
        Self::Modified,
        Self::Created,
        Self::Updated,
        Self::Deleted,
        Self::Failed,
    ];

    /// Lifecycle still waits for its create/update side effect
    #[inline]
    #[must_use]
    pub fn is_pending(self) -> bool {
        matches!(self, Self::New | Self::Modified)
    }

    /// Side effect is in place (created or updated)
    #[inline]
    #[must_use]
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Created | Self::Updated)
    }

    /// Upper-case name as persisted
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Modified => "MODIFIED",
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Deleted => "DELETED",
            Self::Failed => "FAILED",
        }
    }
}

/// Outcome of the last attempt on an artefact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtefactState {
    /// Never attempted
    Initial,
    /// Attempt underway
    ///
    /// Accepted from stored records but never recorded by a pass: a phase
    /// runs its side effect and registers the outcome in one synchronous
    /// step, so there is no observable in-between state.
    InProgress,
    SuccessfulCreate,
    SuccessfulUpdate,
    SuccessfulCreateUpdate,
    SuccessfulDelete,
    FailedCreate,
    FailedUpdate,
    FailedCreateUpdate,
    FailedDelete,
    /// Excluded from automatic retry until cleared
    Fatal,
    Unknown,
}

impl ArtefactState {
    /// All state values
    pub const ALL: [Self; 12] = [
        Self::Initial,
        Self::InProgress,
        Self::SuccessfulCreate,
        Self::SuccessfulUpdate,
        Self::SuccessfulCreateUpdate,
        Self::SuccessfulDelete,
        Self::FailedCreate,
        Self::FailedUpdate,
        Self::FailedCreateUpdate,
        Self::FailedDelete,
        Self::Fatal,
        Self::Unknown,
    ];

    #[inline]
    #[must_use]
    pub fn is_successful(self) -> bool {
        matches!(
            self,
            Self::SuccessfulCreate
                | Self::SuccessfulUpdate
                | Self::SuccessfulCreateUpdate
                | Self::SuccessfulDelete
        )
    }

    /// Any failure outcome, FATAL included
    #[inline]
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::FailedCreate
                | Self::FailedUpdate
                | Self::FailedCreateUpdate
                | Self::FailedDelete
                | Self::Fatal
        )
    }

    #[inline]
    #[must_use]
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Fatal)
    }

    /// Upper-case name as persisted
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "INITIAL",
            Self::InProgress => "IN_PROGRESS",
            Self::SuccessfulCreate => "SUCCESSFUL_CREATE",
            Self::SuccessfulUpdate => "SUCCESSFUL_UPDATE",
            Self::SuccessfulCreateUpdate => "SUCCESSFUL_CREATE_UPDATE",
            Self::SuccessfulDelete => "SUCCESSFUL_DELETE",
            Self::FailedCreate => "FAILED_CREATE",
            Self::FailedUpdate => "FAILED_UPDATE",
            Self::FailedCreateUpdate => "FAILED_CREATE_UPDATE",
            Self::FailedDelete => "FAILED_DELETE",
            Self::Fatal => "FATAL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Step driven by a reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtefactPhase {
    Create,
    Update,
    Delete,
    Start,
    Stop,
}

impl ArtefactPhase {
    /// Phases run for artefacts whose declaration is present, in order
    pub const FORWARD: [Self; 3] = [Self::Create, Self::Update, Self::Start];

    /// Phases run for artefacts whose declaration disappeared, in order
    pub const TEARDOWN: [Self; 2] = [Self::Stop, Self::Delete];

    /// Teardown phases walk dependents before their dependencies
    #[inline]
    #[must_use]
    pub fn is_teardown(self) -> bool {
        matches!(self, Self::Delete | Self::Stop)
    }

    /// Outcome recorded when the phase succeeds
    #[must_use]
    pub fn success_state(self) -> ArtefactState {
        match self {
            Self::Create => ArtefactState::SuccessfulCreate,
            Self::Update => ArtefactState::SuccessfulUpdate,
            Self::Delete => ArtefactState::SuccessfulDelete,
            Self::Start | Self::Stop => ArtefactState::SuccessfulCreateUpdate,
        }
    }

    /// Outcome recorded when the phase fails
    #[must_use]
    pub fn failure_state(self) -> ArtefactState {
        match self {
            Self::Create => ArtefactState::FailedCreate,
            Self::Update => ArtefactState::FailedUpdate,
            Self::Delete => ArtefactState::FailedDelete,
            Self::Start | Self::Stop => ArtefactState::FailedCreateUpdate,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Start => "START",
            Self::Stop => "STOP",
        }
    }
}

macro_rules! display_and_parse {
    ($ty:ty, $what:literal, $all:expr) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $all.into_iter()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s))
                    .ok_or_else(|| UnknownVariant {
                        kind: $what,
                        value: s.to_string(),
                    })
            }
        }
    };
}

display_and_parse!(ArtefactLifecycle, "lifecycle", ArtefactLifecycle::ALL);
display_and_parse!(ArtefactState, "state", ArtefactState::ALL);
display_and_parse!(
    ArtefactPhase,
    "phase",
    [
        ArtefactPhase::Create,
        ArtefactPhase::Update,
        ArtefactPhase::Delete,
        ArtefactPhase::Start,
        ArtefactPhase::Stop,
    ]
);

/// Unrecognised enumeration name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
