//! Error types for synchronizers
//!
//! - [`ParseError`]: declaration content → artefacts (ingress)
//! - [`StoreError`]: persistence collaborator failures
//! - [`SynchronizerError`]: side effects driven by `complete` / `cleanup`

use artsync_artefact::{ArtefactError, ArtefactKey};

/// Errors while turning a declaration into artefacts
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Content is not valid for the declaration format
    #[error("malformed declaration {location}: {message}")]
    Malformed { location: String, message: String },

    /// Content parsed but describes an invalid artefact
    #[error("invalid declaration {location}: {message}")]
    Invalid { location: String, message: String },

    /// No synchronizer accepts the location
    #[error("no synchronizer accepts '{0}'")]
    NoSynchronizer(String),

    /// More than one synchronizer accepts the location
    #[error("location '{location}' accepted by several synchronizers: {types:?}")]
    Ambiguous {
        location: String,
        types: Vec<&'static str>,
    },

    /// Persistence failed while saving parsed artefacts
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ParseError {
    pub fn malformed(location: impl Into<String>, message: impl ToString) -> Self {
        Self::Malformed {
            location: location.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid(location: impl Into<String>, message: impl ToString) -> Self {
        Self::Invalid {
            location: location.into(),
            message: message.to_string(),
        }
    }

    /// Not caused by the declaration itself; the pass cannot continue
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// Errors raised by an [`ArtefactStore`](crate::ArtefactStore)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("artefact not found: {0}")]
    NotFound(ArtefactKey),

    /// Another record already holds the numeric identity
    #[error("identity {id} already used by {existing}")]
    DuplicateIdentity { id: u64, existing: ArtefactKey },

    /// Backing store cannot be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the side effects of a synchronizer
#[derive(Debug, thiserror::Error)]
pub enum SynchronizerError {
    /// Runtime side effect failed; worth retrying on a later pass
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Artefact content cannot be acted upon until it is re-declared
    #[error("invalid artefact: {0}")]
    Invalid(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("artefact error: {0}")]
    Artefact(#[from] ArtefactError),
}

impl SynchronizerError {
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    /// Retryable errors keep the artefact's lifecycle so the next pass
    /// attempts the phase again; others flip it to FAILED
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Runtime(_) | Self::Store(_) => true,
            Self::Invalid(_) | Self::Artefact(_) => false,
        }
    }
}
