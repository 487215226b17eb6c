//! Engine error types

use artsync_artefact::ArtefactKey;
use artsync_synchronizer::{ParseError, StoreError, SynchronizerError};
use std::io;
use std::path::PathBuf;

/// Pass-level failures
///
/// Artefact-level problems never surface here; they are recorded in the
/// pass report. Only conditions that leave nothing to record into do.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("a reconciliation pass is already running for tenant {0}")]
    PassInProgress(String),

    #[error("artefact store failure: {0}")]
    Store(#[from] StoreError),

    #[error("definition source failure: {0}")]
    Source(#[from] io::Error),

    #[error("unknown tenant: {0}")]
    UnknownTenant(String),

    #[error("unknown artefact: {0}")]
    UnknownArtefact(ArtefactKey),

    #[error(transparent)]
    Synchronizer(#[from] SynchronizerError),
}

impl ReconcileError {
    /// Whether the next scheduled pass may succeed without intervention
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::PassInProgress(_) | Self::Store(_) | Self::Source(_) => true,
            Self::Synchronizer(err) => err.is_retryable(),
            Self::UnknownTenant(_) | Self::UnknownArtefact(_) => false,
        }
    }
}

impl From<ParseError> for ReconcileError {
    /// Only structural parse errors reach the pass level, and the store is
    /// the one collaborator a parse can fail on structurally.
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Store(store) => Self::Store(store),
            other => Self::Store(StoreError::Unavailable(other.to_string())),
        }
    }
}

/// Configuration loading and validation failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
