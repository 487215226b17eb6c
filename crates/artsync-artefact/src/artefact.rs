//! Artefact identity record and typed-artefact trait
//!
//! Defines [`Artefact`], the common record every artefact type carries, its
//! derived [`ArtefactKey`], and the [`Artefactual`] trait typed artefacts
//! implement so the engine can reach the common record.

use crate::checksum::Checksum;
use crate::error::ArtefactError;
use crate::lifecycle::{ArtefactLifecycle, ArtefactState};
use crate::state_machine::{validate_outcome, validate_transition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt::{self, Debug, Display};

/// Globally unique artefact key: `type:location:name`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtefactKey(String);

impl ArtefactKey {
    /// Derive the key from its three components
    #[inline]
    #[must_use]
    pub fn derive(artefact_type: &str, location: &str, name: &str) -> Self {
        Self(format!("{artefact_type}:{location}:{name}"))
    }

    /// Wrap a key as written in a dependency list
    #[inline]
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ArtefactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ArtefactKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ArtefactKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ArtefactKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Audit fields, maintained by the persistence collaborator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditInfo {
    pub created_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AuditInfo {
    /// Stamp a write; the first stamp also sets the creation fields
    pub fn touch(&mut self, user: &str, at: DateTime<Utc>) {
        if self.created_at.is_none() {
            self.created_by = Some(user.to_string());
            self.created_at = Some(at);
        }
        self.updated_by = Some(user.to_string());
        self.updated_at = Some(at);
    }
}

/// Declarative, identity-bearing artefact record
///
/// # Invariants
/// - `key` is always `ArtefactKey::derive(type, location, name)`; every
///   setter of the three components recomputes it, and deserialization
///   derives it again instead of trusting the stored value
/// - a successful `state` is never recorded while `lifecycle` is NEW/MODIFIED
/// - `ever_created` is set on reaching CREATED/UPDATED and cleared on DELETED
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawArtefact")]
pub struct Artefact {
    id: Option<u64>,
    location: String,
    name: String,
    #[serde(rename = "type")]
    artefact_type: String,
    key: ArtefactKey,
    dependencies: Vec<ArtefactKey>,
    lifecycle: ArtefactLifecycle,
    state: ArtefactState,
    message: Option<String>,
    /// The side effect has been put in place and not torn down since
    ever_created: bool,
    checksum: Option<Checksum>,
    audit: AuditInfo,
}

impl Artefact {
    /// Create a freshly declared artefact (`NEW`, `INITIAL`)
    ///
    /// # Errors
    /// Returns error if any key component is empty
    pub fn new(
        artefact_type: impl Into<String>,
        location: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, ArtefactError> {
        let artefact_type = non_empty(artefact_type.into(), "type")?;
        let location = non_empty(location.into(), "location")?;
        let name = non_empty(name.into(), "name")?;
        let key = ArtefactKey::derive(&artefact_type, &location, &name);
        Ok(Self {
            id: None,
            location,
            name,
            artefact_type,
            key,
            dependencies: Vec::new(),
            lifecycle: ArtefactLifecycle::New,
            state: ArtefactState::Initial,
            message: None,
            ever_created: false,
            checksum: None,
            audit: AuditInfo::default(),
        })
    }

    /// Builder: set the dependency list
    #[must_use]
    pub fn with_dependencies<I, K>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<ArtefactKey>,
    {
        self.set_dependencies(dependencies);
        self
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn artefact_type(&self) -> &str {
        &self.artefact_type
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> &ArtefactKey {
        &self.key
    }

    #[inline]
    #[must_use]
    pub fn dependencies(&self) -> &[ArtefactKey] {
        &self.dependencies
    }

    #[inline]
    #[must_use]
    pub fn lifecycle(&self) -> ArtefactLifecycle {
        self.lifecycle
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> ArtefactState {
        self.state
    }

    /// Message recorded with the last outcome (error text on failure)
    #[inline]
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn checksum(&self) -> Option<Checksum> {
        self.checksum
    }

    #[inline]
    #[must_use]
    pub fn audit(&self) -> &AuditInfo {
        &self.audit
    }

    #[inline]
    pub fn audit_mut(&mut self) -> &mut AuditInfo {
        &mut self.audit
    }

    /// Whether the side effect is in place, whatever the current outcome
    #[inline]
    #[must_use]
    pub fn ever_created(&self) -> bool {
        self.ever_created
    }

    /// Excluded from automatic retries
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.state.is_fatal()
    }

    /// Numeric identity assigned by the persistence collaborator
    #[inline]
    pub fn set_id(&mut self, id: Option<u64>) {
        self.id = id;
    }

    /// # Errors
    /// Returns error if `location` is empty
    pub fn set_location(&mut self, location: impl Into<String>) -> Result<(), ArtefactError> {
        self.location = non_empty(location.into(), "location")?;
        self.update_key();
        Ok(())
    }

    /// # Errors
    /// Returns error if `name` is empty
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), ArtefactError> {
        self.name = non_empty(name.into(), "name")?;
        self.update_key();
        Ok(())
    }

    /// # Errors
    /// Returns error if `artefact_type` is empty
    pub fn set_artefact_type(
        &mut self,
        artefact_type: impl Into<String>,
    ) -> Result<(), ArtefactError> {
        self.artefact_type = non_empty(artefact_type.into(), "type")?;
        self.update_key();
        Ok(())
    }

    pub fn set_dependencies<I, K>(&mut self, dependencies: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<ArtefactKey>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
    }

    #[inline]
    pub fn set_checksum(&mut self, checksum: Option<Checksum>) {
        self.checksum = checksum;
    }

    /// Record a new `(lifecycle, state)` pair
    ///
    /// # Errors
    /// Returns error (leaving the artefact untouched) if the lifecycle change
    /// is illegal or the pair violates the outcome rules
    pub fn transition(
        &mut self,
        lifecycle: ArtefactLifecycle,
        state: ArtefactState,
        message: Option<String>,
    ) -> Result<(), ArtefactError> {
        validate_transition(self.lifecycle, lifecycle)?;
        validate_outcome(lifecycle, state)?;
        match lifecycle {
            ArtefactLifecycle::Created | ArtefactLifecycle::Updated => self.ever_created = true,
            ArtefactLifecycle::Deleted => self.ever_created = false,
            _ => {}
        }
        self.lifecycle = lifecycle;
        self.state = state;
        self.message = message;
        Ok(())
    }

    /// Copy the persisted bookkeeping of an earlier record with the same key
    ///
    /// Identity, lifecycle, state, message and audit survive re-declaration.
    pub fn adopt_identity(&mut self, existing: &Artefact) {
        self.id = existing.id;
        self.lifecycle = existing.lifecycle;
        self.state = existing.state;
        self.message.clone_from(&existing.message);
        self.ever_created = existing.ever_created;
        self.audit = existing.audit.clone();
    }

    /// Copy lifecycle, state and message from another copy of this artefact
    ///
    /// Used by stores to mirror a status already validated by [`Self::transition`].
    pub fn sync_status_from(&mut self, other: &Artefact) {
        self.lifecycle = other.lifecycle;
        self.state = other.state;
        self.message.clone_from(&other.message);
        self.ever_created = other.ever_created;
    }

    /// Lifecycle an operator retry or a changed declaration reopens to
    ///
    /// Artefacts whose side effect is not in place go back to NEW, others to
    /// MODIFIED. The current state is not consulted: START overwrites a
    /// FAILED_CREATE with FATAL.
    #[must_use]
    pub fn reopened_lifecycle(&self) -> ArtefactLifecycle {
        match self.lifecycle {
            ArtefactLifecycle::New | ArtefactLifecycle::Deleted => ArtefactLifecycle::New,
            _ if !self.ever_created => ArtefactLifecycle::New,
            _ => ArtefactLifecycle::Modified,
        }
    }

    fn update_key(&mut self) {
        self.key = ArtefactKey::derive(&self.artefact_type, &self.location, &self.name);
    }
}

fn non_empty(value: String, part: &'static str) -> Result<String, ArtefactError> {
    if value.is_empty() {
        Err(ArtefactError::EmptyKeyPart(part))
    } else {
        Ok(value)
    }
}

/// Stored shape of [`Artefact`]; any stored `key` is ignored and re-derived
#[derive(Deserialize)]
struct RawArtefact {
    id: Option<u64>,
    location: String,
    name: String,
    #[serde(rename = "type")]
    artefact_type: String,
    #[serde(default)]
    dependencies: Vec<ArtefactKey>,
    lifecycle: ArtefactLifecycle,
    state: ArtefactState,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    ever_created: bool,
    #[serde(default)]
    checksum: Option<Checksum>,
    #[serde(default)]
    audit: AuditInfo,
}

impl TryFrom<RawArtefact> for Artefact {
    type Error = ArtefactError;

    fn try_from(raw: RawArtefact) -> Result<Self, Self::Error> {
        validate_outcome(raw.lifecycle, raw.state)?;
        let mut artefact = Artefact::new(raw.artefact_type, raw.location, raw.name)?;
        artefact.id = raw.id;
        artefact.dependencies = raw.dependencies;
        artefact.lifecycle = raw.lifecycle;
        artefact.state = raw.state;
        artefact.message = raw.message;
        artefact.ever_created = raw.ever_created
            || matches!(raw.lifecycle, ArtefactLifecycle::Created | ArtefactLifecycle::Updated);
        artefact.checksum = raw.checksum;
        artefact.audit = raw.audit;
        Ok(artefact)
    }
}

/// Typed artefact carrying the common [`Artefact`] record
///
/// Implemented by every artefact type a synchronizer manages, so that the
/// topology and depletion machinery can work on any of them.
pub trait Artefactual: Clone + Debug + Send + Sync + 'static {
    /// Common record
    fn artefact(&self) -> &Artefact;

    /// Mutable common record
    fn artefact_mut(&mut self) -> &mut Artefact;

    /// Derived key of the common record
    #[inline]
    fn key(&self) -> &ArtefactKey {
        self.artefact().key()
    }
}

impl Artefactual for Artefact {
    fn artefact(&self) -> &Artefact {
        self
    }

    fn artefact_mut(&mut self) -> &mut Artefact {
        self
    }
}
