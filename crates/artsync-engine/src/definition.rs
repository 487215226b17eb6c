//! Declaration file tracking
//!
//! Each file is remembered by location with the checksum of its last parsed
//! content, so unchanged files are not re-parsed on every pass.

use artsync_artefact::{Artefact, ArtefactLifecycle, Checksum};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

/// Processing state of a declaration file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DefinitionState {
    New,
    Modified,
    /// Every artefact it declares is settled
    Processed,
    /// Did not parse, or one of its artefacts failed
    Failed,
}

impl fmt::Display for DefinitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::New => "NEW",
            Self::Modified => "MODIFIED",
            Self::Processed => "PROCESSED",
            Self::Failed => "FAILED",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Definition {
    pub location: String,
    pub checksum: Checksum,
    pub state: DefinitionState,
    /// Parse error of the current content, if any
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// What a pass should do with a collected file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionDecision {
    /// Parse it
    Process,
    /// Unchanged since it was last processed
    Skip,
    /// Unchanged and known to be broken
    SkipFailed,
}

/// Definitions of one tenant, keyed by location
#[derive(Debug, Default)]
pub struct DefinitionStore {
    definitions: RwLock<IndexMap<String, Definition>>,
}

impl DefinitionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `checksum` for `location` and decide whether to parse it
    pub fn observe(&self, location: &str, checksum: Checksum) -> DefinitionDecision {
        let mut definitions = self.definitions.write();
        let now = Utc::now();
        match definitions.get_mut(location) {
            None => {
                definitions.insert(
                    location.to_string(),
                    Definition {
                        location: location.to_string(),
                        checksum,
                        state: DefinitionState::New,
                        message: None,
                        updated_at: now,
                    },
                );
                debug!(location, "new definition");
                DefinitionDecision::Process
            }
            Some(definition) if definition.checksum != checksum => {
                definition.checksum = checksum;
                definition.state = DefinitionState::Modified;
                definition.message = None;
                definition.updated_at = now;
                debug!(location, %checksum, "definition modified");
                DefinitionDecision::Process
            }
            Some(definition) => match definition.state {
                DefinitionState::New | DefinitionState::Modified => DefinitionDecision::Process,
                DefinitionState::Processed => DefinitionDecision::Skip,
                DefinitionState::Failed => {
                    warn!(
                        location,
                        reason = definition.message.as_deref().unwrap_or("artefact failure"),
                        "definition unchanged since it failed"
                    );
                    DefinitionDecision::SkipFailed
                }
            },
        }
    }

    /// Mark a location whose content did not parse
    pub fn mark_parse_failed(&self, location: &str, message: impl Into<String>) {
        if let Some(definition) = self.definitions.write().get_mut(location) {
            definition.state = DefinitionState::Failed;
            definition.message = Some(message.into());
            definition.updated_at = Utc::now();
        }
    }

    /// Derive the state of a parsed location from its artefacts
    ///
    /// Locations whose current content did not parse keep `Failed`.
    pub fn settle(&self, location: &str, artefacts: &[&Artefact]) {
        let mut definitions = self.definitions.write();
        let Some(definition) = definitions.get_mut(location) else {
            return;
        };
        if definition.message.is_some() {
            return;
        }
        let next = if artefacts
            .iter()
            .any(|a| a.lifecycle() == ArtefactLifecycle::Failed || a.state().is_failure())
        {
            DefinitionState::Failed
        } else if artefacts.iter().all(|a| a.lifecycle().is_settled()) {
            DefinitionState::Processed
        } else {
            definition.state
        };
        if next != definition.state {
            debug!(location, from = %definition.state, to = %next, "definition settled");
            definition.state = next;
            definition.updated_at = Utc::now();
        }
    }

    /// Forget locations not collected this pass; returns the forgotten ones
    pub fn retain_locations(&self, present: &HashSet<String>) -> Vec<String> {
        let mut definitions = self.definitions.write();
        let removed: Vec<String> = definitions
            .keys()
            .filter(|location| !present.contains(*location))
            .cloned()
            .collect();
        definitions.retain(|location, _| present.contains(location));
        removed
    }

    #[must_use]
    pub fn get(&self, location: &str) -> Option<Definition> {
        self.definitions.read().get(location).cloned()
    }

    #[must_use]
    pub fn all(&self) -> Vec<Definition> {
        self.definitions.read().values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artsync_artefact::ArtefactState;

    fn sum(content: &str) -> Checksum {
        Checksum::compute(content.as_bytes())
    }

    #[test]
    fn new_then_unchanged_pending_is_processed_again() {
        let store = DefinitionStore::new();
        assert_eq!(store.observe("/a.table", sum("a")), DefinitionDecision::Process);
        assert_eq!(store.get("/a.table").unwrap().state, DefinitionState::New);
        assert_eq!(store.observe("/a.table", sum("a")), DefinitionDecision::Process);
    }

    #[test]
    fn changed_content_is_modified() {
        let store = DefinitionStore::new();
        store.observe("/a.table", sum("a"));
        store.mark_parse_failed("/a.table", "bad json");
        assert_eq!(store.observe("/a.table", sum("b")), DefinitionDecision::Process);
        let definition = store.get("/a.table").unwrap();
        assert_eq!(definition.state, DefinitionState::Modified);
        assert_eq!(definition.message, None);
    }

    #[test]
    fn unchanged_failed_is_skipped() {
        let store = DefinitionStore::new();
        store.observe("/a.table", sum("a"));
        store.mark_parse_failed("/a.table", "bad json");
        assert_eq!(store.observe("/a.table", sum("a")), DefinitionDecision::SkipFailed);
    }

    #[test]
    fn settle_follows_artefacts() {
        let store = DefinitionStore::new();
        store.observe("/a.table", sum("a"));

        let mut artefact = Artefact::new("table", "/a.table", "A").unwrap();
        store.settle("/a.table", &[&artefact]);
        assert_eq!(store.get("/a.table").unwrap().state, DefinitionState::New);

        artefact
            .transition(ArtefactLifecycle::Created, ArtefactState::SuccessfulCreate, None)
            .unwrap();
        store.settle("/a.table", &[&artefact]);
        assert_eq!(store.get("/a.table").unwrap().state, DefinitionState::Processed);
        assert_eq!(store.observe("/a.table", sum("a")), DefinitionDecision::Skip);

        artefact
            .transition(ArtefactLifecycle::Failed, ArtefactState::FailedCreateUpdate, None)
            .unwrap();
        store.settle("/a.table", &[&artefact]);
        assert_eq!(store.get("/a.table").unwrap().state, DefinitionState::Failed);
    }

    #[test]
    fn parse_failure_is_not_settled_away() {
        let store = DefinitionStore::new();
        store.observe("/a.table", sum("a"));
        store.mark_parse_failed("/a.table", "bad json");
        store.settle("/a.table", &[]);
        assert_eq!(store.get("/a.table").unwrap().state, DefinitionState::Failed);
    }

    #[test]
    fn retain_forgets_removed_files() {
        let store = DefinitionStore::new();
        store.observe("/a.table", sum("a"));
        store.observe("/b.table", sum("b"));
        let present: HashSet<String> = ["/a.table".to_string()].into_iter().collect();
        assert_eq!(store.retain_locations(&present), vec!["/b.table".to_string()]);
        assert_eq!(store.len(), 1);
    }
}
