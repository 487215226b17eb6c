//! Persistence collaborator for artefact records

use crate::error::StoreError;
use artsync_artefact::{Artefact, ArtefactKey, Artefactual};
use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Name stamped into audit fields by the engine's own writes
pub const SYSTEM_USER: &str = "artsync";

/// Insert-or-update persistence keyed by [`ArtefactKey`]
///
/// Each state update is a single write; the engine never groups several
/// artefacts into one transaction.
pub trait ArtefactStore<T: Artefactual>: Send + Sync {
    fn find_by_key(&self, key: &ArtefactKey) -> Result<Option<T>, StoreError>;

    fn find_by_location(&self, location: &str) -> Result<Vec<T>, StoreError>;

    fn get_all(&self) -> Result<Vec<T>, StoreError>;

    /// Insert or replace by key, assigning an identity to new records
    fn save(&self, artefact: T) -> Result<T, StoreError>;

    fn delete(&self, key: &ArtefactKey) -> Result<(), StoreError>;

    /// Persist only lifecycle, state and message of `artefact`
    fn update_status(&self, artefact: &Artefact) -> Result<(), StoreError>;
}

/// Status-only view of a store, handed to the pass callback
pub trait StatusSink: Send + Sync {
    fn update_status(&self, artefact: &Artefact) -> Result<(), StoreError>;
}

/// [`StatusSink`] over a typed store
pub struct StoreSink<'a, T: Artefactual>(&'a dyn ArtefactStore<T>);

impl<'a, T: Artefactual> StoreSink<'a, T> {
    #[inline]
    #[must_use]
    pub fn new(store: &'a dyn ArtefactStore<T>) -> Self {
        Self(store)
    }
}

impl<T: Artefactual> StatusSink for StoreSink<'_, T> {
    fn update_status(&self, artefact: &Artefact) -> Result<(), StoreError> {
        self.0.update_status(artefact)
    }
}

/// In-process store, insertion ordered
pub struct InMemoryArtefactStore<T: Artefactual> {
    records: RwLock<IndexMap<ArtefactKey, T>>,
    next_id: AtomicU64,
    available: AtomicBool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Artefactual> Default for InMemoryArtefactStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Artefactual> fmt::Debug for InMemoryArtefactStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryArtefactStore")
            .field("records", &self.records.read().len())
            .field("available", &self.available.load(Ordering::Relaxed))
            .finish()
    }
}

impl<T: Artefactual> InMemoryArtefactStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(IndexMap::new()),
            next_id: AtomicU64::new(1),
            available: AtomicBool::new(true),
            _marker: PhantomData,
        }
    }

    /// Simulate an outage: every call fails with [`StoreError::Unavailable`]
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store switched off".into()))
        }
    }
}

impl<T: Artefactual> ArtefactStore<T> for InMemoryArtefactStore<T> {
    fn find_by_key(&self, key: &ArtefactKey) -> Result<Option<T>, StoreError> {
        self.check()?;
        Ok(self.records.read().get(key).cloned())
    }

    fn find_by_location(&self, location: &str) -> Result<Vec<T>, StoreError> {
        self.check()?;
        Ok(self
            .records
            .read()
            .values()
            .filter(|a| a.artefact().location() == location)
            .cloned()
            .collect())
    }

    fn get_all(&self) -> Result<Vec<T>, StoreError> {
        self.check()?;
        Ok(self.records.read().values().cloned().collect())
    }

    fn save(&self, mut artefact: T) -> Result<T, StoreError> {
        self.check()?;
        let mut records = self.records.write();
        let key = artefact.key().clone();

        match artefact.artefact().id() {
            Some(id) => {
                let clash = records
                    .iter()
                    .find(|(k, a)| **k != key && a.artefact().id() == Some(id));
                if let Some((existing, _)) = clash {
                    return Err(StoreError::DuplicateIdentity {
                        id,
                        existing: existing.clone(),
                    });
                }
            }
            None => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                artefact.artefact_mut().set_id(Some(id));
            }
        }

        artefact.artefact_mut().audit_mut().touch(SYSTEM_USER, Utc::now());
        records.insert(key, artefact.clone());
        Ok(artefact)
    }

    fn delete(&self, key: &ArtefactKey) -> Result<(), StoreError> {
        self.check()?;
        self.records
            .write()
            .shift_remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    fn update_status(&self, artefact: &Artefact) -> Result<(), StoreError> {
        self.check()?;
        let mut records = self.records.write();
        let stored = records
            .get_mut(artefact.key())
            .ok_or_else(|| StoreError::NotFound(artefact.key().clone()))?;
        let record = stored.artefact_mut();
        record.sync_status_from(artefact);
        record.audit_mut().touch(SYSTEM_USER, Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artsync_artefact::{ArtefactLifecycle, ArtefactState};
    use pretty_assertions::assert_eq;

    fn artefact(name: &str) -> Artefact {
        Artefact::new("t", "/a.t", name).unwrap()
    }

    #[test]
    fn save_assigns_identity_once() {
        let store = InMemoryArtefactStore::new();
        let saved = store.save(artefact("x")).unwrap();
        assert_eq!(saved.id(), Some(1));
        let again = store.save(saved.clone()).unwrap();
        assert_eq!(again.id(), Some(1));
        assert_eq!(store.len(), 1);
        assert!(again.audit().created_at.is_some());
    }

    #[test]
    fn duplicate_identity_rejected() {
        let store = InMemoryArtefactStore::new();
        store.save(artefact("x")).unwrap();
        let mut other = artefact("y");
        other.set_id(Some(1));
        assert!(matches!(
            store.save(other),
            Err(StoreError::DuplicateIdentity { id: 1, .. })
        ));
    }

    #[test]
    fn update_status_mirrors_pair() {
        let store = InMemoryArtefactStore::new();
        let mut saved = store.save(artefact("x")).unwrap();
        saved
            .transition(ArtefactLifecycle::Created, ArtefactState::SuccessfulCreate, None)
            .unwrap();
        store.update_status(&saved).unwrap();
        let stored = store.find_by_key(saved.key()).unwrap().unwrap();
        assert_eq!(stored.lifecycle(), ArtefactLifecycle::Created);
        assert_eq!(stored.state(), ArtefactState::SuccessfulCreate);
    }

    #[test]
    fn unavailable_store_fails_every_call() {
        let store: InMemoryArtefactStore<Artefact> = InMemoryArtefactStore::new();
        store.set_available(false);
        assert!(matches!(store.get_all(), Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn find_by_location_and_delete() {
        let store = InMemoryArtefactStore::new();
        store.save(artefact("x")).unwrap();
        store.save(artefact("y")).unwrap();
        assert_eq!(store.find_by_location("/a.t").unwrap().len(), 2);
        store.delete(&ArtefactKey::new("t:/a.t:x")).unwrap();
        assert_eq!(
            store.delete(&ArtefactKey::new("t:/a.t:x")),
            Err(StoreError::NotFound(ArtefactKey::new("t:/a.t:x")))
        );
    }
}
