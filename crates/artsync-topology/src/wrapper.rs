//! Batch-scoped graph node around one artefact

use artsync_artefact::{ArtefactKey, Artefactual};
use std::collections::HashSet;

/// Wraps one artefact for dependency-ordered traversal
///
/// Dependency keys are split at wrap time into those that name another
/// wrapper of the same batch (`dependencies`) and those that do not
/// (`missing`). Missing keys never block the wrapper: they may have been
/// satisfied by an earlier pass or by another artefact type.
#[derive(Debug, Clone)]
pub struct TopologyWrapper<A: Artefactual> {
    artefact: A,
    dependencies: Vec<ArtefactKey>,
    missing: Vec<ArtefactKey>,
}

impl<A: Artefactual> TopologyWrapper<A> {
    /// Wrap an artefact, resolving its dependencies against `batch`
    #[must_use]
    pub fn new(artefact: A, batch: &HashSet<ArtefactKey>) -> Self {
        let (dependencies, missing) = artefact
            .artefact()
            .dependencies()
            .iter()
            .cloned()
            .partition(|key| batch.contains(key));
        Self {
            artefact,
            dependencies,
            missing,
        }
    }

    /// Wrap a whole batch, preserving its order
    #[must_use]
    pub fn wrap_all(artefacts: impl IntoIterator<Item = A>) -> Vec<Self> {
        let artefacts: Vec<A> = artefacts.into_iter().collect();
        let batch: HashSet<ArtefactKey> = artefacts.iter().map(|a| a.key().clone()).collect();
        artefacts
            .into_iter()
            .map(|artefact| Self::new(artefact, &batch))
            .collect()
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> &ArtefactKey {
        self.artefact.key()
    }

    #[inline]
    #[must_use]
    pub fn artefact(&self) -> &A {
        &self.artefact
    }

    #[inline]
    pub fn artefact_mut(&mut self) -> &mut A {
        &mut self.artefact
    }

    #[inline]
    #[must_use]
    pub fn into_inner(self) -> A {
        self.artefact
    }

    /// Dependencies that are members of the batch
    #[inline]
    #[must_use]
    pub fn dependencies(&self) -> &[ArtefactKey] {
        &self.dependencies
    }

    /// Declared dependencies absent from the batch
    #[inline]
    #[must_use]
    pub fn missing_dependencies(&self) -> &[ArtefactKey] {
        &self.missing
    }

    #[must_use]
    pub fn depends_on(&self, key: &ArtefactKey) -> bool {
        self.dependencies.contains(key)
    }

    /// No in-batch dependency is still pending
    #[must_use]
    pub fn is_ready(&self, pending: &HashSet<ArtefactKey>) -> bool {
        self.dependencies.iter().all(|key| !pending.contains(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artsync_artefact::Artefact;
    use pretty_assertions::assert_eq;

    fn artefact(name: &str, deps: &[&str]) -> Artefact {
        Artefact::new("t", "/l", name)
            .unwrap()
            .with_dependencies(deps.iter().copied())
    }

    #[test]
    fn splits_batch_and_missing_dependencies() {
        let wrappers = TopologyWrapper::wrap_all([
            artefact("a", &[]),
            artefact("b", &["t:/l:a", "t:/l:elsewhere"]),
        ]);
        assert_eq!(wrappers[1].dependencies(), &[ArtefactKey::new("t:/l:a")]);
        assert_eq!(
            wrappers[1].missing_dependencies(),
            &[ArtefactKey::new("t:/l:elsewhere")]
        );
    }

    #[test]
    fn ready_once_dependencies_leave_pending() {
        let wrappers = TopologyWrapper::wrap_all([artefact("a", &[]), artefact("b", &["t:/l:a"])]);
        let mut pending: HashSet<ArtefactKey> = wrappers.iter().map(|w| w.key().clone()).collect();
        assert!(!wrappers[1].is_ready(&pending));
        pending.remove(wrappers[0].key());
        assert!(wrappers[1].is_ready(&pending));
    }

    #[test]
    fn missing_dependency_never_blocks() {
        let wrappers = TopologyWrapper::wrap_all([artefact("b", &["t:/l:gone"])]);
        let pending: HashSet<ArtefactKey> = wrappers.iter().map(|w| w.key().clone()).collect();
        assert!(wrappers[0].is_ready(&pending));
    }
}
