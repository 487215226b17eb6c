//! Dependency pre-sort across a whole pass

use crate::wrapper::TopologyWrapper;
use artsync_artefact::{ArtefactKey, Artefactual};
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;
use tracing::warn;

/// Orders a batch so that dependencies precede their dependents
///
/// Cyclic batches keep their input order; the cycles are reported so the
/// caller can surface them, and depletion leaves the members residual.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopologicalSorter;

impl TopologicalSorter {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn sort<A: Artefactual>(&self, wrappers: Vec<TopologyWrapper<A>>) -> SortedBatch<A> {
        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
        for index in 0..wrappers.len() {
            graph.add_node(index);
        }
        for (index, wrapper) in wrappers.iter().enumerate() {
            for dependency in wrapper.dependencies() {
                if let Some(from) = wrappers.iter().position(|w| w.key() == dependency) {
                    graph.add_edge(from, index, ());
                }
            }
        }

        match toposort(&graph, None) {
            Ok(order) => {
                let mut slots: Vec<Option<TopologyWrapper<A>>> =
                    wrappers.into_iter().map(Some).collect();
                let wrappers = order
                    .into_iter()
                    .filter_map(|index| slots.get_mut(index).and_then(Option::take))
                    .collect();
                SortedBatch {
                    wrappers,
                    cycles: Vec::new(),
                }
            }
            Err(_) => {
                let cycles: Vec<Vec<ArtefactKey>> = tarjan_scc(&graph)
                    .into_iter()
                    .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
                    .map(|mut scc| {
                        scc.sort_unstable();
                        scc.into_iter().map(|i| wrappers[i].key().clone()).collect()
                    })
                    .collect();
                for cycle in &cycles {
                    let keys: Vec<&str> = cycle.iter().map(ArtefactKey::as_str).collect();
                    warn!(keys = ?keys, "dependency cycle detected");
                }
                SortedBatch { wrappers, cycles }
            }
        }
    }
}

/// Result of [`TopologicalSorter::sort`]
#[derive(Debug)]
pub struct SortedBatch<A: Artefactual> {
    wrappers: Vec<TopologyWrapper<A>>,
    cycles: Vec<Vec<ArtefactKey>>,
}

impl<A: Artefactual> SortedBatch<A> {
    #[inline]
    #[must_use]
    pub fn wrappers(&self) -> &[TopologyWrapper<A>] {
        &self.wrappers
    }

    /// Keys of each dependency cycle, empty for an acyclic batch
    #[inline]
    #[must_use]
    pub fn cycles(&self) -> &[Vec<ArtefactKey>] {
        &self.cycles
    }

    #[inline]
    #[must_use]
    pub fn is_acyclic(&self) -> bool {
        self.cycles.is_empty()
    }

    /// Keys in sorted order
    #[must_use]
    pub fn keys(&self) -> Vec<ArtefactKey> {
        self.wrappers.iter().map(|w| w.key().clone()).collect()
    }

    #[must_use]
    pub fn into_wrappers(self) -> Vec<TopologyWrapper<A>> {
        self.wrappers
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
            .with_dependencies(deps.iter().map(|d| ArtefactKey::new(format!("t:/l:{d}"))))
    }

    fn position(keys: &[ArtefactKey], name: &str) -> usize {
        let wanted = format!("t:/l:{name}");
        keys.iter().position(|k| k.as_str() == wanted).unwrap()
    }

    #[test]
    fn dependencies_come_first() {
        let batch = TopologyWrapper::wrap_all([
            artefact("C", &["B"]),
            artefact("B", &["A"]),
            artefact("A", &[]),
            artefact("D", &[]),
        ]);
        let sorted = TopologicalSorter::new().sort(batch);
        assert!(sorted.is_acyclic());
        let keys = sorted.keys();
        assert_eq!(keys.len(), 4);
        assert!(position(&keys, "A") < position(&keys, "B"));
        assert!(position(&keys, "B") < position(&keys, "C"));
    }

    #[test]
    fn cycle_keeps_input_order_and_is_reported() {
        let batch = TopologyWrapper::wrap_all([
            artefact("X", &[]),
            artefact("A", &["B"]),
            artefact("B", &["A"]),
        ]);
        let sorted = TopologicalSorter::new().sort(batch);
        assert_eq!(
            sorted.cycles(),
            &[vec![ArtefactKey::new("t:/l:A"), ArtefactKey::new("t:/l:B")]]
        );
        let names: Vec<_> = sorted
            .wrappers()
            .iter()
            .map(|w| w.artefact().name().to_string())
            .collect();
        assert_eq!(names, vec!["X", "A", "B"]);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let batch = TopologyWrapper::wrap_all([artefact("A", &["A"])]);
        let sorted = TopologicalSorter::new().sort(batch);
        assert_eq!(sorted.cycles().len(), 1);
    }
}
