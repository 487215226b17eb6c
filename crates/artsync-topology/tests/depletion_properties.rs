use artsync_artefact::{Artefact, ArtefactKey, ArtefactPhase};
use artsync_topology::{CompletionOutcome, TopologicalDepleter, TopologicalSorter, TopologyWrapper};
use proptest::prelude::*;
use std::collections::HashSet;

fn key(i: usize) -> String {
    format!("t:/batch:n{i}")
}

fn batch(size: usize, edges: &[(usize, usize)]) -> Vec<Artefact> {
    (0..size)
        .map(|i| {
            let deps = edges
                .iter()
                .filter(|(from, to)| *from == i && *to < size)
                .map(|(_, to)| ArtefactKey::new(key(*to)));
            Artefact::new("t", "/batch", format!("n{i}"))
                .unwrap()
                .with_dependencies(deps)
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_depletion_terminates_and_partitions_input(
        size in 0..25usize,
        edges in proptest::collection::vec((0..25usize, 0..25usize), 0..60),
        failing in proptest::collection::hash_set(0..25usize, 0..5),
    ) {
        let artefacts = batch(size, &edges);
        let wrappers = TopologyWrapper::wrap_all(artefacts);
        let depletion = TopologicalDepleter::new().deplete(
            wrappers,
            ArtefactPhase::Create,
            &mut |w: &mut TopologyWrapper<Artefact>, _: ArtefactPhase| {
                let index: usize = w.artefact().name()[1..].parse().unwrap();
                if failing.contains(&index) {
                    CompletionOutcome::Failed("injected".into())
                } else {
                    CompletionOutcome::Completed
                }
            },
        );

        prop_assert!(depletion.sweeps() <= size + 1);

        let mut seen = HashSet::new();
        for wrapper in depletion.completed().iter().chain(depletion.residual()) {
            prop_assert!(seen.insert(wrapper.key().clone()), "duplicate {}", wrapper.key());
        }
        let expected: HashSet<ArtefactKey> = (0..size).map(|i| ArtefactKey::new(key(i))).collect();
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn prop_acyclic_batch_completes_dependencies_first(
        size in 1..20usize,
        raw_edges in proptest::collection::vec((0..20usize, 0..20usize), 0..40),
    ) {
        // Only point at lower indices: acyclic by construction.
        let edges: Vec<(usize, usize)> = raw_edges
            .into_iter()
            .filter(|(from, to)| to < from)
            .collect();
        let mut artefacts = batch(size, &edges);
        artefacts.reverse();

        let mut calls: Vec<usize> = Vec::new();
        let depletion = TopologicalDepleter::new().deplete(
            TopologyWrapper::wrap_all(artefacts),
            ArtefactPhase::Create,
            &mut |w: &mut TopologyWrapper<Artefact>, _: ArtefactPhase| {
                calls.push(w.artefact().name()[1..].parse().unwrap());
                CompletionOutcome::Completed
            },
        );

        prop_assert!(depletion.is_complete());
        for (from, to) in edges.iter().filter(|(from, _)| *from < size) {
            let dependent = calls.iter().position(|c| c == from).unwrap();
            let dependency = calls.iter().position(|c| c == to).unwrap();
            prop_assert!(dependency < dependent);
        }
    }

    #[test]
    fn prop_sorter_preserves_members(
        size in 0..20usize,
        edges in proptest::collection::vec((0..20usize, 0..20usize), 0..40),
    ) {
        let sorted = TopologicalSorter::new().sort(TopologyWrapper::wrap_all(batch(size, &edges)));
        let keys: HashSet<ArtefactKey> = sorted.keys().into_iter().collect();
        prop_assert_eq!(keys.len(), size);
    }
}

#[test]
fn one_failure_leaves_independent_artefacts_completed() {
    let artefacts = batch(6, &[]);
    let mut errors = Vec::new();
    let depletion = TopologicalDepleter::new().deplete(
        TopologyWrapper::wrap_all(artefacts),
        ArtefactPhase::Create,
        &mut |w: &mut TopologyWrapper<Artefact>, _: ArtefactPhase| {
            if w.artefact().name() == "n3" {
                errors.push(w.key().to_string());
                CompletionOutcome::Failed("disk full".into())
            } else {
                CompletionOutcome::Completed
            }
        },
    );
    assert_eq!(depletion.completed().len(), 5);
    let residual: Vec<_> = depletion.residual_keys().map(ArtefactKey::as_str).collect();
    assert_eq!(residual, vec!["t:/batch:n3"]);
    assert_eq!(errors, vec!["t:/batch:n3".to_string()]);
}

#[test]
fn cycle_terminates_after_one_sweep() {
    let artefacts = batch(2, &[(0, 1), (1, 0)]);
    let depletion = TopologicalDepleter::new().deplete(
        TopologyWrapper::wrap_all(artefacts),
        ArtefactPhase::Create,
        &mut |_: &mut TopologyWrapper<Artefact>, _: ArtefactPhase| CompletionOutcome::Completed,
    );
    let residual: Vec<_> = depletion.residual_keys().map(ArtefactKey::as_str).collect();
    assert_eq!(residual, vec!["t:/batch:n0", "t:/batch:n1"]);
    assert_eq!(depletion.sweeps(), 1);
}
