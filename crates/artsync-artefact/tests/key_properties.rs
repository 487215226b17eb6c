use artsync_artefact::{Artefact, ArtefactKey};
use proptest::prelude::*;

fn part() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_/.-]{1,16}"
}

proptest! {
    #[test]
    fn prop_key_joins_components(t in part(), l in part(), n in part()) {
        let artefact = Artefact::new(t.clone(), l.clone(), n.clone()).unwrap();
        prop_assert_eq!(artefact.key().as_str(), format!("{t}:{l}:{n}"));
        prop_assert_eq!(artefact.key(), &ArtefactKey::derive(&t, &l, &n));
    }

    #[test]
    fn prop_changing_a_component_changes_key(
        t in part(),
        l in part(),
        n in part(),
        other in part(),
        which in 0..3u8,
    ) {
        let mut artefact = Artefact::new(t.clone(), l.clone(), n.clone()).unwrap();
        let before = artefact.key().clone();
        let changed = match which {
            0 => { artefact.set_artefact_type(other.clone()).unwrap(); other != t }
            1 => { artefact.set_location(other.clone()).unwrap(); other != l }
            _ => { artefact.set_name(other.clone()).unwrap(); other != n }
        };
        prop_assert_eq!(artefact.key() != &before, changed);
    }
}
