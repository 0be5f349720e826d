use depsync_manifest::{PlatformSet, PlatformUniverse, parse_predicate};
use proptest::prelude::*;

const NAMES: [&str; 3] = ["linux", "macos", "windows"];

fn any_set() -> impl Strategy<Value = PlatformSet> {
    proptest::sample::subsequence(NAMES.to_vec(), 0..=3)
        .prop_map(|names| names.into_iter().collect())
}

/// An expression evaluating to exactly `set`.
fn expr(set: &PlatformSet) -> String {
    let names: Vec<&str> = set.iter().collect();
    format!("any({})", names.join(", "))
}

proptest! {
    #[test]
    fn any_is_union(a in any_set(), b in any_set()) {
        let predicate = format!("cfg(any({}, {}))", expr(&a), expr(&b));
        let set = parse_predicate(&predicate, &PlatformUniverse::default()).unwrap();
        prop_assert_eq!(set, a.union(&b));
    }

    #[test]
    fn all_is_intersection(a in any_set(), b in any_set()) {
        let predicate = format!("cfg(all({}, {}))", expr(&a), expr(&b));
        let set = parse_predicate(&predicate, &PlatformUniverse::default()).unwrap();
        prop_assert_eq!(set, a.intersection(&b));
    }

    #[test]
    fn not_is_complement(a in any_set()) {
        let universe = PlatformUniverse::default();
        let negated = parse_predicate(&format!("cfg(not({}))", expr(&a)), &universe).unwrap();
        prop_assert!(!negated.intersects(&a));
        prop_assert_eq!(negated.union(&a), universe.all());
    }

    #[test]
    fn intersects_matches_intersection(a in any_set(), b in any_set()) {
        prop_assert_eq!(a.intersects(&b), !a.intersection(&b).is_empty());
    }
}
