//! Property-Based Tests for Target Selection
//!
//! Uses proptest to check determinism and coverage of modulo sharding.

use proptest::prelude::*;

use crate::routing::{select, Target};

// == Strategies ==
/// Generates request-like routing keys
fn routing_key_strategy() -> impl Strategy<Value = String> {
    "/[a-z]{1,12}(/[a-zA-Z0-9_]{1,16}){0,4}(\\?[a-z]{1,6}=[a-zA-Z0-9]{1,10})?".prop_map(|s| s)
}

fn targets(count: usize) -> Vec<Target> {
    (0..count)
        .map(|i| Target::parse(&format!("http://cluster-{i}")).unwrap())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // Repeated selection with the same inputs returns the same target.
    #[test]
    fn prop_selection_is_deterministic(key in routing_key_strategy(), count in 1usize..16) {
        let targets = targets(count);
        let first = select(&key, &targets).unwrap();
        for _ in 0..3 {
            prop_assert_eq!(select(&key, &targets).unwrap(), first);
        }
    }

    // Selection never falls outside the list.
    #[test]
    fn prop_selection_stays_in_list(key in ".*", count in 1usize..16) {
        let targets = targets(count);
        let chosen = select(&key, &targets).unwrap();
        prop_assert!(targets.contains(chosen));
    }
}

// Every target receives a non-trivial share of a varied key sample.
#[test]
fn test_selection_covers_every_target() {
    for count in 1..=8 {
        let targets = targets(count);
        let mut hits = vec![0usize; count];

        for i in 0..4000 {
            let key = format!("/users/v1/users/{i}?size=48x48");
            let chosen = select(&key, &targets).unwrap();
            let index = targets.iter().position(|t| t == chosen).unwrap();
            hits[index] += 1;
        }

        let floor = 4000 / count / 4;
        for (index, share) in hits.iter().enumerate() {
            assert!(
                *share > floor,
                "target {index} of {count} got {share} selections"
            );
        }
    }
}
