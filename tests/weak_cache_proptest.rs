// WeakInterningCache property tests.
//
// Model: the set of values the test itself keeps alive, keyed like the
// cache. A key is registered iff the model holds a strong reference for it.
//  - Invariant: contains_key(k) == model.contains_key(k), and get(k)
//    returns the model's instance.
//  - Operations: get_or_add (keep or drop the result), insert, drop,
//    remove, try_update, compact.
//  - After compact: len() == model.len().
// Run twice: with the default hasher and with a constant hasher that
// forces every key into one collision chain.
use boolexpr_intern::{CacheConfig, WeakInterningCache};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hasher};
use std::sync::Arc;

#[derive(Clone, Debug)]
enum Op {
    GetOrAdd(u8, bool),
    Insert(u8),
    Drop(u8),
    Remove(u8),
    TryUpdate(u8),
    Compact,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..8, any::<bool>()).prop_map(|(k, keep)| Op::GetOrAdd(k, keep)),
        1 => (0u8..8).prop_map(Op::Insert),
        2 => (0u8..8).prop_map(Op::Drop),
        1 => (0u8..8).prop_map(Op::Remove),
        1 => (0u8..8).prop_map(Op::TryUpdate),
        1 => Just(Op::Compact),
    ]
}

#[derive(Clone, Default)]
struct ConstBuildHasher;

struct ConstHasher;

impl Hasher for ConstHasher {
    fn finish(&self) -> u64 {
        42
    }
    fn write(&mut self, _bytes: &[u8]) {}
}

impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}

fn run<S: BuildHasher>(
    cache: WeakInterningCache<u8, u64, S>,
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<u8, Arc<u64>> = HashMap::new();
    let mut next = 0u64;
    let mut fresh = || {
        next += 1;
        Arc::new(next)
    };

    for op in ops {
        match op {
            Op::GetOrAdd(k, keep) => {
                let mut ran = false;
                let v = cache.get_or_add(k, |_| {
                    ran = true;
                    fresh()
                });
                match model.get(&k) {
                    Some(held) => {
                        prop_assert!(!ran, "factory ran for a live key");
                        prop_assert!(Arc::ptr_eq(held, &v));
                    }
                    None => prop_assert!(ran, "factory skipped for a dead key"),
                }
                if keep {
                    model.insert(k, v);
                }
            }
            Op::Insert(k) => {
                let v = fresh();
                let prev = cache.insert(k, &v);
                match (model.insert(k, v), prev) {
                    (Some(held), Some(prev)) => prop_assert!(Arc::ptr_eq(&held, &prev)),
                    (None, None) => {}
                    (held, prev) => prop_assert!(
                        false,
                        "insert displaced {:?}, model held {:?}",
                        prev,
                        held
                    ),
                }
            }
            Op::Drop(k) => {
                model.remove(&k);
            }
            Op::Remove(k) => {
                prop_assert_eq!(cache.remove(&k), model.remove(&k).is_some());
            }
            Op::TryUpdate(k) => {
                let v = fresh();
                match model.get(&k).cloned() {
                    Some(held) => {
                        prop_assert!(cache.try_update(&k, &v, &held));
                        model.insert(k, v);
                    }
                    None => {
                        let stranger = fresh();
                        prop_assert!(!cache.try_update(&k, &v, &stranger));
                    }
                }
            }
            Op::Compact => {
                cache.compact();
                prop_assert_eq!(cache.len(), model.len());
            }
        }

        for k in 0u8..8 {
            prop_assert_eq!(cache.contains_key(&k), model.contains_key(&k));
            match (cache.get(&k), model.get(&k)) {
                (Some(got), Some(held)) => prop_assert!(Arc::ptr_eq(&got, held)),
                (None, None) => {}
                (got, held) => prop_assert!(false, "get {:?}, model {:?}", got, held),
            }
        }
        prop_assert!(cache.len() >= model.len());
        prop_assert_eq!(cache.entries().len(), model.len());
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_weak_cache_matches_model(ops in proptest::collection::vec(op(), 1..200)) {
        let cache = WeakInterningCache::with_config(CacheConfig::default().with_compact_interval(4));
        run(cache, ops)?;
    }

    #[test]
    fn prop_weak_cache_with_collisions(ops in proptest::collection::vec(op(), 1..200)) {
        let cache = WeakInterningCache::with_config_and_hasher(
            CacheConfig::default().with_compact_interval(4),
            ConstBuildHasher,
        );
        run(cache, ops)?;
    }
}
