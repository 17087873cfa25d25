#![cfg(test)]

// Property tests for SlotIndex kept inside the crate so they can reach the
// internal module without a feature gate.

use crate::slot_index::{InsertError, Slot, SlotIndex};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations: indices shrink to earlier keys and op lists
// shrink in length.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    Upsert(usize, i32),
    Remove(usize),
    RemoveKey(String),
    Find(usize),
    Contains(String),
    RetainAbove(i32),
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let name = prop_oneof![proptest::sample::select(pool.clone()), "[a-z]{0,4}"];
        let op = prop_oneof![
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Upsert(i, v)),
            idx.clone().prop_map(Op::Remove),
            name.clone().prop_map(Op::RemoveKey),
            idx.clone().prop_map(Op::Find),
            name.prop_map(Op::Contains),
            any::<i32>().prop_map(Op::RetainAbove),
            Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn run_state_machine<S: BuildHasher>(
    mut sut: SlotIndex<Key, i32, S>,
    pool: &[String],
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<Key, i32> = HashMap::new();
    let mut live: HashMap<Key, Slot> = HashMap::new();
    let mut stale: Vec<Slot> = Vec::new();

    for op in ops {
        match op {
            Op::Insert(i, v) => {
                let k = key_from(pool, i);
                let already = model.contains_key(&k);
                match sut.insert(k.clone(), v) {
                    Ok(s) => {
                        prop_assert!(!already, "insert must fail on duplicate");
                        prop_assert!(live.insert(k.clone(), s).is_none());
                        model.insert(k, v);
                    }
                    Err(InsertError::DuplicateKey) => {
                        prop_assert!(already, "duplicate error only when key exists");
                    }
                }
            }
            Op::Upsert(i, v) => {
                let k = key_from(pool, i);
                let (s, prev) = sut.upsert(k.clone(), v);
                prop_assert_eq!(prev, model.insert(k.clone(), v));
                if let Some(&tracked) = live.get(&k) {
                    prop_assert_eq!(tracked, s, "upsert keeps the slot of a live key");
                } else {
                    live.insert(k, s);
                }
            }
            Op::Remove(i) => {
                let k = key_from(pool, i);
                if let Some(s) = live.remove(&k) {
                    let (kk, vv) = sut.remove(s).expect("live slot removable");
                    prop_assert!(kk == k);
                    prop_assert_eq!(Some(vv), model.remove(&k));
                    stale.push(s);
                } else {
                    prop_assert!(sut.find(&k).is_none());
                }
            }
            Op::RemoveKey(name) => {
                let got = sut
                    .find(name.as_str())
                    .and_then(|s| sut.remove(s))
                    .map(|(_, v)| v);
                let k = Key(name);
                prop_assert_eq!(got, model.remove(&k));
                if let Some(s) = live.remove(&k) {
                    stale.push(s);
                }
            }
            Op::Find(i) => {
                let k = key_from(pool, i);
                let s = sut.find(&k);
                prop_assert_eq!(s.is_some(), model.contains_key(&k));
                if let Some(s) = s {
                    prop_assert_eq!(Some(&s), live.get(&k));
                }
            }
            Op::Contains(name) => {
                let has_model = model.keys().any(|k| k.0 == name);
                prop_assert_eq!(sut.find(name.as_str()).is_some(), has_model);
            }
            Op::RetainAbove(t) => {
                let before = model.len();
                let removed = sut.retain(|_, &v| v > t);
                model.retain(|_, v| *v > t);
                prop_assert_eq!(removed, before - model.len());
                let doomed: Vec<Key> = live
                    .keys()
                    .filter(|k| !model.contains_key(*k))
                    .cloned()
                    .collect();
                for k in doomed {
                    if let Some(s) = live.remove(&k) {
                        stale.push(s);
                    }
                }
            }
            Op::Iterate => {
                let s_keys: BTreeSet<_> = sut.iter().map(|(_, k, _)| k.clone()).collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
            }
        }

        for s in &stale {
            prop_assert!(s.value(&sut).is_none(), "stale slot must not resolve");
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    Ok(())
}

// Worst-case collisions: every key hashes to the same bucket.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Property: state-machine equivalence against std::collections::HashMap.
// - Duplicate keys are rejected; successful inserts return a stable slot.
// - `upsert` overwrites in place and reports the displaced value.
// - `remove` by slot or by looked-up key and `retain` match the model and invalidate slots.
// - `iter` yields each live entry exactly once.
// - Stale slots never resolve; `len`/`is_empty` parity after each op.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_state_machine(SlotIndex::new(), &pool, ops)?;
    }

    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_state_machine(SlotIndex::with_hasher(ConstBuildHasher), &pool, ops)?;
    }
}
