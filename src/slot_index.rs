//! SlotIndex: keyed storage with generational slots and a hash index.
//!
//! Entries live in a `SlotMap`; a `HashTable` of slot keys indexes them by
//! the key's precomputed hash, so `K: Hash` never runs again after insert
//! (rehashing uses the stored hash). Slots are generational: a `Slot` from a
//! removed entry never resolves to a later entry that reuses the position.
//!
//! Not synchronized; `WeakInterningCache` wraps it in a lock.

use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Slot(DefaultKey);

impl Slot {
    pub fn value<'a, K, V, S>(&self, index: &'a SlotIndex<K, V, S>) -> Option<&'a V>
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        index.slots.get(self.0).map(|e| &e.value)
    }
}

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
}

pub struct SlotIndex<K, V, S = RandomState> {
    hasher: S,
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, Entry<K, V>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertError {
    DuplicateKey,
}

#[cfg(any(test, feature = "bench_internal"))]
impl<K, V> SlotIndex<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

#[cfg(any(test, feature = "bench_internal"))]
impl<K, V> Default for SlotIndex<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over entries in slot order.
pub struct Iter<'a, K, V> {
    it: slotmap::basic::Iter<'a, DefaultKey, Entry<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (Slot, &'a K, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(k, e)| (Slot(k), &e.key, &e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<K, V, S> SlotIndex<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::new(),
            slots: SlotMap::with_key(),
        }
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[cfg(any(test, feature = "bench_internal"))]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn find<Q>(&self, q: &Q) -> Option<Slot>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        let slots = &self.slots;
        self.index
            .find(hash, |&k| slots.get(k).is_some_and(|e| e.key.borrow() == q))
            .map(|&k| Slot(k))
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.find(q)?;
        self.slots.get(slot.0).map(|e| &e.value)
    }

    /// Insert a new entry; duplicate keys are rejected and `value` is dropped.
    pub fn insert(&mut self, key: K, value: V) -> Result<Slot, InsertError> {
        let hash = self.make_hash(&key);
        let slots = &mut self.slots;
        match self.index.entry(
            hash,
            |&kk| slots.get(kk).is_some_and(|e| e.key == key),
            |&kk| slots.get(kk).map_or(0, |e| e.hash),
        ) {
            hashbrown::hash_table::Entry::Occupied(_) => Err(InsertError::DuplicateKey),
            hashbrown::hash_table::Entry::Vacant(v) => {
                let k = slots.insert(Entry { key, value, hash });
                let _ = v.insert(k);
                Ok(Slot(k))
            }
        }
    }

    /// Insert or overwrite. Returns the displaced value, if any; the stored
    /// key is kept on overwrite and the new `key` is dropped.
    pub fn upsert(&mut self, key: K, value: V) -> (Slot, Option<V>) {
        match self.find(&key) {
            Some(slot) => {
                let entry = &mut self.slots[slot.0];
                let old = core::mem::replace(&mut entry.value, value);
                (slot, Some(old))
            }
            None => {
                let hash = self.make_hash(&key);
                let k = self.slots.insert(Entry { key, value, hash });
                let slots = &self.slots;
                self.index
                    .insert_unique(hash, k, |&kk| slots.get(kk).map_or(0, |e| e.hash));
                (Slot(k), None)
            }
        }
    }

    /// Overwrite the value in a live slot, returning the old one.
    pub fn replace(&mut self, slot: Slot, value: V) -> Option<V> {
        self.slots
            .get_mut(slot.0)
            .map(|e| core::mem::replace(&mut e.value, value))
    }

    pub fn remove(&mut self, slot: Slot) -> Option<(K, V)> {
        let k = slot.0;
        let entry = self.slots.remove(k)?;
        let _ = self
            .index
            .find_entry(entry.hash, |&kk| kk == k)
            .map(|occupied| occupied.remove());
        Some((entry.key, entry.value))
    }

    /// Drop every entry for which `keep` returns false. Returns how many
    /// entries were removed.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let doomed: Vec<DefaultKey> = self
            .slots
            .iter()
            .filter(|(_, e)| !keep(&e.key, &e.value))
            .map(|(k, _)| k)
            .collect();
        for &k in &doomed {
            let _ = self.remove(Slot(k));
        }
        doomed.len()
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            it: self.slots.iter(),
        }
    }
}
