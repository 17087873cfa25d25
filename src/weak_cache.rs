//! WeakInterningCache: a thread-safe key → `Weak<V>` map.
//!
//! The cache never keeps a value alive. A key whose value has been dropped
//! behaves as absent and is reclaimed by compaction.
//!
//! Locking
//! - Lookups take the shared lock.
//! - Mutations take the upgradable read lock to check the current state, and
//!   upgrade to exclusive access only to write. Only one upgradable reader
//!   exists at a time, so two threads can never both decide they are the
//!   winner of a `get_or_add` race for one key.
//!
//! Compaction
//! - Every operation bumps a version counter (lookups by 1, mutations by 2).
//!   Once `version - clean_version > compact_interval + len`, the next
//!   operation re-arms the counter and, if the reclamation generation moved
//!   since the last sweep, drops dead entries.
//! - Liveness is judged by `Weak::strong_count` under the write lock. A dead
//!   entry can never become live again, so the check cannot race a resurrect.
//!
//! Drop discipline
//! - Values upgraded under a lock are always handed back to the caller, so
//!   a value's `Drop` does not run while the cache lock is held, except when
//!   a caller-supplied `update` closure discards the previous value itself.
//!   `V`'s `Drop` must not call back into the same cache.

use crate::epoch;
use crate::reentrancy::DebugReentrancy;
use crate::slot_index::SlotIndex;
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use core::sync::atomic::{AtomicU64, Ordering};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::collections::hash_map::RandomState;
use std::sync::{Arc, Weak};

/// Compaction tuning shared by every cache a runtime owns.
#[derive(Clone, Copy, Debug)]
pub struct CacheConfig {
    /// Base number of version ticks between implicit compactions. The
    /// effective interval grows with the number of stored entries.
    pub compact_interval: usize,
    /// Source of the reclamation generation. A sweep is elided when this
    /// has not moved since the previous one.
    pub generation: fn() -> u64,
}

impl CacheConfig {
    pub const DEFAULT_COMPACT_INTERVAL: usize = 500;

    pub fn with_compact_interval(mut self, interval: usize) -> Self {
        self.compact_interval = interval;
        self
    }

    pub fn with_generation(mut self, generation: fn() -> u64) -> Self {
        self.generation = generation;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            compact_interval: Self::DEFAULT_COMPACT_INTERVAL,
            generation: epoch::current,
        }
    }
}

struct Table<K, V, S> {
    slots: SlotIndex<K, Weak<V>, S>,
    clean_version: u64,
    clean_generation: u64,
}

impl<K, V, S> Table<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn due(&self, version: u64, interval: usize) -> bool {
        let threshold = interval.saturating_add(self.slots.len()) as u64;
        version.saturating_sub(self.clean_version) > threshold
    }

    fn sweep(&mut self) -> usize {
        self.slots.retain(|_, weak| weak.strong_count() > 0)
    }

    fn live<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.slots.get(key).and_then(Weak::upgrade)
    }
}

pub struct WeakInterningCache<K, V, S = RandomState> {
    table: RwLock<Table<K, V, S>>,
    version: AtomicU64,
    config: CacheConfig,
    reentrancy: DebugReentrancy,
}

impl<K, V> WeakInterningCache<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self::with_config_and_hasher(config, RandomState::new())
    }
}

impl<K, V> Default for WeakInterningCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> WeakInterningCache<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_config_and_hasher(config: CacheConfig, hasher: S) -> Self {
        Self {
            table: RwLock::new(Table {
                slots: SlotIndex::with_hasher(hasher),
                clean_version: 0,
                clean_generation: (config.generation)(),
            }),
            version: AtomicU64::new(0),
            config,
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Bump the version by `inc` and compact if the threshold was crossed.
    fn auto_compact(&self, inc: u64) {
        let v = self.version.fetch_add(inc, Ordering::Relaxed) + inc;
        let interval = self.config.compact_interval;
        if !self.table.read().due(v, interval) {
            return;
        }
        let table = self.table.upgradable_read();
        if !table.due(v, interval) {
            return;
        }
        // Read the generation before sweeping: a value dying mid-sweep
        // advances it afterwards, so the next sweep is not elided.
        let generation = (self.config.generation)();
        let mut table = RwLockUpgradableReadGuard::upgrade(table);
        if generation != table.clean_generation {
            let removed = table.sweep();
            table.clean_generation = generation;
            tracing::debug!(removed, remaining = table.slots.len(), "weak cache compacted");
        }
        table.clean_version = table.clean_version.max(v);
    }

    /// The live value for `key`, if any.
    pub fn get<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        self.auto_compact(1);
        self.table.read().live(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        self.auto_compact(1);
        self.table
            .read()
            .slots
            .get(key)
            .is_some_and(|w| w.strong_count() > 0)
    }

    /// Return the live value for `key`, or store and return `factory`'s.
    pub fn get_or_add<F>(&self, key: K, factory: F) -> Arc<V>
    where
        F: FnOnce(&K) -> Arc<V>,
    {
        match self.try_get_or_add(key, |k| Ok::<_, core::convert::Infallible>(factory(k))) {
            Ok(v) => v,
            Err(never) => match never {},
        }
    }

    /// Fallible `get_or_add`. The factory runs at most once, under the
    /// upgradable lock, and only when no live value exists. On error
    /// nothing is stored.
    pub fn try_get_or_add<F, E>(&self, key: K, factory: F) -> Result<Arc<V>, E>
    where
        F: FnOnce(&K) -> Result<Arc<V>, E>,
    {
        let _g = self.reentrancy.enter();
        self.auto_compact(2);
        if let Some(v) = self.table.read().live(&key) {
            return Ok(v);
        }
        let table = self.table.upgradable_read();
        let slot = table.slots.find(&key);
        if let Some(v) = slot.and_then(|s| s.value(&table.slots)).and_then(Weak::upgrade) {
            return Ok(v);
        }
        let value = factory(&key)?;
        let mut table = RwLockUpgradableReadGuard::upgrade(table);
        let weak = Arc::downgrade(&value);
        match slot {
            // Dead entry: reuse its slot.
            Some(s) => {
                let _ = table.slots.replace(s, weak);
            }
            None => {
                let _ = table.slots.insert(key, weak);
            }
        }
        Ok(value)
    }

    /// Store `add(key)` when no live value exists, otherwise replace the live
    /// value with `update(key, current)`. Returns the stored value.
    pub fn add_or_update<A, U>(&self, key: K, add: A, update: U) -> Arc<V>
    where
        A: FnOnce(&K) -> Arc<V>,
        U: FnOnce(&K, Arc<V>) -> Arc<V>,
    {
        let _g = self.reentrancy.enter();
        self.auto_compact(2);
        let table = self.table.upgradable_read();
        let value = match table.live(&key) {
            Some(current) => update(&key, current),
            None => add(&key),
        };
        let mut table = RwLockUpgradableReadGuard::upgrade(table);
        let _ = table.slots.upsert(key, Arc::downgrade(&value));
        value
    }

    /// Replace the value for `key` with `value` only if the stored value is
    /// `expected` (pointer identity). Returns whether the swap happened.
    pub fn try_update<Q>(&self, key: &Q, value: &Arc<V>, expected: &Arc<V>) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        self.auto_compact(2);
        let table = self.table.upgradable_read();
        let Some(slot) = table.slots.find(key) else {
            return false;
        };
        let matches = slot
            .value(&table.slots)
            .is_some_and(|w| w.as_ptr() == Arc::as_ptr(expected));
        if !matches {
            return false;
        }
        let mut table = RwLockUpgradableReadGuard::upgrade(table);
        table.slots.replace(slot, Arc::downgrade(value)).is_some()
    }

    /// Unconditionally map `key` to `value`. Returns the previously stored
    /// live value, if there was one.
    pub fn insert(&self, key: K, value: &Arc<V>) -> Option<Arc<V>> {
        let _g = self.reentrancy.enter();
        self.auto_compact(2);
        let (_, previous) = self.table.write().slots.upsert(key, Arc::downgrade(value));
        previous.and_then(|w| w.upgrade())
    }

    /// Remove `key`. Returns true only if a live entry was removed; dead
    /// entries are dropped silently.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter();
        self.auto_compact(2);
        let table = self.table.upgradable_read();
        let Some(slot) = table.slots.find(key) else {
            return false;
        };
        let mut table = RwLockUpgradableReadGuard::upgrade(table);
        table
            .slots
            .remove(slot)
            .is_some_and(|(_, w)| w.strong_count() > 0)
    }

    /// Sweep dead entries now, regardless of the version counter and the
    /// reclamation generation. Returns the number removed.
    pub fn compact(&self) -> usize {
        let _g = self.reentrancy.enter();
        let generation = (self.config.generation)();
        let mut table = self.table.write();
        let removed = table.sweep();
        table.clean_generation = generation;
        table.clean_version = self.version.load(Ordering::Relaxed);
        tracing::debug!(removed, remaining = table.slots.len(), "weak cache compacted");
        removed
    }

    /// Point-in-time snapshot of the live entries.
    pub fn entries(&self) -> Vec<(K, Arc<V>)>
    where
        K: Clone,
    {
        let _g = self.reentrancy.enter();
        self.table
            .read()
            .slots
            .iter()
            .filter_map(|(_, k, w)| w.upgrade().map(|v| (k.clone(), v)))
            .collect()
    }

    /// Number of stored entries, including dead ones not yet compacted.
    pub fn len(&self) -> usize {
        self.table.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let _g = self.reentrancy.enter();
        self.auto_compact(2);
        self.table.write().slots.clear();
    }
}

impl<K, V, S> core::fmt::Debug for WeakInterningCache<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WeakInterningCache")
            .field("len", &self.len())
            .field("version", &self.version.load(Ordering::Relaxed))
            .field("compact_interval", &self.config.compact_interval)
            .finish()
    }
}
