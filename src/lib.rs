//! boolexpr-intern: identity and lifetime management for handle-based
//! boolean-expression engines.
//!
//! An engine hands out opaque integer handles and expects each one to be
//! freed exactly once. This crate wraps those handles so that constants and
//! literals are canonical (one wrapper per engine entity, comparable by
//! pointer), every handle is released exactly once, and the identity tables
//! never keep an otherwise unreferenced wrapper alive.
//!
//! Internal Design:
//!
//! Summary
//! - Layers:
//!   - SlotIndex<K, V, S>: structural map from keys to stable, never-reused
//!     slots; each entry stores its precomputed hash so `K: Hash` runs only
//!     on insert and lookup.
//!   - WeakInterningCache<K, V, S>: a SlotIndex of `Weak<V>` behind a
//!     reader-writer lock, with get-or-add, conditional update and
//!     amortized compaction of dead entries.
//!   - ResourceHandle: one engine handle plus the release function for its
//!     resource kind; release is an atomic swap to NULL, so it frees once.
//!   - Runtime, ContextRegistry and LiteralRegistry: the identity tables.
//!     `Runtime::materialize` is the only path from a raw node handle to a
//!     typed `Expr`.
//! - The engine sits behind the `Engine` trait. `MemoryEngine` is the
//!   in-process implementation used by tests, benches and the demo binary.
//!
//! Constraints
//! - Thread-safe: every public type is `Send + Sync`.
//! - Strong references only flow downward: Literal → Context → Runtime.
//!   Registries hold `Weak` values, and constants hold a `Weak` runtime.
//! - A raw node handle obtained from the engine is either adopted by the
//!   wrapper `materialize` returns or released before it returns.
//! - Operand handles are borrowed for one engine call. An operand released
//!   by another thread during the call turns a null result into
//!   `UseAfterRelease`.
//!
//! Locking
//! - Cache readers share the lock. `get_or_add` takes an upgradable read,
//!   and upgrades to write only if the key is absent or dead.
//! - The value factory runs while the upgradable lock is held, so at most
//!   one value is built per key at a time. The factory must not touch the
//!   same cache.
//! - Values upgraded under the lock are handed back to the caller, so a
//!   `V`'s `Drop` (which may release an engine handle) runs after the lock
//!   is released.
//! - A debug-only reentrancy guard panics on nested entry into the same
//!   cache from the same thread.
//!
//! Compaction
//! - Every operation bumps a version counter by its cost. Once the version
//!   runs `compact_interval + len` past the last clean point, the next
//!   operation compacts, but only if the reclamation generation moved.
//!   Each `ResourceHandle` drop advances the generation, so a sweep only
//!   runs when something could have died.
//! - `compact()` sweeps unconditionally.
//!
//! Drop discipline
//! - `ResourceHandle::release` swaps the handle to NULL first and frees the
//!   old value only if it was non-NULL and owned.
//! - Duplicate literal handles are released only after the winning wrapper
//!   is registered.
//! - Recovered contexts (found on a literal but unknown to the registry)
//!   are borrowed and never freed by this crate.

pub mod context;
pub mod engine;
pub mod epoch;
pub mod error;
pub mod expr;
mod factory;
mod reentrancy;
pub mod resource;
pub mod runtime;
pub mod seq;
#[cfg(feature = "bench_internal")]
pub mod slot_index;
#[cfg(not(feature = "bench_internal"))]
mod slot_index;
mod slot_index_proptest;
pub mod weak_cache;

// Public surface
pub use context::{Context, ContextRegistry, LiteralRegistry};
pub use engine::{Engine, EngineStats, Kind, Measure, MemoryEngine, Property, RawHandle, Transform};
pub use error::{Error, Result};
pub use expr::{Constant, Expr, Literal, Operator};
pub use resource::{Resource, ResourceHandle};
pub use runtime::{Runtime, RuntimeConfig};
pub use seq::{ExprIter, Point, PointIter};
pub use weak_cache::{CacheConfig, WeakInterningCache};
