//! Contexts and the two identity registries.
//!
//! A `Context` is the single wrapper for one engine context handle. The
//! runtime's `ContextRegistry` maps raw context handles to it, and each
//! context's `LiteralRegistry` maps literal ids to the single `Literal`
//! wrapper for that id. Both hold their values weakly: literals keep their
//! context alive, never the other way around.

use crate::engine::{Engine, RawHandle};
use crate::error::{Error, Result};
use crate::expr::{Expr, Literal};
use crate::resource::{Resource, ResourceHandle};
use crate::runtime::Runtime;
use crate::weak_cache::{CacheConfig, WeakInterningCache};
use core::fmt;
use std::sync::Arc;

/// Raw context handle → `Context`.
pub struct ContextRegistry {
    cache: WeakInterningCache<RawHandle, Context>,
}

impl ContextRegistry {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            cache: WeakInterningCache::with_config(config),
        }
    }

    pub fn get(&self, raw: RawHandle) -> Option<Arc<Context>> {
        self.cache.get(&raw)
    }

    /// The registered context for `raw`, or the one `factory` builds.
    pub fn get_or_create<F>(&self, raw: RawHandle, factory: F) -> Result<Arc<Context>>
    where
        F: FnOnce() -> Result<Arc<Context>>,
    {
        self.cache.try_get_or_add(raw, |_| factory())
    }

    /// Register `context` under its handle, replacing any stale entry left
    /// by an earlier context with the same handle value.
    pub(crate) fn register(&self, context: &Arc<Context>) {
        let _ = self.cache.insert(context.raw_handle(), context);
    }

    pub fn remove(&self, raw: RawHandle) -> bool {
        self.cache.remove(&raw)
    }

    pub fn contexts(&self) -> Vec<Arc<Context>> {
        self.cache.entries().into_iter().map(|(_, c)| c).collect()
    }

    pub fn compact(&self) -> usize {
        self.cache.compact()
    }

    /// Stored entries, including dead ones not yet compacted.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Literal id → `Literal`, one per context.
pub struct LiteralRegistry {
    cache: WeakInterningCache<u32, Literal>,
}

impl LiteralRegistry {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            cache: WeakInterningCache::with_config(config),
        }
    }

    pub fn get(&self, id: u32) -> Option<Arc<Literal>> {
        self.cache.get(&id)
    }

    pub fn get_or_create<F>(&self, id: u32, factory: F) -> Result<Arc<Literal>>
    where
        F: FnOnce() -> Result<Arc<Literal>>,
    {
        self.cache.try_get_or_add(id, |_| factory())
    }

    /// Swap in `fresh` only if `stale` is still the registered literal.
    pub(crate) fn replace(&self, id: u32, fresh: &Arc<Literal>, stale: &Arc<Literal>) -> bool {
        self.cache.try_update(&id, fresh, stale)
    }

    pub fn literals(&self) -> Vec<Arc<Literal>> {
        self.cache.entries().into_iter().map(|(_, l)| l).collect()
    }

    pub fn compact(&self) -> usize {
        self.cache.compact()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

pub struct Context {
    handle: ResourceHandle,
    runtime: Arc<Runtime>,
    literals: LiteralRegistry,
}

impl Context {
    /// Create an engine context owned by the returned wrapper.
    pub fn new(runtime: &Arc<Runtime>) -> Result<Arc<Context>> {
        let engine = runtime.engine();
        let handle = ResourceHandle::adopt(engine, engine.context_new(), Resource::Context)?;
        let context = Arc::new(Self::with_handle(runtime, handle));
        runtime.contexts().register(&context);
        tracing::debug!(handle = %context.raw_handle(), "context created");
        Ok(context)
    }

    /// Wrap a context handle found on a literal. The wrapper does not own
    /// the handle.
    pub(crate) fn recovered(runtime: &Arc<Runtime>, raw: RawHandle) -> Result<Arc<Context>> {
        let handle = ResourceHandle::borrowed(runtime.engine(), raw, Resource::Context)?;
        tracing::debug!(handle = %raw, "context recovered");
        Ok(Arc::new(Self::with_handle(runtime, handle)))
    }

    fn with_handle(runtime: &Arc<Runtime>, handle: ResourceHandle) -> Self {
        Self {
            handle,
            runtime: Arc::clone(runtime),
            literals: LiteralRegistry::new(runtime.config().cache),
        }
    }

    /// The variable called `name`, created on first use.
    pub fn variable(&self, name: &str) -> Result<Arc<Literal>> {
        if name.is_empty() {
            return Err(Error::ArgumentNull("name"));
        }
        let raw = self.engine().context_get_var(self.handle.get()?, name);
        match self.runtime.materialize(raw)? {
            Expr::Literal(lit) => Ok(lit),
            other => Err(Error::KindMismatch {
                expected: "literal",
                found: other.kind(),
            }),
        }
    }

    pub fn variables<I, S>(&self, names: I) -> Result<Vec<Arc<Literal>>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().map(|n| self.variable(n.as_ref())).collect()
    }

    /// Release the engine context. Idempotent; returns true only for the
    /// call that released it.
    pub fn dispose(&self) -> bool {
        self.handle.release()
    }

    pub fn is_disposed(&self) -> bool {
        self.handle.is_released()
    }

    /// Whether disposal frees the engine context (false for recovered
    /// contexts).
    pub fn is_owned(&self) -> bool {
        self.handle.is_owned()
    }

    pub fn raw_handle(&self) -> RawHandle {
        self.handle.raw_handle()
    }

    pub(crate) fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    pub fn literals(&self) -> &LiteralRegistry {
        &self.literals
    }

    fn engine(&self) -> &Arc<dyn Engine> {
        self.runtime.engine()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("handle", &self.handle)
            .field("literals", &self.literals.len())
            .finish()
    }
}
