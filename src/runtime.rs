//! Runtime: the engine plus every identity table built over it.
//!
//! One runtime per engine. It owns the four constant singletons and the
//! context registry, and is the only place engine results enter the typed
//! API (see `materialize`). An optional process-wide runtime is created on
//! first use by [`Runtime::global_or_init`]; nothing needs tearing down, as
//! registry entries expire with their values.

use crate::context::ContextRegistry;
use crate::engine::{Engine, Kind, RawHandle};
use crate::error::{Error, Result};
use crate::expr::{Constant, Expr};
use crate::resource::{ensure_live_operands, Resource, ResourceHandle};
use crate::weak_cache::CacheConfig;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Clone, Copy, Debug)]
pub struct RuntimeConfig {
    /// Compaction settings for the context registry and every literal
    /// registry.
    pub cache: CacheConfig,
    /// Wrap unknown context handles found on literals in a non-owning
    /// `Context`. When false such literals fail with `UnresolvedContext`.
    pub recover_contexts: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            recover_contexts: true,
        }
    }
}

impl RuntimeConfig {
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_recover_contexts(mut self, recover: bool) -> Self {
        self.recover_contexts = recover;
        self
    }
}

static GLOBAL: Mutex<Option<Arc<Runtime>>> = parking_lot::const_mutex(None);

pub struct Runtime {
    engine: Arc<dyn Engine>,
    config: RuntimeConfig,
    contexts: ContextRegistry,
    zero: Arc<Constant>,
    one: Arc<Constant>,
    logical: Arc<Constant>,
    illogical: Arc<Constant>,
}

impl Runtime {
    pub fn new(engine: Arc<dyn Engine>) -> Result<Arc<Self>> {
        Self::with_config(engine, RuntimeConfig::default())
    }

    pub fn with_config(engine: Arc<dyn Engine>, config: RuntimeConfig) -> Result<Arc<Self>> {
        let kinds = [Kind::Zero, Kind::One, Kind::Logical, Kind::Illogical];
        let [zero, one, logical, illogical] =
            kinds.map(|k| ResourceHandle::adopt(&engine, engine.constant(k), Resource::Node));
        let (zero, one, logical, illogical) = (zero?, one?, logical?, illogical?);
        Ok(Arc::new_cyclic(|rt| {
            let constant = |kind: Kind, handle: ResourceHandle| {
                Arc::new(Constant::new(kind, handle, rt.clone()))
            };
            Runtime {
                contexts: ContextRegistry::new(config.cache),
                zero: constant(Kind::Zero, zero),
                one: constant(Kind::One, one),
                logical: constant(Kind::Logical, logical),
                illogical: constant(Kind::Illogical, illogical),
                engine,
                config,
            }
        }))
    }

    /// The process-wide runtime, created over `init()`'s engine on first
    /// call. Later calls ignore `init`.
    pub fn global_or_init<F>(init: F) -> Result<Arc<Self>>
    where
        F: FnOnce() -> Arc<dyn Engine>,
    {
        let mut global = GLOBAL.lock();
        if let Some(rt) = global.as_ref() {
            return Ok(Arc::clone(rt));
        }
        let rt = Self::new(init())?;
        *global = Some(Arc::clone(&rt));
        Ok(rt)
    }

    /// The process-wide runtime, if initialized.
    pub fn global() -> Option<Arc<Self>> {
        GLOBAL.lock().clone()
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn contexts(&self) -> &ContextRegistry {
        &self.contexts
    }

    pub fn zero(&self) -> &Arc<Constant> {
        &self.zero
    }

    pub fn one(&self) -> &Arc<Constant> {
        &self.one
    }

    pub fn logical(&self) -> &Arc<Constant> {
        &self.logical
    }

    pub fn illogical(&self) -> &Arc<Constant> {
        &self.illogical
    }

    /// The singleton for a constant kind.
    pub fn constant(&self, kind: Kind) -> Option<&Arc<Constant>> {
        match kind {
            Kind::Zero => Some(&self.zero),
            Kind::One => Some(&self.one),
            Kind::Logical => Some(&self.logical),
            Kind::Illogical => Some(&self.illogical),
            _ => None,
        }
    }

    /// Borrow the engine handle of an operand, rejecting operands built on
    /// another runtime.
    ///
    /// The handle stays borrowed only for the engine call that follows. An
    /// operand disposed concurrently in that window is reported by
    /// [`Runtime::settle`] as `UseAfterRelease`.
    pub(crate) fn operand(self: &Arc<Self>, e: &Expr) -> Result<RawHandle> {
        if !e.belongs_to(self) {
            return Err(Error::ArgumentInvalid {
                name: "operand",
                reason: "expression belongs to another runtime",
            });
        }
        e.handle().get()
    }

    /// Materialize the result of an engine call over `operands`.
    pub(crate) fn settle(
        self: &Arc<Self>,
        raw: RawHandle,
        operands: &[&ResourceHandle],
    ) -> Result<Expr> {
        ensure_live_operands(raw, operands)?;
        self.materialize(raw)
    }

    fn apply(self: &Arc<Self>, kind: Kind, args: &[Expr]) -> Result<Expr> {
        let raws = args
            .iter()
            .map(|a| self.operand(a))
            .collect::<Result<Vec<_>>>()?;
        let operands: Vec<&ResourceHandle> = args.iter().map(Expr::handle).collect();
        self.settle(self.engine.apply(kind, &raws), &operands)
    }

    pub fn not(self: &Arc<Self>, x: &Expr) -> Result<Expr> {
        let raw = self.operand(x)?;
        self.settle(self.engine.not(raw), &[x.handle()])
    }

    pub fn or(self: &Arc<Self>, args: &[Expr]) -> Result<Expr> {
        self.apply(Kind::Or, args)
    }

    pub fn nor(self: &Arc<Self>, args: &[Expr]) -> Result<Expr> {
        self.apply(Kind::Nor, args)
    }

    pub fn and(self: &Arc<Self>, args: &[Expr]) -> Result<Expr> {
        self.apply(Kind::And, args)
    }

    pub fn nand(self: &Arc<Self>, args: &[Expr]) -> Result<Expr> {
        self.apply(Kind::Nand, args)
    }

    pub fn xor(self: &Arc<Self>, args: &[Expr]) -> Result<Expr> {
        self.apply(Kind::Xor, args)
    }

    pub fn xnor(self: &Arc<Self>, args: &[Expr]) -> Result<Expr> {
        self.apply(Kind::Xnor, args)
    }

    pub fn equal(self: &Arc<Self>, args: &[Expr]) -> Result<Expr> {
        if args.is_empty() {
            return Err(Error::ArgumentInvalid {
                name: "args",
                reason: "at least one operand is required",
            });
        }
        self.apply(Kind::Equal, args)
    }

    pub fn unequal(self: &Arc<Self>, args: &[Expr]) -> Result<Expr> {
        if args.is_empty() {
            return Err(Error::ArgumentInvalid {
                name: "args",
                reason: "at least one operand is required",
            });
        }
        self.apply(Kind::Unequal, args)
    }

    pub fn implies(self: &Arc<Self>, p: &Expr, q: &Expr) -> Result<Expr> {
        self.apply(Kind::Implies, &[p.clone(), q.clone()])
    }

    pub fn not_implies(self: &Arc<Self>, p: &Expr, q: &Expr) -> Result<Expr> {
        self.apply(Kind::NotImplies, &[p.clone(), q.clone()])
    }

    pub fn ite(self: &Arc<Self>, s: &Expr, d1: &Expr, d0: &Expr) -> Result<Expr> {
        self.apply(Kind::IfThenElse, &[s.clone(), d1.clone(), d0.clone()])
    }

    pub fn not_ite(self: &Arc<Self>, s: &Expr, d1: &Expr, d0: &Expr) -> Result<Expr> {
        self.apply(Kind::NotIfThenElse, &[s.clone(), d1.clone(), d0.clone()])
    }
}

impl core::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("contexts", &self.contexts.len())
            .finish()
    }
}
