//! Node materialization: raw engine handle → canonical wrapper.
//!
//! Every node handle the engine returns passes through here exactly once.
//! The raw handle is either adopted by the returned wrapper or released
//! before this returns; it is never exposed twice.

use crate::context::Context;
use crate::engine::{Kind, RawHandle};
use crate::error::{Error, Result};
use crate::expr::{Expr, Literal, Operator};
use crate::resource::{Resource, ResourceHandle};
use crate::runtime::Runtime;
use std::sync::Arc;

impl Runtime {
    /// Wrap an owned node handle.
    ///
    /// - Constants: the handle is released and the runtime's singleton is
    ///   returned.
    /// - Literals: the single wrapper for (context, id); a duplicate handle
    ///   is released once the winning wrapper is registered.
    /// - Operators: always a new wrapper.
    /// - Unknown kinds: the handle is released and `UnknownNodeKind` returned.
    pub fn materialize(self: &Arc<Self>, raw: RawHandle) -> Result<Expr> {
        if raw.is_null() {
            return Err(Error::InvalidHandle(Resource::Node));
        }
        let tag = self.engine().node_kind(raw);
        let Some(kind) = Kind::from_tag(tag) else {
            self.engine().node_del(raw);
            tracing::warn!(handle = %raw, tag, "unknown node kind");
            return Err(Error::UnknownNodeKind(tag));
        };
        tracing::trace!(handle = %raw, ?kind, "materialize");

        if let Some(constant) = self.constant(kind) {
            self.engine().node_del(raw);
            return Ok(Expr::Constant(Arc::clone(constant)));
        }
        if kind.is_literal() {
            return self.literal(raw, kind).map(Expr::Literal);
        }
        let handle = ResourceHandle::adopt(self.engine(), raw, Resource::Node)?;
        Ok(Expr::Operator(Arc::new(Operator::new(
            kind,
            handle,
            Arc::clone(self),
        ))))
    }

    fn literal(self: &Arc<Self>, raw: RawHandle, kind: Kind) -> Result<Arc<Literal>> {
        let context = match self.owning_context(raw) {
            Ok(c) => c,
            Err(e) => {
                self.engine().node_del(raw);
                return Err(e);
            }
        };
        let id = self.engine().node_id(raw);
        let fresh = || -> Result<Arc<Literal>> {
            let handle = ResourceHandle::adopt(self.engine(), raw, Resource::Node)?;
            Ok(Arc::new(Literal::new(kind, id, Arc::clone(&context), handle)))
        };

        let mut adopted = false;
        let cached = context.literals().get_or_create(id, || {
            adopted = true;
            fresh()
        })?;
        if adopted {
            return Ok(cached);
        }

        if cached.is_disposed() {
            // The registered wrapper was disposed explicitly; give the id a
            // live wrapper again.
            let replacement = fresh()?;
            if context.literals().replace(id, &replacement, &cached) {
                tracing::trace!(handle = %raw, id, "literal replaced");
                return Ok(replacement);
            }
            // Lost to a concurrent replacement: `replacement` owns `raw` and
            // releases it on drop.
            drop(replacement);
            return Ok(context.literals().get(id).unwrap_or(cached));
        }

        // The winner is registered and visible; the duplicate can go.
        tracing::trace!(handle = %raw, id, "duplicate literal handle released");
        self.engine().node_del(raw);
        Ok(cached)
    }

    /// The context a literal node belongs to, recovering a non-owning
    /// wrapper for handles the registry does not know.
    fn owning_context(self: &Arc<Self>, raw: RawHandle) -> Result<Arc<Context>> {
        let ctx = self.engine().node_context(raw);
        if ctx.is_null() {
            return Err(Error::UnresolvedContext(ctx));
        }
        if self.config().recover_contexts {
            self.contexts()
                .get_or_create(ctx, || Context::recovered(self, ctx))
        } else {
            self.contexts()
                .get(ctx)
                .ok_or(Error::UnresolvedContext(ctx))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, MemoryEngine};

    fn runtime() -> (Arc<MemoryEngine>, Arc<Runtime>) {
        let mem = Arc::new(MemoryEngine::new());
        let rt = Runtime::new(mem.clone()).unwrap();
        (mem, rt)
    }

    #[test]
    fn null_handle_is_invalid() {
        let (_mem, rt) = runtime();
        assert_eq!(
            rt.materialize(RawHandle::NULL).unwrap_err(),
            Error::InvalidHandle(Resource::Node)
        );
    }

    #[test]
    fn constants_release_the_raw_handle() {
        let (mem, rt) = runtime();
        let raw = mem.constant(Kind::One);
        let e = rt.materialize(raw).unwrap();
        assert!(e.ptr_eq(&Expr::Constant(rt.one().clone())));
        assert!(!mem.is_live(raw));
    }

    #[test]
    fn literal_without_context_is_unresolved() {
        let (mem, rt) = runtime();
        let ctx = mem.context_new();
        let raw = mem.context_get_var(ctx, "a");
        mem.context_del(ctx);
        assert_eq!(
            rt.materialize(raw).unwrap_err(),
            Error::UnresolvedContext(RawHandle::NULL)
        );
        assert!(!mem.is_live(raw), "raw handle released on failure");
    }

    #[test]
    fn unknown_context_is_recovered_as_borrowed() {
        let (mem, rt) = runtime();
        let ctx = mem.context_new();
        let raw = mem.context_get_var(ctx, "x");
        let Expr::Literal(lit) = rt.materialize(raw).unwrap() else {
            panic!("expected literal");
        };
        assert_eq!(lit.context().raw_handle(), ctx);
        assert!(!lit.context().is_owned());
        drop(lit);
        assert!(mem.is_live(ctx), "recovered context is not freed");
    }

    #[test]
    fn recovery_can_be_disabled() {
        let mem = Arc::new(MemoryEngine::new());
        let cfg = crate::runtime::RuntimeConfig::default().with_recover_contexts(false);
        let rt = Runtime::with_config(mem.clone(), cfg).unwrap();
        let ctx = mem.context_new();
        let raw = mem.context_get_var(ctx, "x");
        assert_eq!(
            rt.materialize(raw).unwrap_err(),
            Error::UnresolvedContext(ctx)
        );
        assert!(!mem.is_live(raw));
    }

    #[test]
    fn disposed_literal_is_replaced() {
        let (mem, rt) = runtime();
        let c = Context::new(&rt).unwrap();
        let a = c.variable("a").unwrap();
        assert!(a.dispose());
        let again = c.variable("a").unwrap();
        assert!(!Arc::ptr_eq(&a, &again));
        assert!(!again.is_disposed());
        assert!(Arc::ptr_eq(&c.literals().get(again.id()).unwrap(), &again));
        assert_eq!(mem.stats().invalid_releases, 0);
    }
}
