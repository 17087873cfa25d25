//! ResourceHandle: one engine handle bound to one wrapper.
//!
//! The handle is stored in an atomic and swapped to null on release, so the
//! engine's free function runs at most once no matter how many threads race
//! an explicit release against each other or against `Drop`. Release touches
//! nothing but the engine: no caches, no other wrappers, no shared locks.

use crate::engine::{Engine, RawHandle};
use crate::epoch;
use crate::error::{Error, Result};
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The engine resource type a handle refers to; selects the free function.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Resource {
    Context,
    Node,
    Sequence,
    Point,
    Text,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resource::Context => "context",
            Resource::Node => "node",
            Resource::Sequence => "sequence",
            Resource::Point => "point",
            Resource::Text => "text",
        })
    }
}

pub struct ResourceHandle {
    raw: AtomicU64,
    resource: Resource,
    owned: bool,
    engine: Arc<dyn Engine>,
}

impl ResourceHandle {
    /// Take ownership of `raw`. Released through the engine exactly once.
    pub fn adopt(engine: &Arc<dyn Engine>, raw: RawHandle, resource: Resource) -> Result<Self> {
        Self::bind(engine, raw, resource, true)
    }

    /// Track `raw` without owning it. Release only clears the handle.
    pub fn borrowed(engine: &Arc<dyn Engine>, raw: RawHandle, resource: Resource) -> Result<Self> {
        Self::bind(engine, raw, resource, false)
    }

    fn bind(
        engine: &Arc<dyn Engine>,
        raw: RawHandle,
        resource: Resource,
        owned: bool,
    ) -> Result<Self> {
        if raw.is_null() {
            return Err(Error::InvalidHandle(resource));
        }
        tracing::trace!(handle = %raw, %resource, owned, "adopt");
        Ok(Self {
            raw: AtomicU64::new(raw.into_raw()),
            resource,
            owned,
            engine: Arc::clone(engine),
        })
    }

    /// Current handle; null once released.
    #[inline]
    pub fn raw_handle(&self) -> RawHandle {
        RawHandle::from_raw(self.raw.load(Ordering::Acquire))
    }

    /// Current handle, or `UseAfterRelease`.
    #[inline]
    pub fn get(&self) -> Result<RawHandle> {
        let raw = self.raw_handle();
        if raw.is_null() {
            Err(Error::UseAfterRelease(self.resource))
        } else {
            Ok(raw)
        }
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    pub fn is_released(&self) -> bool {
        self.raw_handle().is_null()
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Release the handle. Returns true for the one call that performed the
    /// release; every later call is a no-op returning false.
    pub fn release(&self) -> bool {
        let raw = RawHandle::from_raw(self.raw.swap(0, Ordering::AcqRel));
        if raw.is_null() {
            return false;
        }
        tracing::trace!(handle = %raw, resource = %self.resource, owned = self.owned, "release");
        if self.owned {
            free(self.engine.as_ref(), self.resource, raw);
        }
        true
    }
}

/// Check the result of an engine call that borrowed `operands`. A null
/// result after one of them was released mid-call is `UseAfterRelease`; the
/// engine only saw a freed handle.
pub(crate) fn ensure_live_operands(raw: RawHandle, operands: &[&ResourceHandle]) -> Result<()> {
    if !raw.is_null() {
        return Ok(());
    }
    match operands.iter().find(|h| h.is_released()) {
        Some(h) => Err(Error::UseAfterRelease(h.resource())),
        None => Ok(()),
    }
}

fn free(engine: &dyn Engine, resource: Resource, raw: RawHandle) {
    match resource {
        Resource::Context => engine.context_del(raw),
        Resource::Node => engine.node_del(raw),
        Resource::Sequence => engine.seq_del(raw),
        Resource::Point => engine.point_del(raw),
        Resource::Text => engine.text_del(raw),
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        self.release();
        epoch::advance();
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("raw", &self.raw_handle())
            .field("resource", &self.resource)
            .field("owned", &self.owned)
            .finish()
    }
}
