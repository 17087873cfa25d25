//! Consumers for engine sequences and points.
//!
//! Each iterator owns its sequence handle and releases it when exhausted or
//! dropped. Items are materialized one at a time as they are pulled.

use crate::engine::RawHandle;
use crate::error::Result;
use crate::expr::{expect_constant, expect_literal, Constant, Expr, Literal};
use crate::resource::{Resource, ResourceHandle};
use crate::runtime::Runtime;
use std::sync::Arc;

/// An assignment of constants to variables.
#[derive(Clone, Debug, Default)]
pub struct Point {
    entries: Vec<(Arc<Literal>, Arc<Constant>)>,
}

impl Point {
    /// Drain an owned point handle.
    pub(crate) fn from_raw(rt: &Arc<Runtime>, raw: RawHandle) -> Result<Point> {
        let point = ResourceHandle::adopt(rt.engine(), raw, Resource::Point)?;
        let mut entries = Vec::new();
        while let Some((var, value)) = rt.engine().point_next(point.get()?) {
            // Materialize both before propagating so neither handle leaks.
            let var = rt.materialize(var);
            let value = rt.materialize(value);
            entries.push((expect_literal(var?)?, expect_constant(value?)?));
        }
        Ok(Point { entries })
    }

    /// The value assigned to `var`, matched by identity.
    pub fn get(&self, var: &Arc<Literal>) -> Option<&Arc<Constant>> {
        self.entries
            .iter()
            .find(|(v, _)| Arc::ptr_eq(v, var))
            .map(|(_, c)| c)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Arc<Literal>, Arc<Constant>)> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[(Arc<Literal>, Arc<Constant>)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct Sequence {
    runtime: Arc<Runtime>,
    handle: ResourceHandle,
}

impl Sequence {
    fn new(rt: &Arc<Runtime>, raw: RawHandle) -> Result<Self> {
        Ok(Self {
            runtime: Arc::clone(rt),
            handle: ResourceHandle::adopt(rt.engine(), raw, Resource::Sequence)?,
        })
    }

    /// Next raw item; releases the sequence at the end.
    fn next_raw(&mut self) -> Option<RawHandle> {
        let seq = self.handle.get().ok()?;
        let item = self.runtime.engine().seq_next(seq);
        if item.is_null() {
            self.handle.release();
            return None;
        }
        Some(item)
    }
}

/// Iterator over node items (arguments, support, traversal, cofactors).
pub struct ExprIter {
    seq: Sequence,
}

impl ExprIter {
    pub(crate) fn new(rt: &Arc<Runtime>, raw: RawHandle) -> Result<Self> {
        Ok(Self {
            seq: Sequence::new(rt, raw)?,
        })
    }
}

impl Iterator for ExprIter {
    type Item = Result<Expr>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.seq.next_raw()?;
        Some(self.seq.runtime.materialize(raw))
    }
}

/// Iterator over point items (domain enumeration).
pub struct PointIter {
    seq: Sequence,
}

impl PointIter {
    pub(crate) fn new(rt: &Arc<Runtime>, raw: RawHandle) -> Result<Self> {
        Ok(Self {
            seq: Sequence::new(rt, raw)?,
        })
    }
}

impl std::fmt::Debug for PointIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointIter").finish_non_exhaustive()
    }
}

impl Iterator for PointIter {
    type Item = Result<Point>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.seq.next_raw()?;
        Some(Point::from_raw(&self.seq.runtime, raw))
    }
}
