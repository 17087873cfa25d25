//! Typed wrappers over engine nodes.
//!
//! Constants and literals are interned, so two wrappers for the same
//! constant or the same (context, id) pair are the same `Arc`. Operators are
//! fresh on every engine call. `Expr` equality and hashing are by identity;
//! use [`Expr::equiv`] for logical equivalence.

use crate::context::Context;
use crate::engine::{Engine, Kind, Measure, Property, RawHandle, Transform};
use crate::error::{Error, Result};
use crate::resource::{ensure_live_operands, Resource, ResourceHandle};
use crate::runtime::Runtime;
use crate::seq::{ExprIter, Point, PointIter};
use core::fmt;
use core::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

/// One of the four constant singletons. Owned by its runtime; never
/// disposed.
pub struct Constant {
    kind: Kind,
    handle: ResourceHandle,
    runtime: Weak<Runtime>,
}

impl Constant {
    pub(crate) fn new(kind: Kind, handle: ResourceHandle, runtime: Weak<Runtime>) -> Self {
        Self {
            kind,
            handle,
            runtime,
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// `Some` for Zero and One.
    pub fn value(&self) -> Option<bool> {
        match self.kind {
            Kind::Zero => Some(false),
            Kind::One => Some(true),
            _ => None,
        }
    }

    pub fn raw_handle(&self) -> RawHandle {
        self.handle.raw_handle()
    }
}

/// A variable or its complement, unique per (context, id).
pub struct Literal {
    kind: Kind,
    id: u32,
    context: Arc<Context>,
    handle: ResourceHandle,
}

impl Literal {
    pub(crate) fn new(kind: Kind, id: u32, context: Arc<Context>, handle: ResourceHandle) -> Self {
        Self {
            kind,
            id,
            context,
            handle,
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn raw_handle(&self) -> RawHandle {
        self.handle.raw_handle()
    }

    pub fn is_variable(&self) -> bool {
        self.kind == Kind::Variable
    }

    /// The positive variable of this literal.
    pub fn abs(&self) -> Result<Arc<Literal>> {
        let rt = self.context.runtime();
        let raw = rt.engine().literal_abs(self.handle.get()?);
        expect_literal(rt.settle(raw, &[&self.handle])?)
    }

    /// Release the engine node. The next time the engine hands out this
    /// literal a new wrapper takes its place in the registry.
    pub fn dispose(&self) -> bool {
        self.handle.release()
    }

    pub fn is_disposed(&self) -> bool {
        self.handle.is_released()
    }
}

/// A structural node. Not interned.
pub struct Operator {
    kind: Kind,
    handle: ResourceHandle,
    runtime: Arc<Runtime>,
}

impl Operator {
    pub(crate) fn new(kind: Kind, handle: ResourceHandle, runtime: Arc<Runtime>) -> Self {
        Self {
            kind,
            handle,
            runtime,
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn raw_handle(&self) -> RawHandle {
        self.handle.raw_handle()
    }

    pub fn args(&self) -> Result<Vec<Expr>> {
        let raw = self.runtime.engine().args(self.handle.get()?);
        ensure_live_operands(raw, &[&self.handle])?;
        ExprIter::new(&self.runtime, raw)?.collect()
    }

    fn test(&self, what: Property) -> Result<bool> {
        let answer = self.runtime.engine().test(self.handle.get()?, what);
        // The answer is only meaningful if the handle stayed live.
        self.handle.get()?;
        Ok(answer)
    }

    /// An Or or And over literals only.
    pub fn is_clause(&self) -> Result<bool> {
        self.test(Property::Clause)
    }

    /// Already in the form simplification would produce.
    pub fn is_simple(&self) -> Result<bool> {
        self.test(Property::Simple)
    }

    pub fn dispose(&self) -> bool {
        self.handle.release()
    }

    pub fn is_disposed(&self) -> bool {
        self.handle.is_released()
    }
}

const TOO_MANY_VARS: Error = Error::ArgumentInvalid {
    name: "vars",
    reason: "too many variables to enumerate",
};

#[derive(Clone)]
pub enum Expr {
    Constant(Arc<Constant>),
    Literal(Arc<Literal>),
    Operator(Arc<Operator>),
}

pub(crate) fn expect_literal(e: Expr) -> Result<Arc<Literal>> {
    match e {
        Expr::Literal(l) => Ok(l),
        other => Err(Error::KindMismatch {
            expected: "literal",
            found: other.kind(),
        }),
    }
}

pub(crate) fn expect_constant(e: Expr) -> Result<Arc<Constant>> {
    match e {
        Expr::Constant(c) => Ok(c),
        other => Err(Error::KindMismatch {
            expected: "constant",
            found: other.kind(),
        }),
    }
}

impl Expr {
    pub fn kind(&self) -> Kind {
        match self {
            Expr::Constant(c) => c.kind,
            Expr::Literal(l) => l.kind,
            Expr::Operator(o) => o.kind,
        }
    }

    pub(crate) fn handle(&self) -> &ResourceHandle {
        match self {
            Expr::Constant(c) => &c.handle,
            Expr::Literal(l) => &l.handle,
            Expr::Operator(o) => &o.handle,
        }
    }

    pub fn raw_handle(&self) -> RawHandle {
        self.handle().raw_handle()
    }

    fn addr(&self) -> *const () {
        match self {
            Expr::Constant(c) => Arc::as_ptr(c).cast(),
            Expr::Literal(l) => Arc::as_ptr(l).cast(),
            Expr::Operator(o) => Arc::as_ptr(o).cast(),
        }
    }

    /// Same wrapper instance.
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        core::ptr::eq(self.addr(), other.addr())
    }

    pub fn runtime(&self) -> Result<Arc<Runtime>> {
        match self {
            Expr::Constant(c) => c.runtime.upgrade().ok_or(Error::ArgumentInvalid {
                name: "self",
                reason: "constant outlived its runtime",
            }),
            Expr::Literal(l) => Ok(Arc::clone(l.context.runtime())),
            Expr::Operator(o) => Ok(Arc::clone(&o.runtime)),
        }
    }

    pub(crate) fn belongs_to(&self, rt: &Arc<Runtime>) -> bool {
        match self {
            Expr::Constant(c) => core::ptr::eq(c.runtime.as_ptr(), Arc::as_ptr(rt)),
            Expr::Literal(l) => Arc::ptr_eq(l.context.runtime(), rt),
            Expr::Operator(o) => Arc::ptr_eq(&o.runtime, rt),
        }
    }

    pub fn as_constant(&self) -> Option<&Arc<Constant>> {
        match self {
            Expr::Constant(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Arc<Literal>> {
        match self {
            Expr::Literal(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_operator(&self) -> Option<&Arc<Operator>> {
        match self {
            Expr::Operator(o) => Some(o),
            _ => None,
        }
    }

    /// Run `f` on this node's handle and materialize the node it returns.
    fn derive<F>(&self, f: F) -> Result<Expr>
    where
        F: FnOnce(&dyn Engine, RawHandle) -> RawHandle,
    {
        self.derive_with(&[], f)
    }

    /// `derive` for engine calls that also borrow `operands`.
    fn derive_with<F>(&self, operands: &[&ResourceHandle], f: F) -> Result<Expr>
    where
        F: FnOnce(&dyn Engine, RawHandle) -> RawHandle,
    {
        let rt = self.runtime()?;
        let raw = f(rt.engine().as_ref(), self.handle().get()?);
        let mut involved = vec![self.handle()];
        involved.extend_from_slice(operands);
        rt.settle(raw, &involved)
    }

    /// Run a query on this node's handle. Fails if the handle was released
    /// before the answer came back.
    fn query<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Engine, RawHandle) -> T,
    {
        let h = self.handle();
        let answer = f(h.engine().as_ref(), h.get()?);
        h.get()?;
        Ok(answer)
    }

    pub fn not(&self) -> Result<Expr> {
        self.derive(|e, h| e.not(h))
    }

    fn transform(&self, how: Transform) -> Result<Expr> {
        self.derive(|e, h| e.transform(h, how))
    }

    pub fn simplify(&self) -> Result<Expr> {
        self.transform(Transform::Simplify)
    }

    pub fn to_cnf(&self) -> Result<Expr> {
        self.transform(Transform::Cnf)
    }

    pub fn to_dnf(&self) -> Result<Expr> {
        self.transform(Transform::Dnf)
    }

    pub fn to_nnf(&self) -> Result<Expr> {
        self.transform(Transform::Nnf)
    }

    pub fn to_binary_op(&self) -> Result<Expr> {
        self.transform(Transform::BinaryOp)
    }

    pub fn to_lattice_op(&self) -> Result<Expr> {
        self.transform(Transform::LatticeOp)
    }

    pub fn to_positive_op(&self) -> Result<Expr> {
        self.transform(Transform::PositiveOp)
    }

    /// Tseytin encoding; auxiliary variables `{aux}_0`, `{aux}_1`, ... are
    /// created in `ctx`.
    pub fn tseytin(&self, ctx: &Context, aux: &str) -> Result<Expr> {
        if aux.is_empty() {
            return Err(Error::ArgumentNull("aux"));
        }
        let ctx_raw = ctx.handle().get()?;
        self.derive_with(&[ctx.handle()], |e, h| e.tseytin(h, ctx_raw, aux))
    }

    /// Shannon expansion over `vars`. Fails with `ArgumentInvalid` when the
    /// engine will not enumerate that many variables.
    pub fn expand(&self, vars: &[Arc<Literal>]) -> Result<Expr> {
        let rt = self.runtime()?;
        let raws = vars
            .iter()
            .map(|v| v.handle.get())
            .collect::<Result<Vec<_>>>()?;
        let raw = rt.engine().expand(self.handle().get()?, &raws);
        let mut involved: Vec<&ResourceHandle> = vars.iter().map(|v| &v.handle).collect();
        involved.push(self.handle());
        ensure_live_operands(raw, &involved)?;
        if raw.is_null() {
            return Err(TOO_MANY_VARS);
        }
        rt.materialize(raw)
    }

    /// Substitute constants for variables.
    pub fn restrict(&self, point: &[(Arc<Literal>, Arc<Constant>)]) -> Result<Expr> {
        let raws = point
            .iter()
            .map(|(v, c)| Ok((v.handle.get()?, c.handle.get()?)))
            .collect::<Result<Vec<_>>>()?;
        let involved: Vec<&ResourceHandle> = point.iter().map(|(v, _)| &v.handle).collect();
        self.derive_with(&involved, |e, h| e.restrict(h, &raws))
    }

    /// Substitute expressions for variables.
    pub fn compose(&self, map: &[(Arc<Literal>, Expr)]) -> Result<Expr> {
        let rt = self.runtime()?;
        let raws = map
            .iter()
            .map(|(v, x)| Ok((v.handle.get()?, rt.operand(x)?)))
            .collect::<Result<Vec<_>>>()?;
        let involved: Vec<&ResourceHandle> = map
            .iter()
            .flat_map(|(v, x)| [&v.handle, x.handle()])
            .collect();
        self.derive_with(&involved, |e, h| e.compose(h, &raws))
    }

    /// A satisfying point, or `None` if unsatisfiable.
    pub fn sat(&self) -> Result<Option<Point>> {
        let rt = self.runtime()?;
        let raw = rt.engine().sat(self.handle().get()?);
        ensure_live_operands(raw, &[self.handle()])?;
        if raw.is_null() {
            return Ok(None);
        }
        Point::from_raw(&rt, raw).map(Some)
    }

    pub fn equiv(&self, other: &Expr) -> Result<bool> {
        let rt = self.runtime()?;
        let theirs = rt.operand(other)?;
        let answer = self.query(|e, h| e.equiv(h, theirs))?;
        other.handle().get()?;
        Ok(answer)
    }

    /// Variables this expression depends on.
    pub fn support(&self) -> Result<Vec<Arc<Literal>>> {
        let rt = self.runtime()?;
        let raw = rt.engine().support(self.handle().get()?);
        ensure_live_operands(raw, &[self.handle()])?;
        ExprIter::new(&rt, raw)?
            .map(|e| e.and_then(expect_literal))
            .collect()
    }

    pub fn depth(&self) -> Result<u32> {
        self.query(|e, h| e.measure(h, Measure::Depth))
    }

    pub fn size(&self) -> Result<u32> {
        self.query(|e, h| e.measure(h, Measure::Size))
    }

    pub fn degree(&self) -> Result<u32> {
        self.query(|e, h| e.measure(h, Measure::Degree))
    }

    pub fn is_cnf(&self) -> Result<bool> {
        self.query(|e, h| e.test(h, Property::Cnf))
    }

    pub fn is_dnf(&self) -> Result<bool> {
        self.query(|e, h| e.test(h, Property::Dnf))
    }

    /// Post-order traversal of every node.
    pub fn iter_dfs(&self) -> Result<ExprIter> {
        let rt = self.runtime()?;
        let raw = rt.engine().dfs(self.handle().get()?);
        ensure_live_operands(raw, &[self.handle()])?;
        ExprIter::new(&rt, raw)
    }

    /// Every point over the support. Fails with `ArgumentInvalid` when the
    /// support is larger than the engine will enumerate.
    pub fn iter_domain(&self) -> Result<PointIter> {
        let rt = self.runtime()?;
        let raw = rt.engine().domain(self.handle().get()?);
        ensure_live_operands(raw, &[self.handle()])?;
        if raw.is_null() {
            return Err(TOO_MANY_VARS);
        }
        PointIter::new(&rt, raw)
    }

    /// The cofactor for every point over `vars`.
    pub fn iter_cofactors(&self, vars: &[Arc<Literal>]) -> Result<ExprIter> {
        let rt = self.runtime()?;
        let raws = vars
            .iter()
            .map(|v| v.handle.get())
            .collect::<Result<Vec<_>>>()?;
        let raw = rt.engine().cofactors(self.handle().get()?, &raws);
        let mut involved: Vec<&ResourceHandle> = vars.iter().map(|v| &v.handle).collect();
        involved.push(self.handle());
        ensure_live_operands(raw, &involved)?;
        if raw.is_null() {
            return Err(TOO_MANY_VARS);
        }
        ExprIter::new(&rt, raw)
    }

    /// Release the engine node. Constants belong to the runtime and are
    /// left alone.
    pub fn dispose(&self) -> bool {
        match self {
            Expr::Constant(_) => false,
            Expr::Literal(l) => l.dispose(),
            Expr::Operator(o) => o.dispose(),
        }
    }

    /// Engine rendering of this expression.
    pub fn to_text(&self) -> Result<String> {
        render(self.handle())
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        display(self.handle(), self.kind(), f)
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expr")
            .field("kind", &self.kind())
            .field("handle", &self.raw_handle())
            .field("text", &format_args!("{self}"))
            .finish()
    }
}

fn render(h: &ResourceHandle) -> Result<String> {
    let engine = h.engine();
    let text = ResourceHandle::adopt(engine, engine.render(h.get()?), Resource::Text)?;
    Ok(engine.text_copy(text.get()?))
}

fn display(h: &ResourceHandle, kind: Kind, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match render(h) {
        Ok(s) => f.write_str(&s),
        Err(_) => write!(f, "<released {}>", kind.name()),
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        display(&self.handle, self.kind, f)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        display(&self.handle, self.kind, f)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        display(&self.handle, self.kind, f)
    }
}

impl fmt::Debug for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constant").field("kind", &self.kind).finish()
    }
}

impl fmt::Debug for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Literal")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("handle", &self.handle.raw_handle())
            .field("context", &self.context.raw_handle())
            .finish()
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("kind", &self.kind)
            .field("handle", &self.handle.raw_handle())
            .finish()
    }
}

impl From<Arc<Constant>> for Expr {
    fn from(c: Arc<Constant>) -> Self {
        Expr::Constant(c)
    }
}

impl From<&Arc<Constant>> for Expr {
    fn from(c: &Arc<Constant>) -> Self {
        Expr::Constant(Arc::clone(c))
    }
}

impl From<Arc<Literal>> for Expr {
    fn from(l: Arc<Literal>) -> Self {
        Expr::Literal(l)
    }
}

impl From<&Arc<Literal>> for Expr {
    fn from(l: &Arc<Literal>) -> Self {
        Expr::Literal(Arc::clone(l))
    }
}

impl From<Arc<Operator>> for Expr {
    fn from(o: Arc<Operator>) -> Self {
        Expr::Operator(o)
    }
}
