//! In-process reference engine.
//!
//! Objects live in a `SlotMap`; a handle is the slot key in FFI form, so a
//! released handle value is never handed out again. Every call that yields
//! a node allocates a fresh handle, even for constants and for a variable
//! that was looked up before.

use super::algebra::{self, Ctx, NodeRef};
use super::{Engine, Kind, Measure, Property, RawHandle, Transform};
use parking_lot::Mutex;
use slotmap::{DefaultKey, Key, KeyData, SlotMap};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Allocation counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub allocated: u64,
    pub released: u64,
    /// `*_del` calls on null, unknown, already-released or mistyped handles.
    pub invalid_releases: u64,
    pub live: usize,
}

/// Tag reported for handles that are not live nodes. Outside `Kind`'s range.
pub const NOT_A_NODE: u8 = 0xFF;

type Point = VecDeque<(NodeRef, NodeRef)>;

enum Item {
    Node(NodeRef),
    Point(Point),
}

enum Object {
    Context(Arc<Ctx>),
    Node(NodeRef),
    Sequence(VecDeque<Item>),
    Point(Point),
    Text(String),
}

impl Object {
    fn label(&self) -> &'static str {
        match self {
            Object::Context(_) => "context",
            Object::Node(_) => "node",
            Object::Sequence(_) => "sequence",
            Object::Point(_) => "point",
            Object::Text(_) => "text",
        }
    }
}

#[derive(Default)]
struct State {
    objects: SlotMap<DefaultKey, Object>,
    // Context serial -> its live handle.
    contexts: HashMap<u64, RawHandle>,
    allocated: u64,
    released: u64,
    invalid_releases: u64,
}

fn slot(h: RawHandle) -> Option<DefaultKey> {
    (!h.is_null()).then(|| KeyData::from_ffi(h.into_raw()).into())
}

impl State {
    fn alloc(&mut self, obj: Object) -> RawHandle {
        self.allocated += 1;
        RawHandle::from_raw(self.objects.insert(obj).data().as_ffi())
    }

    fn alloc_node(&mut self, node: NodeRef) -> RawHandle {
        self.alloc(Object::Node(node))
    }

    fn alloc_opt(&mut self, node: Option<NodeRef>) -> RawHandle {
        node.map_or(RawHandle::NULL, |n| self.alloc_node(n))
    }

    fn node(&self, h: RawHandle) -> Option<NodeRef> {
        match self.objects.get(slot(h)?)? {
            Object::Node(n) => Some(Arc::clone(n)),
            _ => None,
        }
    }

    fn nodes(&self, hs: &[RawHandle]) -> Option<Vec<NodeRef>> {
        hs.iter().map(|&h| self.node(h)).collect()
    }

    fn pairs(&self, hs: &[(RawHandle, RawHandle)]) -> Option<Vec<(NodeRef, NodeRef)>> {
        hs.iter()
            .map(|&(a, b)| Some((self.node(a)?, self.node(b)?)))
            .collect()
    }

    fn context(&self, h: RawHandle) -> Option<Arc<Ctx>> {
        match self.objects.get(slot(h)?)? {
            Object::Context(c) => Some(Arc::clone(c)),
            _ => None,
        }
    }

    /// Free `h` if it names an object of the expected type.
    fn release(&mut self, h: RawHandle, expected: &'static str, matches: fn(&Object) -> bool) {
        let found = slot(h).and_then(|k| self.objects.get(k).map(|o| (k, matches(o), o.label())));
        match found {
            Some((k, true, _)) => {
                self.objects.remove(k);
                self.released += 1;
            }
            Some((_, false, actual)) => {
                self.invalid_releases += 1;
                tracing::warn!(handle = %h, expected, actual, "release of mistyped handle");
            }
            None => {
                self.invalid_releases += 1;
                tracing::warn!(handle = %h, expected, "release of unknown handle");
            }
        }
    }
}

/// Handle-based engine that keeps every object in process memory.
#[derive(Default)]
pub struct MemoryEngine {
    state: Mutex<State>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> EngineStats {
        let st = self.state.lock();
        EngineStats {
            allocated: st.allocated,
            released: st.released,
            invalid_releases: st.invalid_releases,
            live: st.objects.len(),
        }
    }

    /// Whether `h` currently names a live object.
    pub fn is_live(&self, h: RawHandle) -> bool {
        slot(h).is_some_and(|k| self.state.lock().objects.contains_key(k))
    }

    fn with_node<T>(&self, h: RawHandle, default: T, f: impl FnOnce(&NodeRef) -> T) -> T {
        let node = self.state.lock().node(h);
        node.as_ref().map_or(default, f)
    }

    /// Map a node handle through `f` and allocate the result.
    fn derive(&self, h: RawHandle, f: impl FnOnce(&NodeRef) -> Option<NodeRef>) -> RawHandle {
        let Some(node) = self.state.lock().node(h) else {
            return RawHandle::NULL;
        };
        let out = f(&node);
        self.state.lock().alloc_opt(out)
    }

    fn sequence(&self, items: Option<Vec<Item>>) -> RawHandle {
        match items {
            Some(items) => self.state.lock().alloc(Object::Sequence(items.into())),
            None => RawHandle::NULL,
        }
    }

    fn node_items(nodes: Vec<NodeRef>) -> Vec<Item> {
        nodes.into_iter().map(Item::Node).collect()
    }
}

impl Engine for MemoryEngine {
    fn context_new(&self) -> RawHandle {
        let ctx = Arc::new(Ctx::new());
        let serial = ctx.serial();
        let mut st = self.state.lock();
        let h = st.alloc(Object::Context(ctx));
        st.contexts.insert(serial, h);
        h
    }

    fn context_del(&self, ctx: RawHandle) {
        let mut st = self.state.lock();
        if let Some(c) = st.context(ctx) {
            st.contexts.remove(&c.serial());
        }
        st.release(ctx, "context", |o| matches!(o, Object::Context(_)));
    }

    fn context_get_var(&self, ctx: RawHandle, name: &str) -> RawHandle {
        let mut st = self.state.lock();
        let Some(c) = st.context(ctx) else {
            return RawHandle::NULL;
        };
        let var = algebra::variable(&c, c.var_index(name));
        st.alloc_node(var)
    }

    fn constant(&self, kind: Kind) -> RawHandle {
        if !kind.is_constant() {
            return RawHandle::NULL;
        }
        self.state.lock().alloc_node(algebra::constant(kind))
    }

    fn node_kind(&self, node: RawHandle) -> u8 {
        self.with_node(node, NOT_A_NODE, |n| n.kind().tag())
    }

    fn node_context(&self, node: RawHandle) -> RawHandle {
        let st = self.state.lock();
        st.node(node)
            .and_then(|n| n.context().and_then(|c| st.contexts.get(&c.serial()).copied()))
            .unwrap_or(RawHandle::NULL)
    }

    fn node_id(&self, node: RawHandle) -> u32 {
        self.with_node(node, 0, |n| n.literal_id().unwrap_or(0))
    }

    fn node_del(&self, node: RawHandle) {
        self.state
            .lock()
            .release(node, "node", |o| matches!(o, Object::Node(_)));
    }

    fn not(&self, node: RawHandle) -> RawHandle {
        self.derive(node, |n| Some(algebra::negate(n)))
    }

    fn apply(&self, kind: Kind, args: &[RawHandle]) -> RawHandle {
        if !kind.is_operator() {
            return RawHandle::NULL;
        }
        let mut st = self.state.lock();
        let args = st.nodes(args);
        let node = args.map(|args| algebra::op(kind, args));
        st.alloc_opt(node)
    }

    fn transform(&self, node: RawHandle, how: Transform) -> RawHandle {
        self.derive(node, |n| {
            Some(match how {
                Transform::Simplify => algebra::simplify(n),
                Transform::Cnf => algebra::cnf(n),
                Transform::Dnf => algebra::dnf(n),
                Transform::Nnf => algebra::nnf(n),
                Transform::BinaryOp => algebra::binarize(n),
                Transform::LatticeOp => algebra::lattice_op(n),
                Transform::PositiveOp => algebra::positive(n),
            })
        })
    }

    fn tseytin(&self, node: RawHandle, ctx: RawHandle, aux: &str) -> RawHandle {
        let Some(c) = self.state.lock().context(ctx) else {
            return RawHandle::NULL;
        };
        self.derive(node, |n| Some(algebra::tseytin(n, &c, aux)))
    }

    fn expand(&self, node: RawHandle, vars: &[RawHandle]) -> RawHandle {
        let Some(vars) = self.state.lock().nodes(vars) else {
            return RawHandle::NULL;
        };
        self.derive(node, |n| algebra::expand(n, &vars))
    }

    fn restrict(&self, node: RawHandle, point: &[(RawHandle, RawHandle)]) -> RawHandle {
        let Some(point) = self.state.lock().pairs(point) else {
            return RawHandle::NULL;
        };
        self.derive(node, |n| algebra::restrict(n, &point))
    }

    fn compose(&self, node: RawHandle, map: &[(RawHandle, RawHandle)]) -> RawHandle {
        let Some(map) = self.state.lock().pairs(map) else {
            return RawHandle::NULL;
        };
        self.derive(node, |n| algebra::compose(n, &map))
    }

    fn literal_abs(&self, lit: RawHandle) -> RawHandle {
        self.derive(lit, algebra::abs)
    }

    fn measure(&self, node: RawHandle, what: Measure) -> u32 {
        self.with_node(node, 0, |n| match what {
            Measure::Depth => algebra::depth(n),
            Measure::Size => algebra::size(n),
            Measure::Degree => algebra::support(n).len() as u32,
        })
    }

    fn test(&self, node: RawHandle, what: Property) -> bool {
        self.with_node(node, false, |n| match what {
            Property::Cnf => algebra::is_cnf(n),
            Property::Dnf => algebra::is_dnf(n),
            Property::Clause => algebra::is_clause(n),
            Property::Simple => algebra::is_simple(n),
        })
    }

    fn equiv(&self, a: RawHandle, b: RawHandle) -> bool {
        let (a, b) = {
            let st = self.state.lock();
            (st.node(a), st.node(b))
        };
        match (a, b) {
            (Some(a), Some(b)) => algebra::equiv(&a, &b),
            _ => false,
        }
    }

    fn sat(&self, node: RawHandle) -> RawHandle {
        let Some(node) = self.state.lock().node(node) else {
            return RawHandle::NULL;
        };
        match algebra::sat(&node) {
            Some(point) => self.state.lock().alloc(Object::Point(point.into())),
            None => RawHandle::NULL,
        }
    }

    fn point_next(&self, point: RawHandle) -> Option<(RawHandle, RawHandle)> {
        let mut st = self.state.lock();
        let (var, value) = match st.objects.get_mut(slot(point)?)? {
            Object::Point(entries) => entries.pop_front()?,
            _ => return None,
        };
        Some((st.alloc_node(var), st.alloc_node(value)))
    }

    fn point_del(&self, point: RawHandle) {
        self.state
            .lock()
            .release(point, "point", |o| matches!(o, Object::Point(_)));
    }

    fn args(&self, node: RawHandle) -> RawHandle {
        let items = self.with_node(node, None, |n| Some(Self::node_items(n.args().to_vec())));
        self.sequence(items)
    }

    fn support(&self, node: RawHandle) -> RawHandle {
        let items = self.with_node(node, None, |n| {
            Some(Self::node_items(algebra::support(n).into_values().collect()))
        });
        self.sequence(items)
    }

    fn dfs(&self, node: RawHandle) -> RawHandle {
        let items = self.with_node(node, None, |n| Some(Self::node_items(algebra::dfs(n))));
        self.sequence(items)
    }

    fn domain(&self, node: RawHandle) -> RawHandle {
        let items = self.with_node(node, None, |n| {
            algebra::domain(n).map(|points| {
                points
                    .into_iter()
                    .map(|p| Item::Point(p.into()))
                    .collect()
            })
        });
        self.sequence(items)
    }

    fn cofactors(&self, node: RawHandle, vars: &[RawHandle]) -> RawHandle {
        let Some(vars) = self.state.lock().nodes(vars) else {
            return RawHandle::NULL;
        };
        let items = self
            .with_node(node, None, |n| algebra::cofactors(n, &vars))
            .map(Self::node_items);
        self.sequence(items)
    }

    fn seq_next(&self, seq: RawHandle) -> RawHandle {
        let mut st = self.state.lock();
        let Some(k) = slot(seq) else {
            return RawHandle::NULL;
        };
        let item = match st.objects.get_mut(k) {
            Some(Object::Sequence(items)) => items.pop_front(),
            _ => None,
        };
        match item {
            Some(Item::Node(n)) => st.alloc_node(n),
            Some(Item::Point(p)) => st.alloc(Object::Point(p)),
            None => RawHandle::NULL,
        }
    }

    fn seq_del(&self, seq: RawHandle) {
        self.state
            .lock()
            .release(seq, "sequence", |o| matches!(o, Object::Sequence(_)));
    }

    fn render(&self, node: RawHandle) -> RawHandle {
        let Some(text) = self.with_node(node, None, |n| Some(algebra::render(n))) else {
            return RawHandle::NULL;
        };
        self.state.lock().alloc(Object::Text(text))
    }

    fn text_copy(&self, text: RawHandle) -> String {
        let st = self.state.lock();
        match slot(text).and_then(|k| st.objects.get(k)) {
            Some(Object::Text(s)) => s.clone(),
            _ => String::new(),
        }
    }

    fn text_del(&self, text: RawHandle) {
        self.state
            .lock()
            .release(text, "text", |o| matches!(o, Object::Text(_)));
    }
}
