//! Expression trees behind `MemoryEngine`.
//!
//! Trees are immutable and shared through `Arc`. Satisfiability and
//! equivalence split on support variables and simplify after each
//! assignment. Normal forms distribute over the NNF. Only point
//! enumeration (domain, expansion, cofactors) is capped, at
//! [`MAX_ENUMERATED_VARS`] variables.

use super::Kind;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Largest variable set whose points will be enumerated.
pub const MAX_ENUMERATED_VARS: usize = 20;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

#[derive(Default)]
struct VarTable {
    names: Vec<String>,
    by_name: HashMap<String, u32>,
}

pub(crate) struct Ctx {
    serial: u64,
    vars: Mutex<VarTable>,
}

impl Ctx {
    pub fn new() -> Self {
        Self {
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            vars: Mutex::new(VarTable::default()),
        }
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Index of variable `name`, allocating it on first use.
    pub fn var_index(&self, name: &str) -> u32 {
        let mut vars = self.vars.lock();
        if let Some(&idx) = vars.by_name.get(name) {
            return idx;
        }
        let idx = vars.names.len() as u32;
        vars.names.push(name.to_owned());
        vars.by_name.insert(name.to_owned(), idx);
        idx
    }

    fn name(&self, index: u32) -> String {
        self.vars
            .lock()
            .names
            .get(index as usize)
            .cloned()
            .unwrap_or_else(|| format!("v{index}"))
    }
}

/// Identity of a variable: owning context and variable index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct VarKey(u64, u32);

pub(crate) enum Node {
    Const(Kind),
    /// `id` is `2 * index` for the variable and `2 * index + 1` for its
    /// complement.
    Lit { ctx: Arc<Ctx>, id: u32 },
    Op { kind: Kind, args: Vec<NodeRef> },
}

pub(crate) type NodeRef = Arc<Node>;

impl Node {
    pub fn kind(&self) -> Kind {
        match self {
            Node::Const(k) => *k,
            Node::Lit { id, .. } if id & 1 == 1 => Kind::Complement,
            Node::Lit { .. } => Kind::Variable,
            Node::Op { kind, .. } => *kind,
        }
    }

    pub fn context(&self) -> Option<&Arc<Ctx>> {
        match self {
            Node::Lit { ctx, .. } => Some(ctx),
            _ => None,
        }
    }

    pub fn literal_id(&self) -> Option<u32> {
        match self {
            Node::Lit { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn args(&self) -> &[NodeRef] {
        match self {
            Node::Op { args, .. } => args,
            _ => &[],
        }
    }

    fn var_key(&self) -> Option<VarKey> {
        match self {
            Node::Lit { ctx, id } => Some(VarKey(ctx.serial, id >> 1)),
            _ => None,
        }
    }

    fn is_literal(&self) -> bool {
        matches!(self, Node::Lit { .. })
    }
}

pub(crate) fn constant(kind: Kind) -> NodeRef {
    Arc::new(Node::Const(kind))
}

fn boolean(value: bool) -> NodeRef {
    constant(if value { Kind::One } else { Kind::Zero })
}

pub(crate) fn variable(ctx: &Arc<Ctx>, index: u32) -> NodeRef {
    Arc::new(Node::Lit {
        ctx: Arc::clone(ctx),
        id: index << 1,
    })
}

pub(crate) fn op(kind: Kind, args: Vec<NodeRef>) -> NodeRef {
    Arc::new(Node::Op { kind, args })
}

pub(crate) fn negate(node: &NodeRef) -> NodeRef {
    match &**node {
        Node::Const(k) => constant(k.negated()),
        Node::Lit { ctx, id } => Arc::new(Node::Lit {
            ctx: Arc::clone(ctx),
            id: id ^ 1,
        }),
        Node::Op { kind, args } => op(kind.negated(), args.clone()),
    }
}

/// Positive variable of a literal.
pub(crate) fn abs(node: &NodeRef) -> Option<NodeRef> {
    match &**node {
        Node::Lit { ctx, id } if id & 1 == 1 => Some(Arc::new(Node::Lit {
            ctx: Arc::clone(ctx),
            id: id & !1,
        })),
        Node::Lit { .. } => Some(Arc::clone(node)),
        _ => None,
    }
}

/// Structural equality.
pub(crate) fn same(a: &NodeRef, b: &NodeRef) -> bool {
    if Arc::ptr_eq(a, b) {
        return true;
    }
    match (&**a, &**b) {
        (Node::Const(x), Node::Const(y)) => x == y,
        (Node::Lit { ctx: c1, id: i1 }, Node::Lit { ctx: c2, id: i2 }) => {
            c1.serial == c2.serial && i1 == i2
        }
        (Node::Op { kind: k1, args: a1 }, Node::Op { kind: k2, args: a2 }) => {
            k1 == k2 && a1.len() == a2.len() && a1.iter().zip(a2).all(|(x, y)| same(x, y))
        }
        _ => false,
    }
}

fn positive_kind(kind: Kind) -> Kind {
    if kind.is_positive() {
        kind
    } else {
        kind.negated()
    }
}

/// Support variables in context/index order, as positive literals.
pub(crate) fn support(node: &NodeRef) -> BTreeMap<VarKey, NodeRef> {
    fn walk(node: &NodeRef, out: &mut BTreeMap<VarKey, NodeRef>) {
        match &**node {
            Node::Lit { .. } => {
                if let (Some(key), Some(var)) = (node.var_key(), abs(node)) {
                    out.entry(key).or_insert(var);
                }
            }
            Node::Op { args, .. } => args.iter().for_each(|a| walk(a, out)),
            Node::Const(_) => {}
        }
    }
    let mut out = BTreeMap::new();
    walk(node, &mut out);
    out
}

/// Whether assigning every variable folds `node` to Zero or One.
fn evaluable(node: &NodeRef) -> bool {
    match &**node {
        Node::Const(k) => matches!(k, Kind::Zero | Kind::One),
        Node::Lit { .. } => true,
        Node::Op { kind, args } => {
            let arity_ok = match positive_kind(*kind) {
                Kind::Implies => args.len() == 2,
                Kind::IfThenElse => args.len() == 3,
                _ => true,
            };
            arity_ok && args.iter().all(evaluable)
        }
    }
}

type Point = Vec<(NodeRef, NodeRef)>;

/// Every assignment of `vars`, the first variable varying fastest.
fn assignments(vars: &[NodeRef]) -> Option<Vec<Point>> {
    if vars.len() > MAX_ENUMERATED_VARS {
        tracing::warn!(vars = vars.len(), "too many variables to enumerate");
        return None;
    }
    let rows = (0u64..(1u64 << vars.len()))
        .map(|bits| {
            vars.iter()
                .enumerate()
                .map(|(i, var)| (Arc::clone(var), boolean(bits >> i & 1 == 1)))
                .collect()
        })
        .collect();
    Some(rows)
}

fn flatten(kind: Kind, args: Vec<NodeRef>) -> Vec<NodeRef> {
    let mut out = Vec::with_capacity(args.len());
    for a in args {
        match &*a {
            Node::Op { kind: k, args: inner } if *k == kind => out.extend(inner.iter().cloned()),
            _ => out.push(a),
        }
    }
    out
}

fn lattice(kind: Kind, args: Vec<NodeRef>) -> NodeRef {
    let (dominant, identity) = match kind {
        Kind::Or => (Kind::One, Kind::Zero),
        _ => (Kind::Zero, Kind::One),
    };
    let mut kept: Vec<NodeRef> = Vec::new();
    for a in flatten(kind, args) {
        match &*a {
            Node::Const(k) if *k == dominant => return constant(dominant),
            Node::Const(k) if *k == identity => continue,
            _ => {}
        }
        if kept.iter().any(|k| same(k, &a)) {
            continue;
        }
        let neg = negate(&a);
        if kept.iter().any(|k| same(k, &neg)) {
            return constant(dominant);
        }
        kept.push(a);
    }
    match kept.len() {
        0 => constant(identity),
        1 => kept.swap_remove(0),
        _ => op(kind, kept),
    }
}

fn xor(args: Vec<NodeRef>) -> NodeRef {
    let mut parity = false;
    let mut kept: Vec<NodeRef> = Vec::new();
    for a in flatten(Kind::Xor, args) {
        match &*a {
            Node::Const(Kind::Zero) => continue,
            Node::Const(Kind::One) => {
                parity = !parity;
                continue;
            }
            _ => {}
        }
        if let Some(pos) = kept.iter().position(|k| same(k, &a)) {
            kept.remove(pos);
            continue;
        }
        let neg = negate(&a);
        if let Some(pos) = kept.iter().position(|k| same(k, &neg)) {
            kept.remove(pos);
            parity = !parity;
            continue;
        }
        kept.push(a);
    }
    match kept.len() {
        0 => boolean(parity),
        1 if parity => negate(&kept[0]),
        1 => kept.swap_remove(0),
        _ => op(if parity { Kind::Xnor } else { Kind::Xor }, kept),
    }
}

fn equal(args: Vec<NodeRef>) -> NodeRef {
    let mut kept: Vec<NodeRef> = Vec::new();
    let (mut zero, mut one) = (false, false);
    for a in args {
        match &*a {
            Node::Const(Kind::Zero) => zero = true,
            Node::Const(Kind::One) => one = true,
            _ => {
                if kept.iter().any(|k| same(k, &a)) {
                    continue;
                }
                let neg = negate(&a);
                if kept.iter().any(|k| same(k, &neg)) {
                    return boolean(false);
                }
                kept.push(a);
            }
        }
    }
    match (zero, one) {
        (true, true) => boolean(false),
        (false, true) => lattice(Kind::And, kept),
        (true, false) => negate(&lattice(Kind::Or, kept)),
        (false, false) if kept.len() <= 1 => boolean(true),
        (false, false) => op(Kind::Equal, kept),
    }
}

fn implies(args: Vec<NodeRef>) -> NodeRef {
    if args.len() != 2 {
        return op(Kind::Implies, args);
    }
    let (p, q) = (&args[0], &args[1]);
    match (p.kind(), q.kind()) {
        (Kind::Zero, _) | (_, Kind::One) => boolean(true),
        (Kind::One, _) => Arc::clone(q),
        (_, Kind::Zero) => negate(p),
        _ if same(p, q) => boolean(true),
        _ => op(Kind::Implies, args),
    }
}

fn ite(args: Vec<NodeRef>) -> NodeRef {
    if args.len() != 3 {
        return op(Kind::IfThenElse, args);
    }
    match args[0].kind() {
        Kind::One => Arc::clone(&args[1]),
        Kind::Zero => Arc::clone(&args[2]),
        _ if same(&args[1], &args[2]) => Arc::clone(&args[1]),
        _ => op(Kind::IfThenElse, args),
    }
}

/// Constant folding and local identities.
pub(crate) fn simplify(node: &NodeRef) -> NodeRef {
    let Node::Op { kind, args } = &**node else {
        return Arc::clone(node);
    };
    let args: Vec<NodeRef> = args.iter().map(simplify).collect();
    let base = positive_kind(*kind);
    let out = match base {
        Kind::Or | Kind::And => lattice(base, args),
        Kind::Xor => xor(args),
        Kind::Equal => equal(args),
        Kind::Implies => implies(args),
        Kind::IfThenElse => ite(args),
        _ => op(base, args),
    };
    if kind.is_positive() {
        out
    } else {
        negate(&out)
    }
}

fn nnf_rec(node: &NodeRef, pol: bool) -> NodeRef {
    let Node::Op { kind, args } = &**node else {
        return if pol { Arc::clone(node) } else { negate(node) };
    };
    let pol = pol == kind.is_positive();
    let all = |p: bool| -> Vec<NodeRef> { args.iter().map(|a| nnf_rec(a, p)).collect() };
    match (positive_kind(*kind), args.len()) {
        (Kind::Or, _) if pol => op(Kind::Or, all(true)),
        (Kind::Or, _) => op(Kind::And, all(false)),
        (Kind::And, _) if pol => op(Kind::And, all(true)),
        (Kind::And, _) => op(Kind::Or, all(false)),
        (Kind::Xor, 0) => boolean(!pol),
        (Kind::Xor, _) => {
            // Track both polarities of the running xor.
            let mut p = nnf_rec(&args[0], true);
            let mut n = nnf_rec(&args[0], false);
            for a in &args[1..] {
                let (bp, bn) = (nnf_rec(a, true), nnf_rec(a, false));
                let np = op(
                    Kind::Or,
                    vec![
                        op(Kind::And, vec![p.clone(), bn.clone()]),
                        op(Kind::And, vec![n.clone(), bp.clone()]),
                    ],
                );
                let nn = op(
                    Kind::Or,
                    vec![op(Kind::And, vec![p, bp]), op(Kind::And, vec![n, bn])],
                );
                p = np;
                n = nn;
            }
            if pol {
                p
            } else {
                n
            }
        }
        (Kind::Equal, _) if pol => op(
            Kind::Or,
            vec![op(Kind::And, all(true)), op(Kind::And, all(false))],
        ),
        (Kind::Equal, _) => op(
            Kind::And,
            vec![op(Kind::Or, all(true)), op(Kind::Or, all(false))],
        ),
        (Kind::Implies, 2) if pol => op(
            Kind::Or,
            vec![nnf_rec(&args[0], false), nnf_rec(&args[1], true)],
        ),
        (Kind::Implies, 2) => op(
            Kind::And,
            vec![nnf_rec(&args[0], true), nnf_rec(&args[1], false)],
        ),
        (Kind::IfThenElse, 3) => {
            let (s, d1, d0) = (&args[0], &args[1], &args[2]);
            op(
                Kind::Or,
                vec![
                    op(Kind::And, vec![nnf_rec(s, true), nnf_rec(d1, pol)]),
                    op(Kind::And, vec![nnf_rec(s, false), nnf_rec(d0, pol)]),
                ],
            )
        }
        _ if pol => Arc::clone(node),
        _ => negate(node),
    }
}

pub(crate) fn nnf(node: &NodeRef) -> NodeRef {
    simplify(&nnf_rec(node, true))
}

/// Terms of an NNF tree read as `outer` over `inner` over atoms.
fn distribute(node: &NodeRef, outer: Kind, inner: Kind) -> Vec<Vec<NodeRef>> {
    match &**node {
        Node::Op { kind, args } if *kind == outer => args
            .iter()
            .flat_map(|a| distribute(a, outer, inner))
            .collect(),
        Node::Op { kind, args } if *kind == inner => args
            .iter()
            .map(|a| distribute(a, outer, inner))
            .fold(vec![Vec::new()], |acc, terms| {
                acc.iter()
                    .flat_map(|t| {
                        terms.iter().map(move |u| {
                            let mut merged = t.clone();
                            merged.extend(u.iter().cloned());
                            merged
                        })
                    })
                    .collect()
            }),
        _ => vec![vec![Arc::clone(node)]],
    }
}

fn normal_form(node: &NodeRef, outer: Kind, inner: Kind) -> NodeRef {
    let terms = distribute(&nnf(node), outer, inner)
        .into_iter()
        .map(|t| lattice(inner, t))
        .collect();
    lattice(outer, terms)
}

pub(crate) fn cnf(node: &NodeRef) -> NodeRef {
    normal_form(node, Kind::And, Kind::Or)
}

pub(crate) fn dnf(node: &NodeRef) -> NodeRef {
    normal_form(node, Kind::Or, Kind::And)
}

/// Operators with at most two arguments (if-then-else keeps three).
pub(crate) fn binarize(node: &NodeRef) -> NodeRef {
    let Node::Op { kind, args } = &**node else {
        return Arc::clone(node);
    };
    let mut args: Vec<NodeRef> = args.iter().map(binarize).collect();
    let base = positive_kind(*kind);
    match base {
        Kind::Or | Kind::And | Kind::Xor if args.len() > 2 => {
            let last = args.pop();
            let acc = args
                .into_iter()
                .reduce(|a, b| op(base, vec![a, b]));
            match (acc, last) {
                (Some(acc), Some(last)) => op(*kind, vec![acc, last]),
                _ => op(*kind, Vec::new()),
            }
        }
        Kind::Equal if args.len() > 2 => {
            let pairs = args
                .windows(2)
                .map(|w| op(Kind::Equal, vec![w[0].clone(), w[1].clone()]))
                .reduce(|a, b| op(Kind::And, vec![a, b]));
            match pairs {
                Some(eq) if kind.is_positive() => eq,
                Some(eq) => negate(&eq),
                None => op(*kind, args),
            }
        }
        _ => op(*kind, args),
    }
}

/// Only And and Or over literals.
pub(crate) fn lattice_op(node: &NodeRef) -> NodeRef {
    nnf(node)
}

/// Push negated operators down until only positive operators remain.
pub(crate) fn positive(node: &NodeRef) -> NodeRef {
    let Node::Op { kind, args } = &**node else {
        return Arc::clone(node);
    };
    let negs = || args.iter().map(negate).collect::<Vec<_>>();
    let pushed = match (*kind, args.len()) {
        (Kind::Nor, _) => Some(op(Kind::And, negs())),
        (Kind::Nand, _) => Some(op(Kind::Or, negs())),
        (Kind::Xnor, 0) => Some(boolean(true)),
        (Kind::Xnor, _) => {
            let mut xs = args.clone();
            xs[0] = negate(&xs[0]);
            Some(op(Kind::Xor, xs))
        }
        (Kind::Unequal, _) => Some(op(
            Kind::And,
            vec![op(Kind::Or, args.clone()), op(Kind::Or, negs())],
        )),
        (Kind::NotImplies, 2) => Some(op(Kind::And, vec![args[0].clone(), negate(&args[1])])),
        (Kind::NotIfThenElse, 3) => Some(op(
            Kind::IfThenElse,
            vec![args[0].clone(), negate(&args[1]), negate(&args[2])],
        )),
        _ => None,
    };
    match pushed {
        Some(p) => positive(&p),
        None => op(*kind, args.iter().map(positive).collect()),
    }
}

fn substitute(node: &NodeRef, f: &dyn Fn(VarKey) -> Option<NodeRef>) -> NodeRef {
    match &**node {
        Node::Const(_) => Arc::clone(node),
        Node::Lit { id, .. } => match node.var_key().and_then(f) {
            Some(e) if id & 1 == 1 => negate(&e),
            Some(e) => e,
            None => Arc::clone(node),
        },
        Node::Op { kind, args } => op(*kind, args.iter().map(|a| substitute(a, f)).collect()),
    }
}

/// Substitute constants for variables. `None` if a key is not a literal or
/// a value is not Zero/One.
pub(crate) fn restrict(node: &NodeRef, point: &[(NodeRef, NodeRef)]) -> Option<NodeRef> {
    let mut map = HashMap::with_capacity(point.len());
    for (var, value) in point {
        let value = match value.kind() {
            Kind::Zero => false,
            Kind::One => true,
            _ => return None,
        };
        map.insert(var.var_key()?, boolean(value ^ (var.kind() == Kind::Complement)));
    }
    Some(simplify(&substitute(node, &|k| map.get(&k).cloned())))
}

/// Substitute expressions for variables.
pub(crate) fn compose(node: &NodeRef, subst: &[(NodeRef, NodeRef)]) -> Option<NodeRef> {
    let mut map = HashMap::with_capacity(subst.len());
    for (var, expr) in subst {
        let expr = if var.kind() == Kind::Complement {
            negate(expr)
        } else {
            Arc::clone(expr)
        };
        map.insert(var.var_key()?, expr);
    }
    Some(simplify(&substitute(node, &|k| map.get(&k).cloned())))
}

fn points_over(vars: &[NodeRef]) -> Option<Vec<Point>> {
    let vars = vars.iter().map(abs).collect::<Option<Vec<_>>>()?;
    assignments(&vars)
}

/// Shannon expansion over `vars`.
pub(crate) fn expand(node: &NodeRef, vars: &[NodeRef]) -> Option<NodeRef> {
    let terms = points_over(vars)?
        .into_iter()
        .map(|point| {
            let mut lits: Vec<NodeRef> = point
                .iter()
                .map(|(v, c)| if c.kind() == Kind::One { v.clone() } else { negate(v) })
                .collect();
            lits.push(restrict(node, &point)?);
            Some(op(Kind::And, lits))
        })
        .collect::<Option<Vec<_>>>()?;
    Some(simplify(&op(Kind::Or, terms)))
}

/// One cofactor per point over `vars`.
pub(crate) fn cofactors(node: &NodeRef, vars: &[NodeRef]) -> Option<Vec<NodeRef>> {
    points_over(vars)?
        .iter()
        .map(|point| restrict(node, point))
        .collect()
}

/// Tseytin encoding: one auxiliary variable per operator, named
/// `{aux}_{n}` in `ctx`, numbered in post-order.
pub(crate) fn tseytin(node: &NodeRef, ctx: &Arc<Ctx>, aux: &str) -> NodeRef {
    fn encode(
        node: &NodeRef,
        ctx: &Arc<Ctx>,
        aux: &str,
        next: &mut u32,
        clauses: &mut Vec<NodeRef>,
    ) -> NodeRef {
        let Node::Op { kind, args } = &**node else {
            return Arc::clone(node);
        };
        let kids = args
            .iter()
            .map(|a| encode(a, ctx, aux, next, clauses))
            .collect();
        let var = variable(ctx, ctx.var_index(&format!("{aux}_{next}")));
        *next += 1;
        let constraint = cnf(&op(Kind::Equal, vec![var.clone(), op(*kind, kids)]));
        clauses.extend(flatten(Kind::And, vec![constraint]));
        var
    }

    let bin = binarize(&simplify(node));
    if !matches!(&*bin, Node::Op { .. }) {
        return bin;
    }
    let mut clauses = Vec::new();
    let mut next = 0;
    let root = encode(&bin, ctx, aux, &mut next, &mut clauses);
    clauses.insert(0, root);
    lattice(Kind::And, clauses)
}

pub(crate) fn depth(node: &NodeRef) -> u32 {
    match &**node {
        Node::Op { args, .. } => 1 + args.iter().map(depth).max().unwrap_or(0),
        _ => 0,
    }
}

pub(crate) fn size(node: &NodeRef) -> u32 {
    match &**node {
        Node::Op { args, .. } => 1 + args.iter().map(size).sum::<u32>(),
        _ => 1,
    }
}

fn is_term_of(node: &NodeRef, kind: Kind) -> bool {
    match &**node {
        Node::Lit { .. } => true,
        Node::Op { kind: k, args } => *k == kind && args.iter().all(|a| a.is_literal()),
        Node::Const(_) => false,
    }
}

/// An Or or And whose arguments are all literals.
pub(crate) fn is_clause(node: &NodeRef) -> bool {
    matches!(node.kind(), Kind::Or | Kind::And) && node.args().iter().all(|a| a.is_literal())
}

pub(crate) fn is_simple(node: &NodeRef) -> bool {
    same(&simplify(node), node)
}

fn is_normal(node: &NodeRef, outer: Kind, inner: Kind) -> bool {
    match &**node {
        Node::Const(k) => matches!(k, Kind::Zero | Kind::One),
        Node::Lit { .. } => true,
        Node::Op { kind, args } if *kind == inner => args.iter().all(|a| a.is_literal()),
        Node::Op { kind, args } if *kind == outer => args.iter().all(|a| is_term_of(a, inner)),
        Node::Op { .. } => false,
    }
}

pub(crate) fn is_cnf(node: &NodeRef) -> bool {
    is_normal(node, Kind::And, Kind::Or)
}

pub(crate) fn is_dnf(node: &NodeRef) -> bool {
    is_normal(node, Kind::Or, Kind::And)
}

pub(crate) fn equiv(a: &NodeRef, b: &NodeRef) -> bool {
    if same(a, b) {
        return true;
    }
    if !evaluable(a) || !evaluable(b) {
        return same(&simplify(a), &simplify(b));
    }
    sat(&op(Kind::Xor, vec![Arc::clone(a), Arc::clone(b)])).is_none()
}

/// First satisfying point in assignment order: the last support variable
/// is the most significant and variables left free are set to Zero.
pub(crate) fn sat(node: &NodeRef) -> Option<Point> {
    fn search(node: &NodeRef, vars: &[NodeRef], values: &mut [bool]) -> bool {
        match node.kind() {
            Kind::One => return true,
            Kind::Zero => return false,
            _ => {}
        }
        let Some((var, rest)) = vars.split_last() else {
            return false;
        };
        let n = rest.len();
        for value in [false, true] {
            let Some(next) = restrict(node, &[(Arc::clone(var), boolean(value))]) else {
                break;
            };
            values[n] = value;
            if search(&next, rest, &mut values[..n]) {
                return true;
            }
        }
        values[n] = false;
        false
    }

    let vars: Vec<NodeRef> = support(node).into_values().collect();
    let mut values = vec![false; vars.len()];
    if !search(&simplify(node), &vars, &mut values) {
        return None;
    }
    let point = vars
        .into_iter()
        .zip(values)
        .map(|(var, value)| (var, boolean(value)))
        .collect();
    Some(point)
}

/// Every point over the support.
pub(crate) fn domain(node: &NodeRef) -> Option<Vec<Point>> {
    let vars: Vec<NodeRef> = support(node).into_values().collect();
    assignments(&vars)
}

/// Post-order traversal; shared subtrees are visited once.
pub(crate) fn dfs(node: &NodeRef) -> Vec<NodeRef> {
    fn walk(node: &NodeRef, seen: &mut HashSet<*const Node>, out: &mut Vec<NodeRef>) {
        if !seen.insert(Arc::as_ptr(node)) {
            return;
        }
        for a in node.args() {
            walk(a, seen, out);
        }
        out.push(Arc::clone(node));
    }
    let mut out = Vec::new();
    walk(node, &mut HashSet::new(), &mut out);
    out
}

pub(crate) fn render(node: &NodeRef) -> String {
    match &**node {
        Node::Const(Kind::Zero) => "0".to_owned(),
        Node::Const(Kind::One) => "1".to_owned(),
        Node::Const(Kind::Logical) => "X".to_owned(),
        Node::Const(_) => "?".to_owned(),
        Node::Lit { ctx, id } if id & 1 == 1 => format!("~{}", ctx.name(id >> 1)),
        Node::Lit { ctx, id } => ctx.name(id >> 1),
        Node::Op { kind, args } => {
            let inner: Vec<String> = args.iter().map(render).collect();
            format!("{}({})", kind.name(), inner.join(", "))
        }
    }
}
