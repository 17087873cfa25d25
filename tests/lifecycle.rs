// Handle lifecycle tests over the in-memory engine.
//
// The core invariants exercised:
// - Exactly-once release: explicit disposal and Drop together free each
//   engine handle once; the engine never sees an invalid release.
// - Use after release surfaces as an error, never as an engine call on a
//   stale handle.
// - Sequences and points are freed whether drained or abandoned.
use boolexpr_intern::{Context, Error, Expr, MemoryEngine, Resource, Runtime};
use std::sync::Arc;

fn setup() -> (Arc<MemoryEngine>, Arc<Runtime>, Arc<Context>) {
    let mem = Arc::new(MemoryEngine::new());
    let rt = Runtime::new(mem.clone()).expect("runtime");
    let ctx = Context::new(&rt).expect("context");
    (mem, rt, ctx)
}

// Test: disposing a context twice.
// Assumes: context_del on a freed handle counts as an invalid release.
// Verifies: only the first dispose frees; later ones are no-ops.
#[test]
fn double_context_dispose_frees_once() {
    let (mem, _rt, ctx) = setup();
    let raw = ctx.raw_handle();
    let released = mem.stats().released;

    assert!(ctx.dispose());
    assert!(!ctx.dispose());
    assert!(ctx.is_disposed());
    assert!(!mem.is_live(raw));
    assert_eq!(mem.stats().released, released + 1);

    drop(ctx);
    assert_eq!(mem.stats().invalid_releases, 0);
}

// Test: using a disposed context.
#[test]
fn disposed_context_reports_use_after_release() {
    let (_mem, _rt, ctx) = setup();
    ctx.dispose();
    assert_eq!(
        ctx.variable("a").unwrap_err(),
        Error::UseAfterRelease(Resource::Context)
    );
}

// Test: operator disposal.
// Verifies: dispose is idempotent, later queries fail cleanly and
// Display falls back to a placeholder.
#[test]
fn disposed_operator_fails_cleanly() {
    let (mem, rt, ctx) = setup();
    let [a, b] = ["a", "b"].map(|n| Expr::from(ctx.variable(n).unwrap()));
    let f = rt.or(&[a, b]).unwrap();
    let raw = f.raw_handle();

    assert!(f.dispose());
    assert!(!f.dispose());
    assert!(f.as_operator().unwrap().is_disposed());
    assert!(!mem.is_live(raw));
    assert_eq!(f.to_text().unwrap_err(), Error::UseAfterRelease(Resource::Node));
    assert_eq!(f.not().unwrap_err(), Error::UseAfterRelease(Resource::Node));
    assert_eq!(f.to_string(), "<released Or>");
    assert_eq!(mem.stats().invalid_releases, 0);
}

// Test: constants cannot be disposed through `Expr`.
#[test]
fn constants_are_not_disposable() {
    let (mem, rt, _ctx) = setup();
    let zero = Expr::from(rt.zero());
    assert!(!zero.dispose());
    assert!(mem.is_live(zero.raw_handle()));
    assert_eq!(zero.to_text().unwrap(), "0");
}

// Test: dropping every wrapper.
// Verifies: the engine ends with no live objects and no invalid releases.
#[test]
fn dropping_everything_frees_everything() {
    let (mem, rt, ctx) = setup();
    {
        let [a, b, c] = ["a", "b", "c"].map(|n| Expr::from(ctx.variable(n).unwrap()));
        let f = rt.ite(&a, &b, &c).unwrap();
        let g = f.to_cnf().unwrap().to_nnf().unwrap();
        assert!(f.equiv(&g).unwrap());
        let _ = f.support().unwrap();
        let _ = f.sat().unwrap();
    }
    // Constants and the context remain.
    assert_eq!(mem.stats().live, 5);
    drop(ctx);
    assert_eq!(mem.stats().live, 4);
    drop(rt);
    let stats = mem.stats();
    assert_eq!(stats.live, 0);
    assert_eq!(stats.invalid_releases, 0);
    assert_eq!(stats.allocated, stats.released);
}

// Test: a literal disposed while the registry still points at it.
// Verifies: the next lookup produces a live replacement and the old
// wrapper stays disposed.
#[test]
fn disposed_literal_is_replaced_on_next_lookup() {
    let (mem, _rt, ctx) = setup();
    let a = ctx.variable("a").unwrap();
    assert!(a.dispose());
    assert!(!a.dispose());

    let again = ctx.variable("a").unwrap();
    assert!(!Arc::ptr_eq(&a, &again));
    assert!(!again.is_disposed());
    assert!(a.is_disposed());
    assert!(Arc::ptr_eq(&ctx.variable("a").unwrap(), &again));
    assert_eq!(mem.stats().invalid_releases, 0);
}

// Test: an abandoned traversal.
// Verifies: dropping a partially consumed iterator frees the sequence.
#[test]
fn abandoned_sequence_is_released() {
    let (mem, rt, ctx) = setup();
    let [a, b] = ["a", "b"].map(|n| Expr::from(ctx.variable(n).unwrap()));
    let f = rt.and(&[a.clone(), rt.or(&[a, b]).unwrap()]).unwrap();
    let baseline = mem.stats().live;

    let mut it = f.iter_dfs().unwrap();
    let first = it.next().unwrap().unwrap();
    assert!(first.as_literal().is_some());
    drop(first);
    assert_eq!(mem.stats().live, baseline + 1, "only the sequence remains");
    drop(it);
    assert_eq!(mem.stats().live, baseline);

    let all: Vec<Expr> = f.iter_dfs().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(all.len(), 4, "shared literal visited once");
    assert!(all.last().unwrap().kind() == f.kind());
    drop(all);
    assert_eq!(mem.stats().live, baseline);
    assert_eq!(mem.stats().invalid_releases, 0);
}

// Test: satisfiability and points.
// Verifies: a point maps interned variables to constant singletons, and
// an unsatisfiable expression yields None.
#[test]
fn sat_point_uses_interned_wrappers() {
    let (mem, rt, ctx) = setup();
    let a = ctx.variable("a").unwrap();
    let b = ctx.variable("b").unwrap();
    let nb = Expr::from(&b).not().unwrap();
    let f = rt.and(&[Expr::from(&a), nb]).unwrap();

    let point = f.sat().unwrap().expect("satisfiable");
    assert_eq!(point.len(), 2);
    assert!(Arc::ptr_eq(point.get(&a).unwrap(), rt.one()));
    assert!(Arc::ptr_eq(point.get(&b).unwrap(), rt.zero()));

    let unsat = rt
        .and(&[Expr::from(&a), Expr::from(&a).not().unwrap()])
        .unwrap();
    assert!(unsat.sat().unwrap().is_none());

    let restricted = f.restrict(point.as_slice()).unwrap();
    assert!(restricted.ptr_eq(&Expr::from(rt.one())));
    drop(point);
    assert_eq!(mem.stats().invalid_releases, 0);
}

// Test: satisfiability past the enumeration limit.
// Assumes: the engine enumerates points over at most 20 variables.
// Verifies: sat and equiv still answer over 21 variables, an unsatisfiable
// expression still yields None, and domain enumeration fails instead of
// returning an empty sequence.
#[test]
fn sat_and_equiv_answer_over_wide_supports() {
    let (mem, rt, ctx) = setup();
    let names: Vec<String> = (0..21).map(|i| format!("x{i}")).collect();
    let vars: Vec<Expr> = ctx
        .variables(&names)
        .unwrap()
        .into_iter()
        .map(Expr::from)
        .collect();
    let any = rt.or(&vars).unwrap();

    let point = any.sat().unwrap().expect("satisfiable");
    assert_eq!(point.len(), 21);
    assert!(any.restrict(point.as_slice()).unwrap().ptr_eq(&Expr::from(rt.one())));

    let negated: Vec<Expr> = vars.iter().map(|v| v.not().unwrap()).collect();
    let de_morgan = rt.nand(&negated).unwrap();
    assert!(any.equiv(&de_morgan).unwrap());
    assert!(!any.equiv(&rt.and(&vars).unwrap()).unwrap());

    let mut contradiction = vars.clone();
    contradiction.push(negated[0].clone());
    assert!(rt.and(&contradiction).unwrap().sat().unwrap().is_none());

    assert!(matches!(
        any.iter_domain().unwrap_err(),
        Error::ArgumentInvalid { name: "vars", .. }
    ));
    assert_eq!(mem.stats().invalid_releases, 0);
}

// Test: domain and cofactor enumeration.
#[test]
fn domain_and_cofactors_enumerate_every_point() {
    let (mem, rt, ctx) = setup();
    let a = ctx.variable("a").unwrap();
    let b = ctx.variable("b").unwrap();
    let f = rt.xor(&[Expr::from(&a), Expr::from(&b)]).unwrap();

    let points = f.iter_domain().unwrap().collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(points.len(), 4);
    assert!(points.iter().all(|p| p.len() == 2));

    let cofactors = f
        .iter_cofactors(std::slice::from_ref(&a))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(cofactors.len(), 2);
    assert!(cofactors[0].ptr_eq(&Expr::from(&b)));
    assert_eq!(cofactors[1].to_string(), "~b");

    let expanded = f.expand(&[a.clone()]).unwrap();
    assert!(expanded.equiv(&f).unwrap());
    let composed = f.compose(&[(a, Expr::from(rt.zero()))]).unwrap();
    assert!(composed.ptr_eq(&Expr::from(&b)));
    assert_eq!(mem.stats().invalid_releases, 0);
}

// Test: Tseytin encoding creates auxiliary variables in the given context.
#[test]
fn tseytin_adds_auxiliary_variables() {
    let (_mem, rt, ctx) = setup();
    let [a, b] = ["a", "b"].map(|n| Expr::from(ctx.variable(n).unwrap()));
    let f = rt.or(&[a.clone(), b.clone()]).unwrap();
    let t = f.tseytin(&ctx, "t").unwrap();
    assert!(t.is_cnf().unwrap());
    let support = t.support().unwrap();
    assert_eq!(support.len(), 3);
    let aux = ctx.variable("t_0").unwrap();
    assert!(support.iter().any(|v| Arc::ptr_eq(v, &aux)));
}

// Test: a constant outliving its runtime.
// Verifies: operations on it fail instead of reaching a dead runtime.
#[test]
fn constant_outliving_runtime_is_rejected() {
    let (mem, rt, ctx) = setup();
    let zero = Arc::clone(rt.zero());
    drop((ctx, rt));
    assert!(matches!(
        Expr::from(&zero).not(),
        Err(Error::ArgumentInvalid { .. })
    ));
    drop(zero);
    assert_eq!(mem.stats().live, 0);
}
