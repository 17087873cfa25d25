// Concurrency tests.
//
// The core invariants exercised:
// - Single winner: concurrent get_or_add for one key runs the factory
//   once and every caller gets the same value.
// - Exactly-once release under races between explicit disposal calls.
// - Concurrent literal creation never exposes two wrappers for one id and
//   never double-frees a duplicate handle.
use boolexpr_intern::{
    CacheConfig, Context, Expr, Kind, MemoryEngine, Runtime, RuntimeConfig, WeakInterningCache,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 8;

// Test: N threads racing get_or_add on one key.
// Assumes: each thread keeps its result alive until joined.
// Verifies: the factory ran once and all results are one instance.
#[test]
fn get_or_add_has_a_single_winner() {
    let cache: Arc<WeakInterningCache<u32, String>> = Arc::new(WeakInterningCache::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let (cache, calls, barrier) = (cache.clone(), calls.clone(), barrier.clone());
            thread::spawn(move || {
                barrier.wait();
                cache.get_or_add(7, |k| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Arc::new(format!("value-{k}"))
                })
            })
        })
        .collect();
    let results: Vec<Arc<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    assert_eq!(cache.len(), 1);
}

// Test: many threads asking one context for the same variable.
// Verifies: one wrapper, every duplicate handle freed once.
#[test]
fn concurrent_variable_lookup_interns_once() {
    let mem = Arc::new(MemoryEngine::new());
    let rt = Runtime::new(mem.clone()).unwrap();
    let ctx = Context::new(&rt).unwrap();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let (ctx, barrier) = (ctx.clone(), barrier.clone());
            thread::spawn(move || {
                barrier.wait();
                (0..50).map(|_| ctx.variable("x").unwrap()).last().unwrap()
            })
        })
        .collect();
    let lits: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(lits.iter().all(|l| Arc::ptr_eq(l, &lits[0])));
    let stats = mem.stats();
    assert_eq!(stats.invalid_releases, 0);
    // Four constants, the context and one literal.
    assert_eq!(stats.live, 6);
}

// Test: racing dispose calls on one operator.
// Verifies: exactly one call reports the release.
#[test]
fn concurrent_dispose_has_one_winner() {
    let mem = Arc::new(MemoryEngine::new());
    let rt = Runtime::new(mem.clone()).unwrap();
    let ctx = Context::new(&rt).unwrap();
    let [a, b] = ["a", "b"].map(|n| Expr::from(ctx.variable(n).unwrap()));
    let f = rt.and(&[a, b]).unwrap();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let (f, barrier) = (f.clone(), barrier.clone());
            thread::spawn(move || {
                barrier.wait();
                f.dispose()
            })
        })
        .collect();
    let wins = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|&won| won)
        .count();

    assert_eq!(wins, 1);
    assert!(!mem.is_live(f.raw_handle()));
    drop(f);
    assert_eq!(mem.stats().invalid_releases, 0);
}

// Test: churn across threads with aggressive compaction.
// Assumes: interval 0 makes most operations eligible for a sweep.
// Verifies: creating, dropping and recreating literals concurrently never
// double-frees and leaves only live entries after an explicit compact.
#[test]
fn literal_churn_with_compaction() {
    let mem = Arc::new(MemoryEngine::new());
    let config =
        RuntimeConfig::default().with_cache(CacheConfig::default().with_compact_interval(0));
    let rt = Runtime::with_config(mem.clone(), config).unwrap();
    let ctx = Context::new(&rt).unwrap();
    let keep = ctx.variable("v0").unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let (rt, ctx) = (rt.clone(), ctx.clone());
            thread::spawn(move || {
                for i in 0..200 {
                    let name = format!("v{}", (i * 7 + t) % 16);
                    let v = Expr::from(ctx.variable(&name).unwrap());
                    let f = rt.or(&[v.clone(), v.not().unwrap()]).unwrap();
                    assert_eq!(f.simplify().unwrap().kind(), Kind::One);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    ctx.literals().compact();
    let live = ctx.literals().literals();
    assert_eq!(live.len(), 1);
    assert!(Arc::ptr_eq(&live[0], &keep));
    assert_eq!(ctx.literals().len(), 1);
    assert_eq!(mem.stats().invalid_releases, 0);
}
