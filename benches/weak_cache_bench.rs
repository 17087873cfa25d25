use boolexpr_intern::{CacheConfig, Context, Expr, MemoryEngine, Runtime, WeakInterningCache};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn bench_get_or_add_fresh_10k(c: &mut Criterion) {
    c.bench_function("weak::get_or_add_fresh_10k", |b| {
        b.iter_batched(
            WeakInterningCache::<String, u64>::new,
            |cache| {
                let held: Vec<Arc<u64>> = lcg(1)
                    .take(10_000)
                    .map(|x| cache.get_or_add(key(x), |_| Arc::new(x)))
                    .collect();
                black_box((cache, held))
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_hit_10k(c: &mut Criterion) {
    let cache = WeakInterningCache::<String, u64>::new();
    let keys: Vec<String> = lcg(2).take(10_000).map(key).collect();
    let _held: Vec<Arc<u64>> = keys
        .iter()
        .enumerate()
        .map(|(i, k)| cache.get_or_add(k.clone(), |_| Arc::new(i as u64)))
        .collect();
    c.bench_function("weak::get_hit_10k", |b| {
        b.iter(|| {
            for k in &keys {
                black_box(cache.get(k.as_str()));
            }
        })
    });
}

// Every value dies immediately, so the table is dominated by dead entries
// and compaction does all the reclaiming.
fn bench_churn_dead_entries_10k(c: &mut Criterion) {
    for (name, interval) in [("weak::churn_interval_0", 0), ("weak::churn_interval_default", 500)] {
        c.bench_function(name, |b| {
            b.iter_batched(
                || {
                    WeakInterningCache::<u64, u64>::with_config(
                        CacheConfig::default().with_compact_interval(interval),
                    )
                },
                |cache| {
                    for x in lcg(3).take(10_000) {
                        drop(cache.get_or_add(x, |&x| Arc::new(x)));
                    }
                    black_box(cache)
                },
                BatchSize::SmallInput,
            )
        });
    }
}

fn bench_contended_get_or_add(c: &mut Criterion) {
    let cache = Arc::new(WeakInterningCache::<u64, u64>::new());
    let held: Vec<Arc<u64>> = (0..64).map(|k| cache.get_or_add(k, |&k| Arc::new(k))).collect();
    c.bench_function("weak::contended_get_or_add_4x10k", |b| {
        b.iter(|| {
            let workers: Vec<_> = (0..4)
                .map(|t| {
                    let cache = cache.clone();
                    thread::spawn(move || {
                        for x in lcg(t).take(10_000) {
                            black_box(cache.get_or_add(x % 64, |&k| Arc::new(k)));
                        }
                    })
                })
                .collect();
            for w in workers {
                w.join().unwrap();
            }
        })
    });
    drop(held);
}

fn bench_variable_lookup_1k(c: &mut Criterion) {
    let engine = Arc::new(MemoryEngine::new());
    let rt = Runtime::new(engine).unwrap();
    let ctx = Context::new(&rt).unwrap();
    let names: Vec<String> = (0..1_000).map(|i| format!("x{i}")).collect();
    let _held = ctx.variables(&names).unwrap();
    c.bench_function("runtime::variable_lookup_1k", |b| {
        b.iter(|| {
            for n in &names {
                black_box(ctx.variable(n).unwrap());
            }
        })
    });
    c.bench_function("runtime::and_of_two_1k", |b| {
        let a = Expr::from(ctx.variable("x0").unwrap());
        let z = Expr::from(ctx.variable("x1").unwrap());
        b.iter(|| {
            for _ in 0..1_000 {
                black_box(rt.and(&[a.clone(), z.clone()]).unwrap());
            }
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(12)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches_cache;
    config = bench_config();
    targets = bench_get_or_add_fresh_10k,
              bench_get_hit_10k,
              bench_churn_dead_entries_10k,
              bench_contended_get_or_add
}
criterion_group! {
    name = benches_runtime;
    config = bench_config();
    targets = bench_variable_lookup_1k
}
criterion_main!(benches_cache, benches_runtime);
