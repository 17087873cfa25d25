use boolexpr_intern::WeakInterningCache;
use std::sync::Arc;

// Test: a factory that reads a different cache.
// Verifies: nesting across instances is allowed.
#[test]
fn nested_entry_into_another_cache_is_ok() {
    let outer: WeakInterningCache<u32, u32> = WeakInterningCache::new();
    let inner: WeakInterningCache<u32, u32> = WeakInterningCache::new();
    let seed = inner.get_or_add(1, |_| Arc::new(10));
    let v = outer.get_or_add(1, |k| Arc::new(*inner.get(k).unwrap() + 1));
    assert_eq!(*v, 11);
    drop(seed);
}

// Test: a factory that calls back into its own cache.
// Verifies: debug builds panic instead of deadlocking, and the cache is
// usable afterwards.
#[cfg(debug_assertions)]
#[test]
fn reentrancy_panics_in_debug() {
    let cache: WeakInterningCache<u32, u32> = WeakInterningCache::new();
    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        cache.get_or_add(1, |_| {
            let _ = cache.get(&2);
            Arc::new(1)
        })
    }));
    assert!(res.is_err(), "expected reentrancy to panic in debug builds");

    let v = cache.get_or_add(1, |_| Arc::new(5));
    assert_eq!(*v, 5);
}
