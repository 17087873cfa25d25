//! Debug-only reentrancy guard.
//!
//! A cache runs user factories while holding its upgradable lock. Calling
//! back into the same cache from that factory on the same thread would
//! block forever on the lock. In debug builds the guard records, per thread,
//! which instances are currently inside a guarded section and panics on
//! nested entry instead of deadlocking. In release builds this compiles to
//! a zero-cost no-op.
//!
//! Other threads are unaffected: the tracking is thread-local, so
//! concurrent readers and writers of the same instance never trip it.

use core::marker::PhantomData;

#[cfg(debug_assertions)]
std::thread_local! {
    static ACTIVE: core::cell::RefCell<Vec<usize>> = const { core::cell::RefCell::new(Vec::new()) };
}

/// Per-instance reentrancy tracker. Embed this in structs to guard public
/// entry-points with `let _g = self.reentrancy.enter();`.
#[derive(Debug, Default)]
pub struct DebugReentrancy {
    // Non-zero size so every embedding instance has a distinct address.
    _marker: u8,
}

impl DebugReentrancy {
    pub const fn new() -> Self {
        Self { _marker: 0 }
    }

    #[cfg(debug_assertions)]
    fn id(&self) -> usize {
        self as *const Self as usize
    }

    /// Enter a guarded section. In debug builds, panics if the current
    /// thread is already inside a guarded section of this instance.
    #[inline]
    pub fn enter(&self) -> ReentrancyGuard<'_> {
        #[cfg(debug_assertions)]
        {
            let id = self.id();
            ACTIVE.with(|active| {
                let mut active = active.borrow_mut();
                assert!(
                    !active.contains(&id),
                    "reentrancy detected: nested entry into cache from its own factory"
                );
                active.push(id);
            });
            ReentrancyGuard {
                owner: self,
                _nosend: PhantomData,
            }
        }

        #[cfg(not(debug_assertions))]
        {
            ReentrancyGuard {
                _z: PhantomData,
                _nosend: PhantomData,
            }
        }
    }
}

/// RAII guard returned by `DebugReentrancy::enter`. Tied to the entering
/// thread, hence `!Send`.
pub struct ReentrancyGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a DebugReentrancy,
    #[cfg(not(debug_assertions))]
    _z: PhantomData<&'a ()>,
    _nosend: PhantomData<*mut ()>,
}

impl<'a> Drop for ReentrancyGuard<'a> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            let id = self.owner.id();
            ACTIVE.with(|active| {
                let mut active = active.borrow_mut();
                if let Some(pos) = active.iter().rposition(|&a| a == id) {
                    active.swap_remove(pos);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DebugReentrancy;
    use std::sync::Arc;

    #[test]
    fn enter_and_exit_is_ok() {
        let r = DebugReentrancy::new();
        {
            let _g = r.enter();
        }
        // Re-entering after the guard dropped is fine.
        let _g = r.enter();
    }

    #[test]
    fn distinct_instances_nest() {
        let a = DebugReentrancy::new();
        let b = DebugReentrancy::new();
        let _ga = a.enter();
        let _gb = b.enter();
    }

    #[test]
    fn other_threads_are_not_blocked() {
        let r = Arc::new(DebugReentrancy::new());
        let _g = r.enter();
        let r2 = Arc::clone(&r);
        std::thread::spawn(move || {
            let _g = r2.enter();
        })
        .join()
        .expect("entering from another thread must not panic");
    }

    #[cfg(debug_assertions)]
    #[test]
    fn reentrancy_panics_in_debug() {
        let r = DebugReentrancy::new();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _g1 = r.enter();
            let _g2 = r.enter();
        }));
        assert!(res.is_err(), "expected reentrancy to panic in debug builds");
        // The unwound guards must have cleaned up after themselves.
        let _g = r.enter();
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn reentrancy_noop_in_release() {
        let r = DebugReentrancy::new();
        let _g1 = r.enter();
        let _g2 = r.enter();
    }
}
