//! Process-wide reclamation epoch.
//!
//! A weak reference can only go dead when its value is dropped. Every
//! `ResourceHandle` drop advances this counter, so a cache that records the
//! epoch at its last sweep can tell whether another sweep could find
//! anything.

use core::sync::atomic::{AtomicU64, Ordering};

static RECLAIMED: AtomicU64 = AtomicU64::new(0);

/// Current epoch. Monotonic; never decreases.
#[inline]
pub fn current() -> u64 {
    RECLAIMED.load(Ordering::Acquire)
}

/// Advance the epoch. Called on wrapper teardown; callers caching other
/// weakly-held values can call it from their own `Drop`.
#[inline]
pub fn advance() {
    RECLAIMED.fetch_add(1, Ordering::AcqRel);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_moves_epoch_forward() {
        let before = current();
        advance();
        assert!(current() > before);
    }
}
