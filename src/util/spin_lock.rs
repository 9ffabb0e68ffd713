//! Spinlock for very short critical sections
//!
//! Plugs a busy-waiting raw lock into `lock_api`, so callers get the usual
//! `Mutex`/guard API. Only suitable when the lock is held for a handful of
//! instructions with no allocation or I/O inside.

use crossbeam::utils::Backoff;
use parking_lot::lock_api::{self, GuardSend};
use std::sync::atomic::{AtomicBool, Ordering};

/// Raw test-and-test-and-set lock
pub struct RawSpinLock {
    locked: AtomicBool,
}

unsafe impl lock_api::RawMutex for RawSpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = Self {
        locked: AtomicBool::new(false),
    };

    type GuardMarker = GuardSend;

    fn lock(&self) {
        let backoff = Backoff::new();
        while !self.try_lock() {
            // Spin on a plain load so waiters don't bounce the cache line.
            while self.locked.load(Ordering::Relaxed) {
                backoff.snooze();
            }
        }
    }

    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    unsafe fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

/// Mutex backed by [`RawSpinLock`]
pub type SpinLock<T> = lock_api::Mutex<RawSpinLock, T>;

/// Guard returned by [`SpinLock::lock`]
pub type SpinLockGuard<'a, T> = lock_api::MutexGuard<'a, RawSpinLock, T>;
