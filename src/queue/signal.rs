//! Drain signal
//!
//! A resettable completion gate: it starts unfired, fires at most once, and
//! lets any number of waiters observe the firing. Re-arming is done by the
//! owner swapping in a fresh gate rather than resetting this one, so a
//! waiter that already observed the firing can never see it undone.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub(crate) struct DrainSignal {
    fired: AtomicBool,
    notify: Notify,
}

impl DrainSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fire the gate. Idempotent: concurrent and repeated calls collapse
    /// into a single wake-up.
    ///
    /// Waiters are only woken (their wakers scheduled), never polled inline,
    /// so a slow consumer cannot stall the producer that fired.
    #[inline]
    pub(crate) fn set(&self) {
        if self.fired.load(Ordering::Acquire) {
            return;
        }
        if !self.fired.swap(true, Ordering::AcqRel) {
            self.notify.notify_waiters();
        }
    }

    #[inline]
    pub(crate) fn is_set(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Resolve once the gate has fired.
    pub(crate) async fn wait(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);

        // Register before checking the flag, otherwise a `set` between the
        // check and the first poll would be lost.
        notified.as_mut().enable();
        if self.is_set() {
            return;
        }

        notified.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_wait_resolves_after_set() {
        let signal = DrainSignal::new();
        let mut wait = task::spawn(signal.wait());

        assert_pending!(wait.poll());
        signal.set();

        assert!(wait.is_woken());
        assert_ready!(wait.poll());
    }

    #[test]
    fn test_wait_on_fired_signal_is_immediate() {
        let signal = DrainSignal::new();
        signal.set();

        let mut wait = task::spawn(signal.wait());
        assert_ready!(wait.poll());
    }

    #[test]
    fn test_set_is_idempotent() {
        let signal = DrainSignal::new();
        let mut first = task::spawn(signal.wait());
        let mut second = task::spawn(signal.wait());
        assert_pending!(first.poll());
        assert_pending!(second.poll());

        signal.set();
        signal.set();

        assert!(signal.is_set());
        assert!(first.is_woken());
        assert!(second.is_woken());
        assert_ready!(first.poll());
        assert_ready!(second.poll());
    }
}
