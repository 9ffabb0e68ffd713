//! Bounded many-producers/single-consumer queue
//!
//! Producers claim ring slots with CAS loops and never block. A single
//! consumer drains in batches and can wait asynchronously until at least one
//! item, or at least a configured batch of items, is available.

use arc_swap::ArcSwap;
use crossbeam::atomic::AtomicCell;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::signal::DrainSignal;
use crate::error::QueueError;
use crate::metrics::METRICS;

/// Fixed-capacity MPSC queue with batch-aware async wake-up.
///
/// `try_add` may be called from any number of threads, concurrently with
/// `drain`. `drain` must not be called concurrently with itself: the queue
/// has exactly one logical consumer. Only builds with `debug_assertions`
/// check this, by panicking; release builds do not guard it.
///
/// Items come out in the order their producers claimed a slot. A producer
/// that claimed a slot but has not yet published into it holds back every
/// later item until it does.
pub struct BoundedQueue<T> {
    slots: Box<[AtomicCell<Option<T>>]>,
    /// Next slot to be claimed by a producer
    front: AtomicUsize,
    /// Next slot to be consumed; only the drain path writes it
    back: AtomicUsize,
    /// Claimed slots, published or not
    count: AtomicUsize,
    batch_threshold: usize,
    /// Fired when at least one item is available
    drain_gate: ArcSwap<DrainSignal>,
    /// Fired when at least `batch_threshold` items are available
    batch_gate: ArcSwap<DrainSignal>,
    #[cfg(debug_assertions)]
    draining: std::sync::atomic::AtomicBool,
}

impl<T: Send> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// The batch threshold defaults to the capacity (or 1 for an empty
    /// queue), so [`try_wait_for_batch`](Self::try_wait_for_batch) resolves
    /// once the queue is full.
    pub fn new(capacity: usize) -> Self {
        Self::build(capacity, capacity.max(1))
    }

    /// Create a queue whose batch wait resolves at `batch_threshold` items.
    pub fn with_batch_threshold(capacity: usize, batch_threshold: usize) -> Result<Self, QueueError> {
        let max = capacity.max(1);
        if batch_threshold == 0 || batch_threshold > max {
            return Err(QueueError::InvalidBatchThreshold {
                threshold: batch_threshold,
                max,
            });
        }
        Ok(Self::build(capacity, batch_threshold))
    }

    fn build(capacity: usize, batch_threshold: usize) -> Self {
        let slots: Vec<AtomicCell<Option<T>>> =
            (0..capacity).map(|_| AtomicCell::new(None)).collect();

        debug!(capacity, batch_threshold, "Bounded queue created");

        Self {
            slots: slots.into_boxed_slice(),
            front: AtomicUsize::new(0),
            back: AtomicUsize::new(0),
            count: AtomicUsize::new(0),
            batch_threshold,
            drain_gate: ArcSwap::from_pointee(DrainSignal::new()),
            batch_gate: ArcSwap::from_pointee(DrainSignal::new()),
            #[cfg(debug_assertions)]
            draining: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Try to enqueue `item` without blocking.
    ///
    /// Returns the item back in `Err` when the queue is full.
    pub fn try_add(&self, item: T) -> Result<(), T> {
        let capacity = self.slots.len();

        let new_count = loop {
            let current = self.count.load(Ordering::Acquire);
            if current >= capacity {
                METRICS.queue_add_rejected();
                return Err(item);
            }

            if self
                .count
                .compare_exchange_weak(current, current + 1, Ordering::SeqCst, Ordering::Acquire)
                .is_ok()
            {
                break current + 1;
            }
            std::hint::spin_loop();
        };

        // The count increment reserved room for exactly one slot; now claim
        // which one.
        let index = loop {
            let current = self.front.load(Ordering::Acquire);
            let next = (current + 1) % capacity;
            if self
                .front
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break current;
            }
            std::hint::spin_loop();
        };

        let previous = self.slots[index].swap(Some(item));
        debug_assert!(previous.is_none(), "claimed slot {index} was still occupied");

        self.drain_gate.load().set();
        if new_count >= self.batch_threshold {
            self.batch_gate.load().set();
        }

        METRICS.queue_add_accepted();
        Ok(())
    }

    /// Move up to `max_count` items into `buffer[offset..]`, oldest first.
    ///
    /// Returns the number of items written. The scan stops at the first
    /// claimed-but-unpublished slot, so the queue is not guaranteed to be
    /// empty afterwards even without concurrent producers finishing.
    ///
    /// Must not be called concurrently with itself.
    pub fn drain(&self, buffer: &mut [Option<T>], offset: usize, max_count: usize) -> usize {
        let target = buffer.get_mut(offset..).unwrap_or_default();
        let limit = max_count.min(target.len());
        let mut target = target.iter_mut();

        self.drain_with(limit, |item| {
            if let Some(slot) = target.next() {
                *slot = Some(item);
            }
        })
    }

    /// Append up to `max_count` drained items to `out`.
    ///
    /// Same single-consumer contract as [`drain`](Self::drain).
    pub fn drain_into(&self, out: &mut Vec<T>, max_count: usize) -> usize {
        self.drain_with(max_count, |item| out.push(item))
    }

    fn drain_with(&self, max_count: usize, mut sink: impl FnMut(T)) -> usize {
        #[cfg(debug_assertions)]
        let _consumer = ConsumerGuard::enter(&self.draining);

        if self.count.load(Ordering::Acquire) == 0 {
            return 0;
        }

        // Swap the gates before scanning: anything published from here on
        // signals the fresh gates, not the ones being consumed.
        self.rearm();

        let capacity = self.slots.len();
        let limit = max_count.min(capacity);
        let back = self.back.load(Ordering::Relaxed);

        let mut drained = 0;
        while drained < limit {
            match self.slots[(back + drained) % capacity].take() {
                Some(item) => {
                    sink(item);
                    drained += 1;
                }
                // Claimed but not yet published: later slots must wait.
                None => break,
            }
        }

        if drained > 0 {
            self.back.store((back + drained) % capacity, Ordering::Relaxed);
            self.count.fetch_sub(drained, Ordering::AcqRel);
            METRICS.queue_drained(drained as u64);
        }

        let remaining = self.count.load(Ordering::Acquire);
        if remaining > 0 {
            self.drain_gate.load().set();
        }
        if remaining >= self.batch_threshold {
            self.batch_gate.load().set();
        }

        drained
    }

    /// Wait until at least one item is available to drain.
    ///
    /// Resolves without suspending when the queue is already non-empty.
    pub async fn wait_for_items(&self) {
        self.wait_until(&self.drain_gate, 1).await
    }

    /// Like [`wait_for_items`](Self::wait_for_items), bounded by `timeout`.
    ///
    /// Returns `false` on expiry. The timer and the waiter registration are
    /// released either way.
    pub async fn try_wait_for_items(&self, timeout: Duration) -> bool {
        if !self.is_empty() {
            return true;
        }
        tokio::time::timeout(timeout, self.wait_for_items())
            .await
            .is_ok()
    }

    /// Wait until at least `batch_threshold` items are available, bounded by
    /// `timeout`.
    ///
    /// `true` means the threshold was met at some instant during the wait; a
    /// concurrent drain may already have consumed part of the batch.
    pub async fn try_wait_for_batch(&self, timeout: Duration) -> bool {
        if self.len() >= self.batch_threshold {
            return true;
        }
        tokio::time::timeout(timeout, self.wait_until(&self.batch_gate, self.batch_threshold))
            .await
            .is_ok()
    }

    async fn wait_until(&self, gate: &ArcSwap<DrainSignal>, threshold: usize) {
        loop {
            if self.count.load(Ordering::Acquire) >= threshold {
                return;
            }

            // A drain that replaces this gate fires it on the way out, so
            // holding a stale gate never strands the waiter. Woken, we
            // re-check the count and pick up the current gate.
            let signal = gate.load_full();
            if self.count.load(Ordering::SeqCst) >= threshold {
                return;
            }

            // Fired, yet the count is short: a producer fired the gate a
            // drain installed after taking that producer's item. Retire it
            // so the wait suspends instead of spinning.
            if signal.is_set() {
                gate.compare_and_swap(&signal, Arc::new(DrainSignal::new()));
                continue;
            }

            signal.wait().await;
        }
    }

    fn rearm(&self) {
        self.drain_gate.swap(Arc::new(DrainSignal::new())).set();
        self.batch_gate.swap(Arc::new(DrainSignal::new())).set();
    }
}

impl<T> BoundedQueue<T> {
    /// Current number of claimed slots
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Check if queue is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if queue is full
    pub fn is_full(&self) -> bool {
        self.len() >= self.slots.len()
    }

    /// Maximum number of items the queue can hold
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Item count at which the batch wait resolves
    pub fn batch_threshold(&self) -> usize {
        self.batch_threshold
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.slots.len())
            .field("count", &self.count)
            .field("front", &self.front)
            .field("back", &self.back)
            .field("batch_threshold", &self.batch_threshold)
            .finish()
    }
}

/// Flags a second consumer entering `drain` while another is inside it.
/// Debug builds only.
#[cfg(debug_assertions)]
struct ConsumerGuard<'a>(&'a std::sync::atomic::AtomicBool);

#[cfg(debug_assertions)]
impl<'a> ConsumerGuard<'a> {
    fn enter(flag: &'a std::sync::atomic::AtomicBool) -> Self {
        let busy = flag.swap(true, Ordering::Acquire);
        debug_assert!(!busy, "BoundedQueue::drain called concurrently with itself");
        Self(flag)
    }
}

#[cfg(debug_assertions)]
impl Drop for ConsumerGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
