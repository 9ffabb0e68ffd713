//! Bucketed buffer pool
//!
//! Byte buffers are grouped into power-of-two size classes starting at 16
//! bytes. Each class keeps a small LIFO stack of returned buffers; rents
//! that miss allocate a buffer of the class size so it can be pooled later.

use once_cell::sync::Lazy;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::bucket::{bucket_index, bucket_size, Bucket, MIN_BUFFER_SIZE};
use crate::error::PoolError;
use crate::metrics::METRICS;

/// Default largest pooled buffer (1 MiB)
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1024 * 1024;
/// Default LIFO depth per size class
pub const DEFAULT_MAX_BUFFERS_PER_BUCKET: usize = 20;
/// Upper clamp for `max_buffer_size`
pub const MAX_BUFFER_SIZE_LIMIT: usize = 1 << 30;

/// Buckets probed on rent: the ideal one and the next larger one
const BUCKET_PROBE_WIDTH: usize = 2;

/// Bytes rented from all pools in the process
static RENTED_TOTAL: AtomicI64 = AtomicI64::new(0);

static SHARED: Lazy<BufferPool> = Lazy::new(BufferPool::default);

/// Inner pool state (shared across clones)
struct BufferPoolInner {
    buckets: Box<[Bucket]>,
    rented: AtomicI64,
}

impl BufferPoolInner {
    fn update_rented(&self, delta: i64) {
        RENTED_TOTAL.fetch_add(delta, Ordering::Relaxed);
        self.rented.fetch_add(delta, Ordering::Relaxed);
    }
}

/// Size-bucketed pool of reusable byte buffers.
///
/// Cloning is cheap and yields a handle to the same pool.
///
/// Rented-byte counters go up on every non-empty rent and down only when a
/// return actually stores the buffer. Buffers that are dropped, leaked or
/// refused by a full bucket stay counted; the figure is advisory.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<BufferPoolInner>,
}

impl BufferPool {
    /// Create a pool that keeps buffers up to `max_buffer_size` bytes, at
    /// most `max_buffers_per_bucket` per size class.
    ///
    /// `max_buffer_size` is clamped to `16..=1 GiB`.
    pub fn new(max_buffer_size: usize, max_buffers_per_bucket: usize) -> Self {
        let max_buffer_size = max_buffer_size.clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE_LIMIT);
        let bucket_count = bucket_index(max_buffer_size) + 1;

        let buckets: Vec<Bucket> = (0..bucket_count)
            .map(|index| Bucket::new(bucket_size(index), max_buffers_per_bucket))
            .collect();

        debug!(
            max_buffer_size,
            max_buffers_per_bucket,
            buckets = bucket_count,
            "Buffer pool created"
        );

        Self {
            inner: Arc::new(BufferPoolInner {
                buckets: buckets.into_boxed_slice(),
                rented: AtomicI64::new(0),
            }),
        }
    }

    /// Process-wide pool for call sites that don't need isolation
    pub fn shared() -> &'static BufferPool {
        &SHARED
    }

    /// Bytes currently rented from all pools in the process
    pub fn rented_total() -> i64 {
        RENTED_TOTAL.load(Ordering::Relaxed)
    }

    /// Bytes currently rented from this pool
    pub fn rented(&self) -> i64 {
        self.inner.rented.load(Ordering::Relaxed)
    }

    /// Largest buffer size this pool keeps
    pub fn max_buffer_size(&self) -> usize {
        self.inner
            .buckets
            .last()
            .map_or(MIN_BUFFER_SIZE, Bucket::buffer_size)
    }

    /// Rent a buffer of at least `minimum_size` bytes.
    ///
    /// Requests above [`max_buffer_size`](Self::max_buffer_size) get a fresh
    /// buffer of exactly `minimum_size` bytes that the pool won't take back.
    /// Pooled buffers are not cleared and may hold data from a previous use.
    pub fn rent(&self, minimum_size: usize) -> Box<[u8]> {
        self.rent_with_info(minimum_size).0
    }

    /// Like [`rent`](Self::rent), also reporting whether the buffer came
    /// from a bucket rather than a fresh allocation.
    pub fn rent_with_info(&self, minimum_size: usize) -> (Box<[u8]>, bool) {
        let (buffer, from_bucket) = self.rent_internal(minimum_size);
        if !buffer.is_empty() {
            self.inner.update_rented(buffer.len() as i64);
        }
        (buffer, from_bucket)
    }

    /// Rent a buffer that goes back to the pool when the guard is released
    /// or dropped.
    pub fn rent_scoped(&self, minimum_size: usize) -> RentedBuffer {
        RentedBuffer {
            buffer: Some(self.rent(minimum_size)),
            pool: self.clone(),
        }
    }

    fn rent_internal(&self, minimum_size: usize) -> (Box<[u8]>, bool) {
        if minimum_size == 0 {
            return (Box::default(), true);
        }

        let buckets = &self.inner.buckets;
        let index = bucket_index(minimum_size);
        if index >= buckets.len() {
            METRICS.pool_oversized();
            trace!(minimum_size, "Buffer larger than pooled sizes, allocating");
            return (vec![0u8; minimum_size].into_boxed_slice(), false);
        }

        for bucket in buckets[index..].iter().take(BUCKET_PROBE_WIDTH) {
            if let Some(buffer) = bucket.pop() {
                METRICS.pool_hit();
                return (buffer, true);
            }
        }

        METRICS.pool_miss();
        (vec![0u8; buckets[index].buffer_size()].into_boxed_slice(), false)
    }

    /// Give a buffer back to the pool.
    ///
    /// Returns `Ok(true)` when the buffer was stored. `Ok(false)` means it
    /// was dropped: it is empty, larger than any pooled size, or its bucket
    /// is full. A buffer whose length is not exactly a bucket size (for
    /// example one that was cut short) is dropped and reported as
    /// [`PoolError::SizeMismatch`].
    pub fn return_buffer(&self, buffer: Box<[u8]>) -> Result<bool, PoolError> {
        self.return_internal(buffer, false)
    }

    /// Zero the buffer, then [`return_buffer`](Self::return_buffer) it.
    pub fn return_cleared(&self, buffer: Box<[u8]>) -> Result<bool, PoolError> {
        self.return_internal(buffer, true)
    }

    fn return_internal(&self, mut buffer: Box<[u8]>, clear: bool) -> Result<bool, PoolError> {
        let len = buffer.len();
        if len == 0 {
            return Ok(false);
        }

        let Some(bucket) = self.inner.buckets.get(bucket_index(len)) else {
            return Ok(false);
        };

        if len != bucket.buffer_size() {
            warn!(len, expected = bucket.buffer_size(), "Rejected buffer of foreign size");
            return Err(PoolError::SizeMismatch {
                len,
                expected: bucket.buffer_size(),
            });
        }

        if clear {
            buffer.fill(0);
        }

        match bucket.push(buffer) {
            Ok(()) => {
                self.inner.update_rented(-(len as i64));
                METRICS.pool_returned();
                Ok(true)
            }
            Err(_dropped) => {
                METRICS.pool_return_dropped();
                trace!(len, "Bucket full, dropping buffer");
                Ok(false)
            }
        }
    }

    /// Get pool statistics
    pub fn stats(&self) -> BufferPoolStats {
        BufferPoolStats {
            rented: self.rented(),
            buckets: self
                .inner
                .buckets
                .iter()
                .map(|bucket| BucketStats {
                    buffer_size: bucket.buffer_size(),
                    stored: bucket.stored(),
                })
                .collect(),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFER_SIZE, DEFAULT_MAX_BUFFERS_PER_BUCKET)
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("buckets", &self.inner.buckets.len())
            .field("max_buffer_size", &self.max_buffer_size())
            .field("rented", &self.rented())
            .finish()
    }
}

/// A rented buffer that returns itself to its pool exactly once
pub struct RentedBuffer {
    buffer: Option<Box<[u8]>>,
    pool: BufferPool,
}

impl RentedBuffer {
    /// Return the buffer now. Later calls, and the eventual drop, are no-ops.
    ///
    /// Returns `true` if this call stored the buffer in the pool.
    pub fn release(&mut self) -> bool {
        match self.buffer.take() {
            // Lengths come straight from `rent`, so a size mismatch can't happen.
            Some(buffer) => matches!(self.pool.return_buffer(buffer), Ok(true)),
            None => false,
        }
    }

    /// Take the buffer out without returning it to the pool
    pub fn detach(mut self) -> Box<[u8]> {
        self.buffer.take().unwrap_or_default()
    }

    /// Check if the buffer was already released
    pub fn is_released(&self) -> bool {
        self.buffer.is_none()
    }
}

impl Deref for RentedBuffer {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.buffer.as_deref().unwrap_or_default()
    }
}

impl DerefMut for RentedBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.buffer.as_deref_mut().unwrap_or_default()
    }
}

impl Drop for RentedBuffer {
    fn drop(&mut self) {
        self.release();
    }
}

/// Buffer pool statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct BufferPoolStats {
    pub rented: i64,
    pub buckets: Vec<BucketStats>,
}

/// Occupancy of one size class
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BucketStats {
    pub buffer_size: usize,
    pub stored: usize,
}
