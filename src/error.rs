//! Error types for the queue and pool primitives
//!
//! Only construction mistakes and contract violations are errors. A full
//! queue, an empty drain or an expired wait are ordinary outcomes and are
//! reported through return values instead.

use thiserror::Error;

/// Errors raised while building a [`BoundedQueue`](crate::queue::BoundedQueue)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Batch threshold outside `1..=max(capacity, 1)`
    #[error("batch threshold {threshold} is out of range 1..={max}")]
    InvalidBatchThreshold { threshold: usize, max: usize },
}

/// Errors raised by [`BufferPool`](crate::pool::BufferPool)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// A returned buffer maps to a bucket but is not exactly that bucket's size
    #[error("attempt to return buffer of size {len} to a bucket with size {expected}")]
    SizeMismatch { len: usize, expected: usize },
}
