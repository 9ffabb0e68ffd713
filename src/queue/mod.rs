//! Bounded queues
//!
//! Fixed-capacity hand-off between many producers and one batching consumer.

mod bounded;
mod signal;

pub use bounded::BoundedQueue;
