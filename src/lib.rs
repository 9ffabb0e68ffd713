//! MyTunnel Collections - concurrent building blocks for hot paths
//!
//! Two primitives that bound memory and queueing under load:
//!
//! - [`BoundedQueue`]: fixed-capacity many-producers/single-consumer queue
//!   with non-blocking adds, batched drains and async drain notification.
//! - [`BufferPool`]: power-of-two size-class pool of reusable byte buffers
//!   with process-wide and per-pool rented-byte accounting.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod queue;
pub mod util;

pub use config::Config;
pub use error::{PoolError, QueueError};
pub use pool::{BufferPool, RentedBuffer};
pub use queue::BoundedQueue;

/// Crate version for display
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
