//! Utility modules

mod spin_lock;
mod tracing_setup;

pub use spin_lock::{RawSpinLock, SpinLock, SpinLockGuard};
pub use tracing_setup::init_tracing;
