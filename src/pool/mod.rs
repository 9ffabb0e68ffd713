//! Memory pool management
//!
//! Size-bucketed buffer reuse for allocation-free hot paths.

mod bucket;
mod buffer;

pub use bucket::{bucket_index, bucket_size, MIN_BUFFER_SIZE};
pub use buffer::{
    BucketStats, BufferPool, BufferPoolStats, RentedBuffer, DEFAULT_MAX_BUFFERS_PER_BUCKET,
    DEFAULT_MAX_BUFFER_SIZE, MAX_BUFFER_SIZE_LIMIT,
};
