//! Size-class bucket
//!
//! A bounded LIFO stack of equally sized buffers. The spinlock covers only
//! the slot move and the `top` update; buffers are never allocated or freed
//! while it is held.

use crate::util::SpinLock;

/// Smallest pooled buffer size; bucket `i` holds `MIN_BUFFER_SIZE << i` bytes
pub const MIN_BUFFER_SIZE: usize = 16;

/// Index of the smallest bucket whose buffers hold at least `size` bytes.
///
/// `size` must be non-zero. Sizes 1..=16 map to 0, 17..=32 to 1, and so on.
#[inline]
pub fn bucket_index(size: usize) -> usize {
    debug_assert!(size > 0);
    let bits = (size - 1) >> 4;
    (usize::BITS - bits.leading_zeros()) as usize
}

/// Canonical buffer length of bucket `index`
#[inline]
pub const fn bucket_size(index: usize) -> usize {
    MIN_BUFFER_SIZE << index
}

struct Stack {
    slots: Box<[Option<Box<[u8]>>]>,
    /// Number of stored buffers
    top: usize,
}

pub(crate) struct Bucket {
    buffer_size: usize,
    stack: SpinLock<Stack>,
}

impl Bucket {
    pub(crate) fn new(buffer_size: usize, max_buffers: usize) -> Self {
        let slots: Vec<Option<Box<[u8]>>> = (0..max_buffers).map(|_| None).collect();
        Self {
            buffer_size,
            stack: SpinLock::new(Stack {
                slots: slots.into_boxed_slice(),
                top: 0,
            }),
        }
    }

    pub(crate) fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Take the most recently stored buffer, if any
    pub(crate) fn pop(&self) -> Option<Box<[u8]>> {
        let mut stack = self.stack.lock();
        if stack.top == 0 {
            return None;
        }
        stack.top -= 1;
        let top = stack.top;
        stack.slots[top].take()
    }

    /// Store a buffer; hands it back when the bucket is full.
    ///
    /// The caller guarantees the length matches `buffer_size`.
    pub(crate) fn push(&self, buffer: Box<[u8]>) -> Result<(), Box<[u8]>> {
        debug_assert_eq!(buffer.len(), self.buffer_size);

        let mut stack = self.stack.lock();
        let top = stack.top;
        if top == stack.slots.len() {
            return Err(buffer);
        }
        stack.slots[top] = Some(buffer);
        stack.top += 1;
        Ok(())
    }

    /// Number of stored buffers
    pub(crate) fn stored(&self) -> usize {
        self.stack.lock().top
    }
}
