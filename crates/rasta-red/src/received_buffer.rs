//! Per-channel FIFO of in-order payloads awaiting the upper layer's read.

use std::collections::VecDeque;

use bytes::Bytes;

use crate::error::RedError;

/// Bounded FIFO of validated, in-order payloads.
///
/// The core checks free space before delivering, so overflowing the buffer
/// is a programming error, not a runtime condition.
pub struct ReceivedBuffer {
    queue: VecDeque<Bytes>,
    capacity: usize,
}

impl ReceivedBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a payload. Panics when the buffer is full.
    pub fn add(&mut self, payload: Bytes) {
        assert!(self.queue.len() < self.capacity, "received buffer overflow");
        self.queue.push_back(payload);
    }

    /// Copy the oldest payload into `buf` and remove it.
    ///
    /// Returns the payload length, [`RedError::NoMessageReceived`] when the
    /// buffer is empty, or [`RedError::InvalidBufferSize`] when `buf` is too
    /// small, in which case the payload stays queued.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, RedError> {
        let front = self.queue.front().ok_or(RedError::NoMessageReceived)?;
        if front.len() > buf.len() {
            return Err(RedError::InvalidBufferSize);
        }
        let payload = self.queue.pop_front().expect("non-empty received buffer");
        buf[..payload.len()].copy_from_slice(&payload);
        Ok(payload.len())
    }

    pub fn used_entries(&self) -> usize {
        self.queue.len()
    }

    pub fn free_entries(&self) -> usize {
        self.capacity - self.queue.len()
    }
}
