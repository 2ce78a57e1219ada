//! Monotonic millisecond time source.

use std::time::Instant;

/// A monotonic millisecond counter. Wrapping past `u32::MAX` is permitted;
/// all timer arithmetic in the layer is wraparound-safe.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

/// Default clock backed by [`Instant`], counting from construction.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }
}
