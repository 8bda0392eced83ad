//! Circular-buffer echo with decaying, polarity-inverting feedback.
//!
//! The buffer has a fixed power-of-two capacity ([`ECHO_CAPACITY`]) so both
//! cursors wrap with a mask. Per sample:
//!
//! ```text
//! out          = in + buffer[read]
//! buffer[read] = 0
//! buffer[write] += out * ECHO_FEEDBACK
//! read, write  = read + 1, write + 1   (mod capacity)
//! ```
//!
//! The delay is the distance between the two cursors. It only changes on
//! [`Echo::retime`], which also clears the buffer and re-anchors the write
//! cursor at `read + delay`, so a fresh echo starts immediately instead of
//! replaying stale content.

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std as alloc;

use alloc::vec;
use alloc::vec::Vec;

use crate::effect::Effect;
use crate::math::flush_denormal;

/// Echo buffer length in samples (a power of two).
pub const ECHO_CAPACITY: usize = 65536;

/// Gain applied to each echo round trip.
pub const ECHO_FEEDBACK: f32 = -0.125;

/// Delay used until the first tap-tempo gesture.
pub const DEFAULT_ECHO_DELAY: usize = 7654;

const MASK: usize = ECHO_CAPACITY - 1;

/// Fixed-capacity echo unit.
///
/// # Example
///
/// ```rust
/// use vocora_core::{Echo, Effect};
///
/// let mut echo = Echo::new();
/// echo.retime(100);
///
/// let mut out = [0.0f32; 201];
/// out[0] = 1.0;
/// echo.process_block_inplace(&mut out);
/// assert_eq!(out[100], -0.125);
/// assert_eq!(out[200], 0.015625);
/// ```
#[derive(Debug, Clone)]
pub struct Echo {
    buffer: Vec<f32>,
    read: usize,
    write: usize,
    delay: usize,
}

impl Echo {
    /// Allocate the buffer with the default delay.
    pub fn new() -> Self {
        Self {
            buffer: vec![0.0; ECHO_CAPACITY],
            read: 0,
            write: DEFAULT_ECHO_DELAY,
            delay: DEFAULT_ECHO_DELAY,
        }
    }

    /// Current delay in samples.
    pub fn delay(&self) -> usize {
        self.delay
    }

    /// Clear the buffer and restart the echo with a new delay.
    ///
    /// The delay is clamped to `1..ECHO_CAPACITY`.
    pub fn retime(&mut self, delay: usize) {
        self.delay = delay.clamp(1, MASK);
        self.buffer.fill(0.0);
        self.write = (self.read + self.delay) & MASK;
    }
}

impl Default for Echo {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Echo {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let out = input + self.buffer[self.read];
        self.buffer[self.read] = 0.0;
        let slot = &mut self.buffer[self.write];
        *slot = flush_denormal(*slot + out * ECHO_FEEDBACK);
        self.read = (self.read + 1) & MASK;
        self.write = (self.write + 1) & MASK;
        out
    }

    fn reset(&mut self) {
        self.retime(self.delay);
    }
}
