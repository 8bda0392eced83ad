//! DC offset removal for the raw microphone signal.
//!
//! Tracks the input's DC bias with a leaky integrator and subtracts it:
//!
//! ```text
//! offset[n] = offset[n-1] + (x[n] - offset[n-1]) / 32
//! y[n]      = x[n] - offset[n]
//! ```
//!
//! This is a one-pole highpass with pole at `31/32`. It is coarser than a
//! classic DC blocker but cheap, and it runs unconditionally on every input
//! sample before any mode decision is made.

use crate::effect::Effect;
use crate::math::flush_denormal;

/// Tracking coefficient of the leaky integrator.
pub const DC_TRACKING: f32 = 1.0 / 32.0;

/// Leaky-integrator DC offset tracker.
///
/// ## Example
///
/// ```rust
/// use vocora_core::{DcOffset, Effect};
///
/// let mut dc = DcOffset::new();
/// let mut out = 0.0;
/// for _ in 0..4096 {
///     out = dc.process(0.25);
/// }
/// assert!(out.abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DcOffset {
    /// Current DC estimate.
    offset: f32,
}

impl DcOffset {
    /// Create a tracker with a zero offset estimate.
    pub fn new() -> Self {
        Self { offset: 0.0 }
    }

    /// Current DC estimate.
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Condition `input` into `output` (equal lengths).
    pub fn process_into(&mut self, input: &[f32], output: &mut [f32]) {
        debug_assert_eq!(input.len(), output.len());
        for (x, y) in input.iter().zip(output.iter_mut()) {
            *y = self.process(*x);
        }
    }
}

impl Effect for DcOffset {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        self.offset = flush_denormal(self.offset + (input - self.offset) * DC_TRACKING);
        input - self.offset
    }

    fn reset(&mut self) {
        self.offset = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::PI;

    #[test]
    fn test_removes_constant_bias() {
        let mut dc = DcOffset::new();
        let mut output = 1.0;
        for _ in 0..2000 {
            output = dc.process(0.3);
        }
        assert!(output.abs() < 1e-6, "DC should be removed, got {}", output);
        assert!((dc.offset() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_first_sample_matches_formula() {
        let mut dc = DcOffset::new();
        let y = dc.process(1.0);
        assert_eq!(dc.offset(), 1.0 / 32.0);
        assert_eq!(y, 1.0 - 1.0 / 32.0);
    }

    #[test]
    fn test_passes_voice_band() {
        let mut dc = DcOffset::new();
        let sample_rate = 48000.0;
        let freq = 1000.0;
        let mut peak = 0.0f32;
        for i in 0..48000 {
            let x = libm::sinf(2.0 * PI * freq * i as f32 / sample_rate);
            let y = dc.process(x);
            if i > 47000 {
                peak = peak.max(y.abs());
            }
        }
        assert!(peak > 0.9, "1 kHz should pass, peak {}", peak);
    }

    #[test]
    fn test_offset_decays_to_exact_zero() {
        let mut dc = DcOffset::new();
        dc.process(1.0);
        for _ in 0..4000 {
            dc.process(0.0);
        }
        assert_eq!(dc.offset(), 0.0);
        assert_eq!(dc.process(0.0), 0.0);
    }

    #[test]
    fn test_reset() {
        let mut dc = DcOffset::new();
        dc.process(0.8);
        dc.reset();
        assert_eq!(dc.offset(), 0.0);
    }
}
