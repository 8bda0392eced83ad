//! Mathematical utility functions for the vocoder's real-time path.
//!
//! All functions are allocation-free and suitable for `no_std`.
//!
//! # Level Conversions
//!
//! - [`db_to_linear`] / [`linear_to_db`] - Convert between dB and linear gain
//!
//! # Numeric Hygiene
//!
//! - [`flush_denormal`] - Snap decaying state to exact zero before it goes subnormal
//! - [`hard_clip`] - Clamp to a symmetric range, mapping non-finite input to silence

use libm::{expf, logf};

/// Convert decibels to linear gain.
///
/// # Arguments
/// * `db` - Value in decibels
///
/// # Returns
/// Linear gain value (e.g., 0 dB → 1.0, -6 dB → 0.5, +6 dB → 2.0)
///
/// # Example
/// ```rust
/// use vocora_core::db_to_linear;
///
/// assert!((db_to_linear(0.0) - 1.0).abs() < 0.001);
/// assert!((db_to_linear(-6.02) - 0.5).abs() < 0.01);
/// ```
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    // 10^(dB/20) = e^(dB * ln(10)/20)
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Convert linear gain to decibels.
///
/// Values at or below zero report -120 dB instead of negative infinity.
///
/// # Example
/// ```rust
/// use vocora_core::linear_to_db;
///
/// assert!((linear_to_db(1.0) - 0.0).abs() < 0.001);
/// assert!((linear_to_db(0.5) - (-6.02)).abs() < 0.01);
/// ```
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    const FACTOR: f32 = 20.0 / core::f32::consts::LN_10;
    if linear <= 0.0 {
        return -120.0;
    }
    (logf(linear) * FACTOR).max(-120.0)
}

/// Hard clip to ±threshold range.
///
/// Non-finite input (NaN, ±inf) is replaced by silence so a single bad
/// sample never reaches the output device.
#[inline]
pub fn hard_clip(x: f32, threshold: f32) -> f32 {
    if x.is_finite() {
        x.clamp(-threshold, threshold)
    } else {
        0.0
    }
}

/// Snap a decaying state variable to exact zero once it leaves the normal range.
///
/// Subnormal floats cost tens of cycles per operation on most CPUs. Every
/// exponentially decaying quantity on the audio thread (power and peak
/// estimates, the DC tracker, echo feedback) passes through here so it lands
/// on `0.0` instead of lingering in the subnormal range.
///
/// Reference: IEEE 754-2008, Section 3.4 (Subnormal numbers)
#[allow(clippy::inline_always)]
#[inline(always)]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < f32::MIN_POSITIVE { 0.0 } else { x }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_conversions() {
        assert!((db_to_linear(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_linear(20.0) - 10.0).abs() < 1e-4);
        assert!((db_to_linear(6.0) - 1.995).abs() < 1e-3);
        assert!((linear_to_db(10.0) - 20.0).abs() < 1e-4);
        assert_eq!(linear_to_db(0.0), -120.0);
        assert_eq!(linear_to_db(-1.0), -120.0);
    }

    #[test]
    fn test_hard_clip() {
        assert_eq!(hard_clip(0.5, 1.0), 0.5);
        assert_eq!(hard_clip(2.0, 1.0), 1.0);
        assert_eq!(hard_clip(-3.0, 1.0), -1.0);
        assert_eq!(hard_clip(f32::NAN, 1.0), 0.0);
        assert_eq!(hard_clip(f32::INFINITY, 1.0), 0.0);
    }

    #[test]
    fn test_flush_denormal() {
        // Normal values pass through
        assert_eq!(flush_denormal(1.0), 1.0);
        assert_eq!(flush_denormal(-0.5), -0.5);
        assert_eq!(flush_denormal(f32::MIN_POSITIVE), f32::MIN_POSITIVE);

        // Subnormal values are flushed to zero
        let subnormal = f32::MIN_POSITIVE / 4.0;
        assert!(subnormal > 0.0);
        assert_eq!(flush_denormal(subnormal), 0.0);
        assert_eq!(flush_denormal(-subnormal), 0.0);
        assert_eq!(flush_denormal(0.0), 0.0);
    }
}
