//! Output dynamics: gain stage, table-driven compressor, and peak limiter.
//!
//! # Signal Flow
//!
//! ```text
//! Input → Gain → ┬─ threshold < 0 ─→ Compressor → Peak Limiter → Output
//!                └─ threshold = 0 ─→ Hard clamp [-1, 1] ────────→ Output
//! ```
//!
//! # Compressor
//!
//! The compressor tracks a single-pole smoothed power estimate
//! (`power += (x² - power) / 4096`). Gain is looked up in a 40-entry table
//! holding one entry per 3 dB of power above the knee. Rather than calling
//! `powf` per sample, the table index is read straight out of the estimate's
//! IEEE-754 exponent bits, and the 23 mantissa bits linearly interpolate
//! toward the next entry:
//!
//! ```text
//! bits  = power.to_bits()
//! index = exponent(bits) - (127 + threshold/3)
//! gain  = table[index] * (1 - (1 - table[1]) * mantissa(bits) / 2^23)
//! ```
//!
//! Each doubling of power (3 dB) multiplies the gain by `table[1]`, which
//! yields a fixed `COMPRESSOR_RATIO`:1 slope above the knee.
//!
//! # Limiter
//!
//! An exponentially decaying peak follower (release 1024 samples). Whenever
//! the peak exceeds 1.0 the sample is divided by it, so the output never
//! leaves [-1, 1].

use crate::effect::{Chain, Effect, EffectExt};
use crate::math::{db_to_linear, flush_denormal, hard_clip};
use libm::powf;

/// Compressor attack time constant in samples.
pub const COMPRESSOR_ATTACK: f32 = 4096.0;

/// Decibel ratio of the compressor above the knee.
pub const COMPRESSOR_RATIO: f32 = 2.0;

/// Number of 3 dB steps covered by the compressor gain table.
pub const COMPRESSOR_STEPS: usize = 40;

/// Limiter release time constant in samples.
pub const LIMITER_RELEASE: f32 = 1024.0;

/// Lowest configurable compressor threshold in dB.
pub const MIN_THRESHOLD_DB: i32 = -60;

const EXPONENT_MASK: u32 = 0x7F80_0000;
const MANTISSA_MASK: u32 = 0x007F_FFFF;
const MANTISSA_SCALE: f32 = 8_388_608.0; // 2^23

/// Gain for each 3 dB step of power above the compressor knee.
///
/// `gains[0]` is unity; each following entry is the previous one times
/// `2^(0.5/ratio - 0.5)`, so the table is strictly decreasing for any
/// ratio above 1.
#[derive(Debug, Clone)]
pub struct CompressorTable {
    gains: [f32; COMPRESSOR_STEPS],
}

impl CompressorTable {
    /// Build the table for a compression ratio (clamped to at least 1:1).
    pub fn new(ratio: f32) -> Self {
        let ratio = ratio.max(1.0);
        let step = powf(2.0, 0.5 / ratio - 0.5);
        let mut gains = [1.0; COMPRESSOR_STEPS];
        for i in 1..COMPRESSOR_STEPS {
            gains[i] = gains[i - 1] * step;
        }
        Self { gains }
    }

    /// All table entries, index 0 first.
    pub fn gains(&self) -> &[f32; COMPRESSOR_STEPS] {
        &self.gains
    }

    /// Gain multiplier per 3 dB step (`gains[1]`).
    #[inline]
    pub fn step(&self) -> f32 {
        self.gains[1]
    }

    /// Gain applied once power runs past the end of the table.
    #[inline]
    pub fn floor(&self) -> f32 {
        self.gains[COMPRESSOR_STEPS - 1] * self.gains[1]
    }
}

impl Default for CompressorTable {
    fn default() -> Self {
        Self::new(COMPRESSOR_RATIO)
    }
}

/// Soft-knee compressor driven by [`CompressorTable`].
///
/// The threshold moves in 3 dB steps; values are truncated toward zero to
/// the nearest multiple of 3 and clamped to `-60..=0`. A threshold of 0
/// means "disabled"; [`Compressor::gain_for_power`] still works but
/// [`Dynamics`] bypasses the compressor entirely.
#[derive(Debug, Clone)]
pub struct Compressor {
    table: CompressorTable,
    threshold_db: i32,
    /// Biased float exponent of the knee power.
    bias: i32,
    /// Power below which no gain is applied.
    knee: f32,
    /// Power at which the table runs out.
    max: f32,
    /// Mantissa interpolation slope.
    coeff: f32,
    /// Smoothed power estimate.
    power: f32,
}

impl Compressor {
    /// Create a compressor with the given threshold in dB.
    pub fn new(threshold_db: i32) -> Self {
        let table = CompressorTable::default();
        let coeff = (1.0 - table.step()) / MANTISSA_SCALE;
        let mut comp = Self {
            table,
            threshold_db: 0,
            bias: 127,
            knee: 1.0,
            max: 1.0,
            coeff,
            power: 0.0,
        };
        comp.set_threshold_db(threshold_db);
        comp
    }

    /// Set the threshold in dB (truncated to a 3 dB step, clamped to -60..=0).
    pub fn set_threshold_db(&mut self, threshold_db: i32) {
        let steps = threshold_db.clamp(MIN_THRESHOLD_DB, 0) / 3;
        self.threshold_db = steps * 3;
        self.bias = 127 + steps;
        self.knee = powf(2.0, steps as f32);
        self.max = powf(2.0, (COMPRESSOR_STEPS as i32 + steps) as f32);
    }

    /// Effective threshold in dB (a multiple of 3).
    pub fn threshold_db(&self) -> i32 {
        self.threshold_db
    }

    /// Whether the threshold engages the compressor.
    pub fn is_enabled(&self) -> bool {
        self.threshold_db < 0
    }

    /// Current smoothed power estimate.
    pub fn power(&self) -> f32 {
        self.power
    }

    /// The gain table in use.
    pub fn table(&self) -> &CompressorTable {
        &self.table
    }

    /// Gain the compressor applies for a given power estimate.
    ///
    /// Unity at or below the knee, interpolated table lookup between the
    /// knee and the table's end, and the table floor beyond it.
    #[inline]
    pub fn gain_for_power(&self, power: f32) -> f32 {
        if power >= self.max {
            self.table.floor()
        } else if power > self.knee {
            let bits = power.to_bits();
            let exponent = ((bits & EXPONENT_MASK) >> 23) as i32;
            let index = (exponent - self.bias).clamp(0, COMPRESSOR_STEPS as i32 - 1) as usize;
            let mantissa = (bits & MANTISSA_MASK) as f32;
            self.table.gains[index] * (1.0 - self.coeff * mantissa)
        } else {
            1.0
        }
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(-15)
    }
}

impl Effect for Compressor {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        self.power = flush_denormal(self.power + (input * input - self.power) / COMPRESSOR_ATTACK);
        input * self.gain_for_power(self.power)
    }

    fn reset(&mut self) {
        self.power = 0.0;
    }
}

/// Peak limiter with exponential release.
#[derive(Debug, Clone, Default)]
pub struct PeakLimiter {
    peak: f32,
}

impl PeakLimiter {
    const DECAY: f32 = 1.0 - 1.0 / LIMITER_RELEASE;

    /// Create a limiter with a zero peak estimate.
    pub fn new() -> Self {
        Self { peak: 0.0 }
    }

    /// Current peak estimate.
    pub fn peak(&self) -> f32 {
        self.peak
    }
}

impl Effect for PeakLimiter {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        self.peak = flush_denormal(self.peak * Self::DECAY);
        if -input > self.peak {
            self.peak = -input;
        } else if input > self.peak {
            self.peak = input;
        }
        if self.peak > 1.0 { input / self.peak } else { input }
    }

    fn reset(&mut self) {
        self.peak = 0.0;
    }
}

/// Complete output dynamics stage.
///
/// Applies the input gain, then either the compressor → limiter chain or a
/// hard clamp, depending on the threshold passed for the block.
///
/// # Example
///
/// ```rust
/// use vocora_core::Dynamics;
///
/// let mut dynamics = Dynamics::new();
/// let mut block = [0.5f32; 512];
/// dynamics.process_block(&mut block, 6, -15);
/// assert!(block.iter().all(|s| s.abs() <= 1.0));
/// ```
#[derive(Debug, Clone)]
pub struct Dynamics {
    chain: Chain<Compressor, PeakLimiter>,
    compressing: bool,
}

impl Dynamics {
    /// Create the dynamics stage with the compressor disengaged.
    pub fn new() -> Self {
        Self {
            chain: Compressor::new(0).chain(PeakLimiter::new()),
            compressing: false,
        }
    }

    /// The compressor half of the chain.
    pub fn compressor(&self) -> &Compressor {
        self.chain.first()
    }

    /// The limiter half of the chain.
    pub fn limiter(&self) -> &PeakLimiter {
        self.chain.second()
    }

    /// Process one block in place.
    ///
    /// `gain_db` is the input gain; `threshold_db` below zero engages the
    /// compressor. Switching the compressor in or out resets both estimates.
    /// A non-finite power estimate (a NaN reached the detector) resets the
    /// chain and degrades the block to hard clamping.
    pub fn process_block(&mut self, buffer: &mut [f32], gain_db: i32, threshold_db: i32) {
        let gain = db_to_linear(gain_db as f32);
        for sample in buffer.iter_mut() {
            *sample *= gain;
        }

        self.chain.first_mut().set_threshold_db(threshold_db);
        let enabled = self.chain.first().is_enabled();
        if enabled != self.compressing {
            self.chain.reset();
            self.compressing = enabled;
        }

        if enabled {
            self.chain.process_block_inplace(buffer);
            if self.chain.first().power().is_finite() && self.chain.second().peak().is_finite() {
                return;
            }
            self.chain.reset();
        }

        for sample in buffer.iter_mut() {
            *sample = hard_clip(*sample, 1.0);
        }
    }

    /// Clear both estimates.
    pub fn reset(&mut self) {
        self.chain.reset();
    }
}

impl Default for Dynamics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    extern crate alloc;
    use super::*;
    use alloc::vec;

    #[test]
    fn test_table_shape() {
        let table = CompressorTable::default();
        let gains = table.gains();
        assert_eq!(gains[0], 1.0);
        assert!((table.step() - powf(2.0, -0.25)).abs() < 1e-6);
        for pair in gains.windows(2) {
            assert!(pair[1] <= pair[0], "table must be non-increasing");
        }
    }

    #[test]
    fn test_threshold_quantization() {
        let mut comp = Compressor::new(-16);
        assert_eq!(comp.threshold_db(), -15);
        comp.set_threshold_db(-100);
        assert_eq!(comp.threshold_db(), -60);
        comp.set_threshold_db(5);
        assert_eq!(comp.threshold_db(), 0);
        assert!(!comp.is_enabled());
    }

    #[test]
    fn test_gain_below_knee_is_unity() {
        let comp = Compressor::new(-15);
        // knee = 2^-5
        assert_eq!(comp.gain_for_power(0.0), 1.0);
        assert_eq!(comp.gain_for_power(1.0 / 64.0), 1.0);
        assert_eq!(comp.gain_for_power(1.0 / 32.0), 1.0);
    }

    #[test]
    fn test_gain_at_octave_boundaries_matches_table() {
        let comp = Compressor::new(-15);
        let table = comp.table().gains();
        // Exact powers of two have zero mantissa: gain is the raw table entry.
        for k in 1..10 {
            let power = powf(2.0, (-5 + k) as f32);
            let gain = comp.gain_for_power(power);
            assert!((gain - table[k as usize]).abs() < 1e-6, "k={k} gain={gain}");
        }
    }

    #[test]
    fn test_gain_interpolation_is_monotonic() {
        let comp = Compressor::new(-30);
        let mut last = 1.0f32;
        let mut power = 1e-3f32;
        while power < 1e3 {
            let gain = comp.gain_for_power(power);
            assert!(gain <= last + 1e-6, "gain rose at power {power}");
            last = gain;
            power *= 1.05;
        }
    }

    #[test]
    fn test_gain_clamps_past_table_end() {
        let comp = Compressor::new(-60);
        let floor = comp.table().floor();
        assert_eq!(comp.gain_for_power(1e30), floor);
    }

    #[test]
    fn test_compressor_reduces_sustained_level() {
        let mut comp = Compressor::new(-30);
        let mut out = 0.0;
        for _ in 0..50_000 {
            out = comp.process(0.5);
        }
        assert!(out < 0.5 * 0.5, "expected heavy compression, got {out}");
    }

    #[test]
    fn test_limiter_holds_unit_ceiling() {
        let mut lim = PeakLimiter::new();
        for i in 0..4096 {
            let x = if i % 2 == 0 { 3.0 } else { -2.5 };
            let y = lim.process(x);
            assert!(y.abs() <= 1.0 + 1e-6, "sample {i}: {y}");
        }
    }

    #[test]
    fn test_limiter_peak_decays_to_zero() {
        let mut lim = PeakLimiter::new();
        lim.process(0.9);
        for _ in 0..200_000 {
            lim.process(0.0);
        }
        assert_eq!(lim.peak(), 0.0);
    }

    #[test]
    fn test_dynamics_hard_clamps_without_threshold() {
        let mut dynamics = Dynamics::new();
        let mut block = vec![2.0, -2.0, 0.5, f32::NAN];
        dynamics.process_block(&mut block, 0, 0);
        assert_eq!(block, vec![1.0, -1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_dynamics_applies_gain() {
        let mut dynamics = Dynamics::new();
        let mut block = vec![0.1; 8];
        dynamics.process_block(&mut block, 20, 0);
        for s in block {
            assert!((s - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_dynamics_degrades_on_nan() {
        let mut dynamics = Dynamics::new();
        let mut block = vec![0.2, f32::NAN, 0.3, 0.4];
        dynamics.process_block(&mut block, 0, -15);
        assert!(block.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
        assert_eq!(dynamics.compressor().power(), 0.0);

        let mut next = vec![0.5; 64];
        dynamics.process_block(&mut next, 0, -15);
        assert!(next.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_dynamics_output_bounded_with_compressor() {
        let mut dynamics = Dynamics::new();
        let mut block: alloc::vec::Vec<f32> =
            (0..8192).map(|i| libm::sinf(i as f32 * 0.01) * 4.0).collect();
        dynamics.process_block(&mut block, 12, -15);
        assert!(block.iter().all(|s| s.abs() <= 1.0 + 1e-6));
    }
}
