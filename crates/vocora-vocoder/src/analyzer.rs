//! Spectral analyzer: windowed power spectrum and noise-floor handling.
//!
//! Each `FFT_SIZE`-sample section of a block is analyzed through two
//! 50%-overlapping Hann windows:
//!
//! ```text
//!            section s                section s+1
//!      |-----------------------|-----------------------|
//!      [      aligned          ]
//!  [      offset       ]
//!  ^ starts FFT_SIZE/2 before the section
//! ```
//!
//! For the first section of a block the first half of the offset window
//! comes from the previous block, carried as an already-windowed half
//! ([`SpectralAnalyzer::carry_tail`]).
//!
//! The two transforms are combined into an unnormalized power spectrum over
//! bins `1..=FFT_SIZE/2`:
//!
//! ```text
//! P[k] = A_re[k]² + A_im[k]² + B_re[k]² + B_im[k]²
//! P[0] = 0            (no DC)
//! P[FFT_SIZE/2] /= 2  (Nyquist has no imaginary partner)
//! P[FFT_SIZE/2 + 1] = 0  (guard bin for interpolation)
//! ```
//!
//! ## Noise handling
//!
//! - **Learning**: `noise[k] = max(noise[k], 2 P[k])`, spectrum passes with
//!   only the filter response applied.
//! - **Removal**: `P[k] = max(P[k] - noise[k], 0) * filter[k]`.

use crate::FFT_SIZE;
use crate::transform::{SpectralTransform, hann_window};

/// Number of analysis bins including DC and Nyquist.
pub const BINS: usize = FFT_SIZE / 2 + 1;

/// Spectrum length including the interpolation guard bin.
pub const SPECTRUM_LEN: usize = FFT_SIZE / 2 + 2;

const HALF: usize = FFT_SIZE / 2;

/// Combine two halfcomplex spectra into a power spectrum.
///
/// `aligned` and `offset` are halfcomplex of length `FFT_SIZE`; `out` must
/// hold [`SPECTRUM_LEN`] bins.
pub fn power_spectrum(aligned: &[f32], offset: &[f32], out: &mut [f32]) {
    let n = FFT_SIZE;
    for k in 1..=HALF {
        out[k] = aligned[n - k] * aligned[n - k]
            + aligned[k] * aligned[k]
            + offset[n - k] * offset[n - k]
            + offset[k] * offset[k];
    }
    // At k = n/2 the "imaginary" slot aliases the real one, counting it twice.
    out[0] = 0.0;
    out[HALF] /= 2.0;
    out[HALF + 1] = 0.0;
}

/// Ratchet the noise floor up toward `2 * spectrum`, then apply the filter.
pub fn learn_noise(spectrum: &mut [f32], noise: &mut [f32], filter: &[f32]) {
    for k in 1..=HALF {
        let doubled = spectrum[k] * 2.0;
        if noise[k] < doubled {
            noise[k] = doubled;
        }
        spectrum[k] *= filter[k];
    }
}

/// Subtract the noise floor, clamp at zero, then apply the filter.
pub fn remove_noise(spectrum: &mut [f32], noise: &[f32], filter: &[f32]) {
    for k in 1..=HALF {
        let cleaned = spectrum[k] - noise[k];
        spectrum[k] = if cleaned > 0.0 { cleaned * filter[k] } else { 0.0 };
    }
}

/// Apply the per-bin filter response alone.
pub fn apply_filter(spectrum: &mut [f32], filter: &[f32]) {
    for k in 1..=HALF {
        spectrum[k] *= filter[k];
    }
}

/// Two-window power-spectrum analyzer with carried overlap.
pub struct SpectralAnalyzer {
    transform: Box<dyn SpectralTransform>,
    window: Vec<f32>,
    aligned: Vec<f32>,
    offset: Vec<f32>,
    aligned_freq: Vec<f32>,
    offset_freq: Vec<f32>,
    spectrum: Vec<f32>,
    noise: Vec<f32>,
    filter: Vec<f32>,
}

impl SpectralAnalyzer {
    /// Create an analyzer around a length-`FFT_SIZE` transform.
    ///
    /// # Panics
    ///
    /// Panics if the transform length is not `FFT_SIZE`.
    pub fn new(transform: Box<dyn SpectralTransform>) -> Self {
        assert_eq!(transform.len(), FFT_SIZE, "analyzer needs a {FFT_SIZE}-point transform");
        Self {
            transform,
            window: hann_window(FFT_SIZE),
            aligned: vec![0.0; FFT_SIZE],
            offset: vec![0.0; FFT_SIZE],
            aligned_freq: vec![0.0; FFT_SIZE],
            offset_freq: vec![0.0; FFT_SIZE],
            spectrum: vec![0.0; SPECTRUM_LEN],
            noise: vec![0.0; BINS],
            filter: vec![1.0; BINS],
        }
    }

    /// Power spectrum of the most recent section.
    pub fn spectrum(&self) -> &[f32] {
        &self.spectrum
    }

    /// Learned noise floor.
    pub fn noise_floor(&self) -> &[f32] {
        &self.noise
    }

    /// Per-bin filter response (flat by default).
    pub fn filter(&self) -> &[f32] {
        &self.filter
    }

    /// Forget the learned noise floor.
    pub fn clear_noise(&mut self) {
        self.noise.fill(0.0);
    }

    /// Analyze the section of `block` starting at `start`.
    ///
    /// `discard_offset` zeroes the offset window's spectrum; used for the
    /// first section after entering vocoder mode, when the carried half
    /// belongs to audio the analyzer never saw.
    pub fn analyze_section(
        &mut self,
        block: &[f32],
        start: usize,
        discard_offset: bool,
        learning: bool,
    ) {
        let w = &self.window;
        for (i, slot) in self.aligned.iter_mut().enumerate() {
            *slot = block[start + i] * w[i];
        }
        if start == 0 {
            for i in HALF..FFT_SIZE {
                self.offset[i] = block[i - HALF] * w[i];
            }
        } else {
            for (i, slot) in self.offset.iter_mut().enumerate() {
                *slot = block[start + i - HALF] * w[i];
            }
        }

        self.transform.forward(&self.aligned, &mut self.aligned_freq);
        self.transform.forward(&self.offset, &mut self.offset_freq);
        if discard_offset {
            self.offset_freq.fill(0.0);
        }

        power_spectrum(&self.aligned_freq, &self.offset_freq, &mut self.spectrum);
        if learning {
            learn_noise(&mut self.spectrum, &mut self.noise, &self.filter);
        } else {
            remove_noise(&mut self.spectrum, &self.noise, &self.filter);
        }
    }

    /// Save the windowed last half-section of `block` for the next block's
    /// first offset window.
    pub fn carry_tail(&mut self, block: &[f32]) {
        let tail = &block[block.len() - HALF..];
        for (i, &x) in tail.iter().enumerate() {
            self.offset[i] = x * self.window[i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{RustFftPlanner, TransformPlanner};
    use std::f32::consts::PI;

    fn analyzer() -> SpectralAnalyzer {
        SpectralAnalyzer::new(RustFftPlanner::new().plan(FFT_SIZE))
    }

    fn tone(bin: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * PI * bin * i as f32 / FFT_SIZE as f32).sin())
            .collect()
    }

    fn peak_bin(spectrum: &[f32]) -> usize {
        spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map_or(0, |(i, _)| i)
    }

    #[test]
    fn test_power_spectrum_edges() {
        let aligned = vec![1.0; FFT_SIZE];
        let offset = vec![1.0; FFT_SIZE];
        let mut out = vec![7.0; SPECTRUM_LEN];
        power_spectrum(&aligned, &offset, &mut out);
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], 4.0);
        assert_eq!(out[HALF], 2.0);
        assert_eq!(out[HALF + 1], 0.0);
    }

    #[test]
    fn test_tone_peaks_at_its_bin() {
        let mut a = analyzer();
        let block = tone(32.0, 1024);
        a.analyze_section(&block, 512, false, false);
        assert_eq!(peak_bin(a.spectrum()), 32);
        assert!(a.spectrum().iter().all(|&p| p >= 0.0));
    }

    #[test]
    fn test_first_section_uses_carried_half() {
        let block = tone(20.0, 1024);

        // Reference: analyze the second section of one long block.
        let mut reference = analyzer();
        reference.analyze_section(&block, 512, false, false);

        // Same audio split into two blocks with the tail carried across.
        let mut split = analyzer();
        split.analyze_section(&block[..512], 0, false, false);
        split.carry_tail(&block[..512]);
        split.analyze_section(&block[512..], 0, false, false);

        for (a, b) in reference.spectrum().iter().zip(split.spectrum()) {
            assert!((a - b).abs() <= 1e-3 * a.abs().max(1.0), "{a} vs {b}");
        }
    }

    #[test]
    fn test_discard_offset_drops_stale_half() {
        let block = tone(20.0, 512);
        let mut full = analyzer();
        full.analyze_section(&block, 0, false, false);
        let mut discarded = analyzer();
        discarded.analyze_section(&block, 0, true, false);
        let sum_full: f32 = full.spectrum().iter().sum();
        let sum_discarded: f32 = discarded.spectrum().iter().sum();
        assert!(sum_discarded < sum_full);
        assert!(sum_discarded > 0.0);
    }

    #[test]
    fn test_learning_ratchets_and_removal_subtracts() {
        let mut a = analyzer();
        let block = tone(40.0, 1024);
        a.analyze_section(&block, 512, false, true);
        let learned = a.noise_floor()[40];
        let spectrum_40 = a.spectrum()[40];
        assert_eq!(learned, 2.0 * spectrum_40);

        // The same signal is now entirely below the floor.
        a.analyze_section(&block, 512, false, false);
        assert!(a.spectrum().iter().all(|&p| p == 0.0));

        // A quieter pass while learning never lowers the floor.
        let quiet: Vec<f32> = block.iter().map(|x| x * 0.1).collect();
        a.analyze_section(&quiet, 512, false, true);
        assert_eq!(a.noise_floor()[40], learned);

        a.clear_noise();
        assert!(a.noise_floor().iter().all(|&n| n == 0.0));
    }

    #[test]
    fn test_removal_with_empty_floor_is_filter_only() {
        let raw: Vec<f32> = (0..SPECTRUM_LEN).map(|k| (k % 17) as f32 * 0.5).collect();
        let filter: Vec<f32> = (0..BINS).map(|k| 1.0 - k as f32 / BINS as f32).collect();
        let noise = vec![0.0; BINS];

        let mut subtracted = raw.clone();
        remove_noise(&mut subtracted, &noise, &filter);
        let mut filtered = raw;
        apply_filter(&mut filtered, &filter);
        assert_eq!(subtracted, filtered);
    }
}
