//! Real-valued spectral transforms in halfcomplex layout.
//!
//! The analyzer and the voices only depend on the [`SpectralTransform`]
//! contract: a fixed length `n`, a forward real-to-spectrum transform, and an
//! unnormalized inverse. Spectra use the halfcomplex layout:
//!
//! ```text
//! index:  0     1 ..  n/2-1   n/2      n/2+1 .. n-1
//! value:  Re0   Re1 .. Re     Re(n/2)  Im .. Im1
//! ```
//!
//! `spectrum[k]` is the real part of bin `k` for `k <= n/2` and
//! `spectrum[n-k]` its imaginary part for `0 < k < n - k`. For even `n` the
//! Nyquist bin is purely real.
//!
//! [`RustFft`] implements the contract on top of `rustfft` with preallocated
//! buffers, so neither direction allocates after construction.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Fixed-size real transform pair.
pub trait SpectralTransform: Send {
    /// Transform length.
    fn len(&self) -> usize;

    /// Forward transform of `input` (length `n`) into halfcomplex `output`.
    fn forward(&mut self, input: &[f32], output: &mut [f32]);

    /// Unnormalized inverse of halfcomplex `input` into real `output`.
    ///
    /// `inverse(forward(x)) == n * x`.
    fn inverse(&mut self, input: &[f32], output: &mut [f32]);
}

/// Source of [`SpectralTransform`]s, one per required length.
pub trait TransformPlanner {
    /// Build a transform of length `len`.
    fn plan(&mut self, len: usize) -> Box<dyn SpectralTransform>;
}

/// `rustfft`-backed real transform.
pub struct RustFft {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl RustFft {
    /// Plan both directions of a length-`len` transform.
    pub fn new(planner: &mut FftPlanner<f32>, len: usize) -> Self {
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        Self {
            forward,
            inverse,
            buffer: vec![Complex::new(0.0, 0.0); len],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        }
    }
}

impl SpectralTransform for RustFft {
    fn len(&self) -> usize {
        self.buffer.len()
    }

    fn forward(&mut self, input: &[f32], output: &mut [f32]) {
        let n = self.buffer.len();
        debug_assert!(input.len() >= n && output.len() >= n);
        for (c, &x) in self.buffer.iter_mut().zip(input) {
            *c = Complex::new(x, 0.0);
        }
        self.forward.process_with_scratch(&mut self.buffer, &mut self.scratch);

        output[0] = self.buffer[0].re;
        for k in 1..n.div_ceil(2) {
            output[k] = self.buffer[k].re;
            output[n - k] = self.buffer[k].im;
        }
        if n % 2 == 0 {
            output[n / 2] = self.buffer[n / 2].re;
        }
    }

    fn inverse(&mut self, input: &[f32], output: &mut [f32]) {
        let n = self.buffer.len();
        debug_assert!(input.len() >= n && output.len() >= n);
        self.buffer[0] = Complex::new(input[0], 0.0);
        for k in 1..n.div_ceil(2) {
            let bin = Complex::new(input[k], input[n - k]);
            self.buffer[k] = bin;
            self.buffer[n - k] = bin.conj();
        }
        if n % 2 == 0 {
            self.buffer[n / 2] = Complex::new(input[n / 2], 0.0);
        }
        self.inverse.process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (y, c) in output.iter_mut().zip(&self.buffer) {
            *y = c.re;
        }
    }
}

/// [`TransformPlanner`] that shares one `rustfft` planner across lengths.
pub struct RustFftPlanner {
    planner: FftPlanner<f32>,
}

impl RustFftPlanner {
    /// Create an empty planner.
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }
}

impl Default for RustFftPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformPlanner for RustFftPlanner {
    fn plan(&mut self, len: usize) -> Box<dyn SpectralTransform> {
        Box::new(RustFft::new(&mut self.planner, len))
    }
}

/// Periodic-offset Hann window, `w[i] = 0.5 - 0.5 cos(pi (2i + 1) / n)`.
///
/// Sampled at half-sample offsets, so it never reaches exactly zero and
/// two copies shifted by `n/2` sum to one.
pub fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (PI * (2 * i + 1) as f32 / n as f32).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform(len: usize) -> Box<dyn SpectralTransform> {
        RustFftPlanner::new().plan(len)
    }

    #[test]
    fn test_forward_layout_of_cosine() {
        let n = 64;
        let mut fft = transform(n);
        let input: Vec<f32> = (0..n)
            .map(|i| (2.0 * PI * 5.0 * i as f32 / n as f32).cos())
            .collect();
        let mut out = vec![0.0; n];
        fft.forward(&input, &mut out);

        assert!((out[5] - n as f32 / 2.0).abs() < 1e-3);
        assert!(out[n - 5].abs() < 1e-3, "cosine has no imaginary part");
        for k in (0..n).filter(|&k| k != 5) {
            assert!(out[k].abs() < 1e-3, "bin {k} = {}", out[k]);
        }
    }

    #[test]
    fn test_forward_sine_lands_in_imaginary_half() {
        let n = 32;
        let mut fft = transform(n);
        let input: Vec<f32> = (0..n)
            .map(|i| (2.0 * PI * 3.0 * i as f32 / n as f32).sin())
            .collect();
        let mut out = vec![0.0; n];
        fft.forward(&input, &mut out);
        assert!((out[n - 3] + n as f32 / 2.0).abs() < 1e-3);
        assert!(out[3].abs() < 1e-3);
    }

    #[test]
    fn test_inverse_is_unnormalized_for_even_and_odd_lengths() {
        for n in [16usize, 17, 489, 512] {
            let mut fft = transform(n);
            let input: Vec<f32> = (0..n).map(|i| ((i * 7 % 13) as f32 - 6.0) / 6.0).collect();
            let mut spectrum = vec![0.0; n];
            let mut back = vec![0.0; n];
            fft.forward(&input, &mut spectrum);
            fft.inverse(&spectrum, &mut back);
            for (a, b) in input.iter().zip(&back) {
                assert!((a * n as f32 - b).abs() < 1e-2 * n as f32 / 16.0, "n={n}: {a} vs {b}");
            }
        }
    }

    #[test]
    fn test_inverse_of_single_bin_is_cosine() {
        let n = 40;
        let mut fft = transform(n);
        let mut spectrum = vec![0.0; n];
        spectrum[2] = 1.0;
        let mut wave = vec![0.0; n];
        fft.inverse(&spectrum, &mut wave);
        for (j, &w) in wave.iter().enumerate() {
            let expected = 2.0 * (2.0 * PI * 2.0 * j as f32 / n as f32).cos();
            assert!((w - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn test_hann_window_overlap_sums_to_one() {
        let n = 512;
        let w = hann_window(n);
        for i in 0..n / 2 {
            assert!((w[i] + w[i + n / 2] - 1.0).abs() < 1e-5);
        }
        assert!(w[0] > 0.0);
        assert!((w[n / 2] - 1.0).abs() < 1e-4);
        assert!((w[0] - w[n - 1]).abs() < 1e-6, "window is symmetric");
    }
}
