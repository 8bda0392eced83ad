//! Harmonic resynthesizer: one voice per pitch class.
//!
//! For every active pitch class a voice maps the analyzed power spectrum onto
//! its own harmonic grid (bin `k` of a length-`N` transform is `k` times the
//! class fundamental), gives each harmonic a slowly drifting random phase, and
//! inverse-transforms the result into one period of waveform.
//!
//! ## Mapping strategies
//!
//! Register `r` keeps every `2^r`-th harmonic (stride 1, 2, 4, 8).
//!
//! - **Thin**: walk target harmonics `i = stride, 2·stride, ...` and read the
//!   analysis spectrum at `i · FFT_SIZE / N / formant` with linear
//!   interpolation.
//! - **Wide**: walk analysis bins `k` and splat each bin's power onto the two
//!   target harmonics bracketing `k · N / FFT_SIZE · formant / stride`.
//!   When `formant > 1` the analysis range shrinks by `formant` to avoid
//!   folding energy past the target grid.
//!
//! ## Overlap-add
//!
//! Each section reads `2 · FFT_SIZE` consecutive samples from the periodic
//! waveform. The first `FFT_SIZE` fade in over the current section, the next
//! `FFT_SIZE` fade out over the following one (or into the held-over buffer
//! when the section ends the block). The read cursor then rewinds by
//! `FFT_SIZE`, so the next section fades in exactly where this one faded out:
//!
//! ```text
//! section:     s            s+1          s+2
//! grain s:   /‾‾‾‾‾‾‾‾‾‾\
//! grain s+1:              /‾‾‾‾‾‾‾‾‾‾\
//! ```
//!
//! Triangles at 100% overlap sum to one, so reconstruction has no grain
//! boundaries.

use std::f32::consts::TAU;

use crate::FFT_SIZE;
use crate::analyzer::SPECTRUM_LEN;
use crate::layout::PitchLayout;
use crate::transform::{SpectralTransform, TransformPlanner};
use vocora_core::{MappingMode, PITCH_CLASSES, RegisterSet};

const HALF: usize = FFT_SIZE / 2;

/// Peak-to-peak phase drift per section, in radians.
pub const PHASE_DITHER: f32 = 0.0625;

/// Phase magnitude beyond which an accumulator wraps by a full turn.
pub const PHASE_WRAP: f32 = 4.0;

/// Numerical Recipes LCG, shared by all voices.
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    /// Seed the generator.
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Next value in `[0, 1)`.
    #[inline]
    pub fn next_unit(&mut self) -> f32 {
        self.state = self.state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let upper = (self.state >> 16) as u16;
        f32::from(upper) / 65_536.0
    }

    /// Next phase increment in `[-PHASE_DITHER/2, PHASE_DITHER/2)`.
    #[inline]
    fn dither(&mut self) -> f32 {
        PHASE_DITHER * self.next_unit() - PHASE_DITHER / 2.0
    }
}

/// Volume correction for a set of active voices.
///
/// Thin mode weighs each class/register by the fraction of target bins it
/// populates, `N / (2^r · FFT_SIZE)`; wide mode weighs every class/register
/// equally. Returns `sqrt(1 / total)`, or `None` when nothing is active.
pub fn volume_correction(
    registers: &[RegisterSet; PITCH_CLASSES],
    layout: &PitchLayout,
    mapping: MappingMode,
) -> Option<f32> {
    let mut total = 0.0f32;
    for (class, set) in layout.classes().iter().zip(registers) {
        for r in set.iter() {
            total += match mapping {
                MappingMode::Thin => class.period as f32 / ((1usize << r) * FFT_SIZE) as f32,
                MappingMode::Wide => 1.0,
            };
        }
    }
    (total > 0.0).then(|| (1.0 / total).sqrt())
}

/// Synthesis state for one pitch class.
pub struct Voice {
    period: usize,
    cursor: usize,
    phases: Vec<f32>,
    target: Vec<f32>,
    halfcomplex: Vec<f32>,
    wave: Vec<f32>,
    transform: Box<dyn SpectralTransform>,
}

impl Voice {
    /// Create a voice of period `transform.len()` with seeded phases.
    pub fn new(transform: Box<dyn SpectralTransform>, rng: &mut Lcg) -> Self {
        let period = transform.len();
        let harmonics = period.div_ceil(2);
        Self {
            period,
            cursor: 0,
            phases: (0..harmonics).map(|_| TAU * rng.next_unit()).collect(),
            target: vec![0.0; harmonics],
            halfcomplex: vec![0.0; period],
            wave: vec![0.0; period],
            transform,
        }
    }

    /// Synthesis period `N`.
    pub fn period(&self) -> usize {
        self.period
    }

    /// Harmonic phase accumulators.
    pub fn phases(&self) -> &[f32] {
        &self.phases
    }

    /// Mapped target power spectrum of the last section.
    pub fn target(&self) -> &[f32] {
        &self.target
    }

    /// Waveform synthesized for the last section.
    pub fn wave(&self) -> &[f32] {
        &self.wave
    }

    /// Map `spectrum` onto the harmonic grid for every register in `registers`.
    pub fn map_spectrum(
        &mut self,
        spectrum: &[f32],
        registers: RegisterSet,
        mapping: MappingMode,
        formant: f32,
    ) {
        debug_assert!(spectrum.len() >= SPECTRUM_LEN);
        self.target.fill(0.0);
        for r in registers.iter() {
            let stride = 1usize << r;
            match mapping {
                MappingMode::Thin => self.map_thin(spectrum, stride, formant),
                MappingMode::Wide => self.map_wide(spectrum, stride, formant),
            }
        }
    }

    fn map_thin(&mut self, spectrum: &[f32], stride: usize, formant: f32) {
        let scale = FFT_SIZE as f32 / self.period as f32 / formant;
        for i in (stride..self.target.len()).step_by(stride) {
            let position = i as f32 * scale;
            let point = position as usize;
            if point > HALF {
                break;
            }
            let frac = position - point as f32;
            self.target[i] += spectrum[point] * (1.0 - frac) + spectrum[point + 1] * frac;
        }
    }

    fn map_wide(&mut self, spectrum: &[f32], stride: usize, formant: f32) {
        let scale = formant * self.period as f32 / FFT_SIZE as f32 / stride as f32;
        let end = if formant > 1.0 { (HALF as f32 / formant) as usize } else { HALF };
        let len = self.target.len();
        for (k, &power) in spectrum.iter().enumerate().take(end).skip(1) {
            let position = k as f32 * scale;
            let point = position as usize;
            let frac = position - point as f32;
            let lo = point * stride;
            let hi = (point + 1) * stride;
            if lo < len {
                self.target[lo] += power * (1.0 - frac);
            }
            if hi < len {
                self.target[hi] += power * frac;
            }
        }
    }

    /// Turn the mapped target into one period of waveform.
    ///
    /// Every populated harmonic gets amplitude `sqrt(power) · correction /
    /// FFT_SIZE` and its phase drifts by a dither step.
    pub fn synthesize(&mut self, correction: f32, rng: &mut Lcg) {
        let n = self.period;
        self.halfcomplex[0] = 0.0;
        if n % 2 == 0 {
            self.halfcomplex[n / 2] = 0.0;
        }
        for i in 1..self.target.len() {
            let power = self.target[i];
            if power > 0.0 {
                let amp = power.sqrt() * correction / FFT_SIZE as f32;
                let mut phase = self.phases[i] + rng.dither();
                if phase >= PHASE_WRAP {
                    phase -= TAU;
                }
                if phase <= -PHASE_WRAP {
                    phase += TAU;
                }
                self.phases[i] = phase;
                self.halfcomplex[i] = amp * phase.cos();
                self.halfcomplex[n - i] = amp * phase.sin();
            } else {
                self.halfcomplex[i] = 0.0;
                self.halfcomplex[n - i] = 0.0;
            }
        }
        self.transform.inverse(&self.halfcomplex, &mut self.wave);
    }

    /// Overlap-add the waveform into the section of `out` at `start`.
    ///
    /// The fade-out half lands in `out` when another section follows within
    /// the block, otherwise in `held_over`.
    pub fn overlap_add(&mut self, out: &mut [f32], start: usize, held_over: &mut [f32]) {
        let n = self.period;
        let step = 1.0 / FFT_SIZE as f32;

        for (i, y) in out[start..start + FFT_SIZE].iter_mut().enumerate() {
            self.cursor = (self.cursor + 1) % n;
            *y += self.wave[self.cursor] * i as f32 * step;
        }

        let next = start + FFT_SIZE;
        let fade_out = if next < out.len() {
            &mut out[next..next + FFT_SIZE]
        } else {
            &mut held_over[..FFT_SIZE]
        };
        for (i, y) in fade_out.iter_mut().enumerate() {
            self.cursor = (self.cursor + 1) % n;
            *y += self.wave[self.cursor] * (FFT_SIZE - i) as f32 * step;
        }

        self.cursor = (self.cursor + n - FFT_SIZE % n) % n;
    }
}

/// The 12 voices plus the fade-out tail carried between blocks.
pub struct VoiceBank {
    voices: Vec<Voice>,
    rng: Lcg,
    held_over: Vec<f32>,
}

impl VoiceBank {
    /// Seed of the phase generator.
    pub const SEED: u32 = 0x5EED_F00D;

    /// Build one voice per class of `layout`.
    pub fn new(layout: &PitchLayout, planner: &mut dyn TransformPlanner) -> Self {
        let mut rng = Lcg::new(Self::SEED);
        let voices = layout
            .classes()
            .iter()
            .map(|class| Voice::new(planner.plan(class.period), &mut rng))
            .collect();
        Self {
            voices,
            rng,
            held_over: vec![0.0; FFT_SIZE],
        }
    }

    /// All voices, indexed by pitch class.
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Fade-out tail waiting for the next block.
    pub fn held_over(&self) -> &[f32] {
        &self.held_over
    }

    /// Add the held-over tail to the start of `out` and clear it.
    pub fn flush_held_over(&mut self, out: &mut [f32]) {
        for (y, h) in out.iter_mut().zip(self.held_over.iter_mut()) {
            *y += *h;
            *h = 0.0;
        }
    }

    /// Resynthesize every active voice for the section of `out` at `start`.
    #[allow(clippy::too_many_arguments)]
    pub fn render_section(
        &mut self,
        spectrum: &[f32],
        registers: &[RegisterSet; PITCH_CLASSES],
        mapping: MappingMode,
        formant: f32,
        correction: f32,
        out: &mut [f32],
        start: usize,
    ) {
        for (voice, &set) in self.voices.iter_mut().zip(registers) {
            if set.is_empty() {
                continue;
            }
            voice.map_spectrum(spectrum, set, mapping, formant);
            voice.synthesize(correction, &mut self.rng);
            voice.overlap_add(out, start, &mut self.held_over);
        }
    }
}
