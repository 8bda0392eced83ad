//! Pitch layout derived from the sample rate.
//!
//! Each of the 12 pitch classes is synthesized as one period of `N` samples,
//! so its fundamental is `sample_rate / N`. The layout picks the lowest
//! A-relative semitone `offset` whose period still fits in one analysis
//! window:
//!
//! ```text
//! offset = ceil(12 * log2(sample_rate / 110 / FFT_SIZE))
//! N_i    = floor(sample_rate / 110 / 2^((i + offset) / 12))
//! ```
//!
//! so every `N_i` lies in `(FFT_SIZE / 2, FFT_SIZE]`. Class 0 is therefore
//! the lowest note, and relative note 0 corresponds to MIDI note
//! `45 + offset` (A2 = 45).

use crate::FFT_SIZE;
use crate::error::EngineError;
use vocora_core::{PITCH_CLASSES, REGISTERS};

/// Note names starting from A.
pub const NOTE_NAMES: [&str; 12] = [
    "A", "Bb", "B", "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab",
];

/// Reference pitch of the layout (A2) in Hz.
pub const REFERENCE_HZ: f64 = 110.0;

/// MIDI note number of A2.
pub const REFERENCE_MIDI: i32 = 45;

/// Lowest accepted sample rate in Hz.
pub const MIN_SAMPLE_RATE: f32 = 4000.0;

/// Highest accepted sample rate in Hz.
pub const MAX_SAMPLE_RATE: f32 = 768_000.0;

/// One pitch class as laid out for a sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct PitchClass {
    /// Note name, e.g. `"Eb"`.
    pub name: &'static str,
    /// Synthesis period `N` in samples.
    pub period: usize,
}

impl PitchClass {
    /// Number of usable harmonic slots, `ceil(N / 2)`.
    pub fn harmonics(&self) -> usize {
        self.period.div_ceil(2)
    }
}

/// Setup-derived pitch tables for one sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct PitchLayout {
    sample_rate: f32,
    offset: i32,
    classes: Vec<PitchClass>,
    c_index: usize,
}

impl PitchLayout {
    /// Derive the layout for `sample_rate`.
    pub fn new(sample_rate: f32) -> Result<Self, EngineError> {
        if !sample_rate.is_finite() || !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate)
        {
            return Err(EngineError::InvalidSampleRate(sample_rate));
        }

        let sr = f64::from(sample_rate);
        let base = sr / REFERENCE_HZ;
        let offset = (12.0 * (base / FFT_SIZE as f64).log2()).ceil() as i32;

        let classes = (0..PITCH_CLASSES as i32)
            .map(|i| {
                let semis = i + offset;
                let period = (base / 2f64.powf(f64::from(semis) / 12.0)) as usize;
                PitchClass {
                    name: NOTE_NAMES[semis.rem_euclid(12) as usize],
                    // Rounding at the boundary can land one sample past the window.
                    period: period.min(FFT_SIZE),
                }
            })
            .collect();

        let c_index = (3 - offset).rem_euclid(12) as usize;

        Ok(Self {
            sample_rate,
            offset,
            classes,
            c_index,
        })
    }

    /// Sample rate the layout was built for.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Semitone offset of class 0 from A2.
    pub fn offset(&self) -> i32 {
        self.offset
    }

    /// All 12 classes, lowest first.
    pub fn classes(&self) -> &[PitchClass] {
        &self.classes
    }

    /// One class by index.
    pub fn class(&self, index: usize) -> Option<&PitchClass> {
        self.classes.get(index)
    }

    /// Index of the class named C.
    pub fn c_index(&self) -> usize {
        self.c_index
    }

    /// MIDI note number of relative note 0.
    pub fn midi_low(&self) -> i32 {
        REFERENCE_MIDI + self.offset
    }

    /// Relative note number for a MIDI note.
    pub fn relative_note(&self, midi: i32) -> i32 {
        midi - self.midi_low()
    }

    /// Fundamental of a class/register in Hz.
    pub fn frequency(&self, class: usize, register: usize) -> Option<f32> {
        let pc = self.classes.get(class)?;
        if register >= REGISTERS {
            return None;
        }
        Some(self.sample_rate / pc.period as f32 * (1 << register) as f32)
    }

    /// Display label such as `"Eb1"`.
    ///
    /// Octave numbers are relative to the layout: register 0 of the classes
    /// below C is octave 0, and the octave number steps up at C.
    pub fn label(&self, class: usize, register: usize) -> Option<String> {
        let pc = self.classes.get(class)?;
        if register >= REGISTERS {
            return None;
        }
        let octave = register + usize::from(class >= self.c_index);
        Some(format!("{}{}", pc.name, octave))
    }
}
