//! Vocora Vocoder - spectral analysis and harmonic resynthesis engine
//!
//! This crate turns a live voice into pitched voices, one block at a time:
//!
//! - [`transform`] - Real transform contract and the `rustfft` implementation
//! - [`layout`] - Pitch classes and periods derived from the sample rate
//! - [`analyzer`] - Two-window power spectrum with noise learning and removal
//! - [`voice`] - Harmonic resynthesis of the 12 pitch classes
//! - [`engine`] - Block engine tying it all together
//! - [`error`] - Fatal configuration errors
//!
//! Control state comes from [`vocora_core::ControlParams`], shared with the
//! control and note threads through an `Arc`.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vocora_core::{ControlParams, NoteSlot};
//! use vocora_vocoder::{FFT_SIZE, VocoderEngine};
//!
//! let params = Arc::new(ControlParams::new());
//! let mut engine = VocoderEngine::new(44100.0, Arc::clone(&params)).unwrap();
//! engine.reserve(2 * FFT_SIZE);
//!
//! // Hold the lowest class in its second register.
//! params.set_note(NoteSlot { class: 0, register: 1 }, true);
//!
//! let input = vec![0.0f32; 2 * FFT_SIZE];
//! let mut output = vec![0.0f32; 2 * FFT_SIZE];
//! engine.process_block(&input, &mut output).unwrap();
//! assert!(output.iter().all(|s| s.is_finite()));
//! ```

pub mod analyzer;
pub mod engine;
pub mod error;
pub mod layout;
pub mod transform;
pub mod voice;

/// Analysis section length in samples. Blocks must be a multiple of this.
pub const FFT_SIZE: usize = 512;

pub use analyzer::{BINS, SPECTRUM_LEN, SpectralAnalyzer};
pub use engine::{BlockSink, VocoderEngine};
pub use error::EngineError;
pub use layout::{NOTE_NAMES, PitchClass, PitchLayout};
pub use transform::{RustFft, RustFftPlanner, SpectralTransform, TransformPlanner, hann_window};
pub use voice::{Lcg, Voice, VoiceBank, volume_correction};
