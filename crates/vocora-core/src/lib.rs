//! Vocora Core - real-time primitives for the vocora vocoder
//!
//! This crate holds every piece of the vocoder's signal path that does not
//! need a spectral transform, designed to run inside a hardware-clocked
//! audio callback with zero allocation after construction.
//!
//! # Core Abstractions
//!
//! ## Effect System
//!
//! - [`Effect`] - Per-sample processing trait
//! - [`EffectExt`] - Extension trait for chaining
//! - [`Chain`] - Zero-cost chain combinator
//!
//! ## Signal Path Stages
//!
//! - [`DcOffset`] - Leaky-integrator DC pre-conditioner
//! - [`NaturalGate`] - Power-tracking noise gate for the natural voice
//! - [`Dynamics`] - Gain, [`Compressor`] (table-driven, exponent-indexed), [`PeakLimiter`]
//! - [`Echo`] - Fixed power-of-two circular echo with inverting feedback
//!
//! ## Control
//!
//! - [`ControlParams`] - Lock-free, single-writer-per-field shared parameters
//! - [`ControlSnapshot`] - Per-block copy read by the audio thread
//! - [`NoteEvent`], [`NoteSlot`], [`RegisterSet`] - Note model
//! - [`NoteKeyer`] - Single / double / chord keying of note events
//! - [`TapTempo`] - Four-tap echo timing
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible. Disable the default `std` feature:
//!
//! ```toml
//! [dependencies]
//! vocora-core = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust
//! use vocora_core::{DcOffset, Dynamics, Echo, Effect};
//!
//! let mut dc = DcOffset::new();
//! let mut dynamics = Dynamics::new();
//! let mut echo = Echo::new();
//!
//! let mut block = [0.25f32; 512];
//! dc.process_block_inplace(&mut block);
//! dynamics.process_block(&mut block, 6, -15);
//! echo.process_block_inplace(&mut block);
//! ```
//!
//! # Design Principles
//!
//! - **Real-time safe**: No allocations, locks, or logging in processing paths
//! - **Denormal-free**: Every decaying estimate passes through [`flush_denormal`]
//! - **Single writer**: Each shared field has exactly one writer thread

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod control;
pub mod dc_offset;
pub mod dynamics;
pub mod echo;
pub mod effect;
pub mod gate;
pub mod math;
pub mod notes;
pub mod tempo;

// Re-export main types at crate root
pub use control::{
    AtomicParam, ControlParams, ControlSnapshot, DEFAULT_GAIN_DB, DEFAULT_THRESHOLD_DB,
    FORMANT_MAX, FORMANT_MIN, FORMANT_STEP, KeyingMode, MappingMode, NOISE_LEARN_WINDOW,
    ThroughMode,
};
pub use dc_offset::{DC_TRACKING, DcOffset};
pub use dynamics::{
    COMPRESSOR_ATTACK, COMPRESSOR_RATIO, COMPRESSOR_STEPS, Compressor, CompressorTable, Dynamics,
    LIMITER_RELEASE, MIN_THRESHOLD_DB, PeakLimiter,
};
pub use echo::{DEFAULT_ECHO_DELAY, ECHO_CAPACITY, ECHO_FEEDBACK, Echo};
pub use effect::{Chain, Effect, EffectExt};
pub use gate::{GATE_SMOOTHNESS, NaturalGate};
pub use math::{db_to_linear, flush_denormal, hard_clip, linear_to_db};
pub use notes::{
    CHORD_WINDOW, DOUBLE_SPLIT, NoteEvent, NoteKeyer, NoteSlot, PITCH_CLASSES, REGISTERS,
    RegisterSet,
};
pub use tempo::{TAP_COUNT, TAP_TOLERANCE, TapOutcome, TapTempo};
