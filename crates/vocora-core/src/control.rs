//! Lock-free control-parameter channel between control threads and the
//! audio thread.
//!
//! Every field of [`ControlParams`] is an independent atomic primitive with
//! exactly one writer thread:
//!
//! | Field | Writer |
//! |-------|--------|
//! | note registers | note listener |
//! | everything else | interactive control thread |
//!
//! The audio thread only reads, once per block, through
//! [`ControlParams::snapshot`]. A torn read across fields is at worst one
//! block of stale value for one field, never unsafe.
//!
//! One-shot requests (clear the noise floor, clear and retime the echo) are
//! sequence counters. The writer bumps the counter; the audio thread serves
//! the request when the counter differs from the last value it saw, so the
//! audio thread never has to write back.

use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, AtomicU32, Ordering};
use core::time::Duration;

use crate::echo::{DEFAULT_ECHO_DELAY, ECHO_CAPACITY};
use crate::notes::{NoteSlot, PITCH_CLASSES, RegisterSet};

/// Lowest formant shift.
pub const FORMANT_MIN: f32 = 0.2;
/// Highest formant shift.
pub const FORMANT_MAX: f32 = 4.0;
/// Formant adjustment step used by the interactive controls.
pub const FORMANT_STEP: f32 = 0.05;
/// Default input gain in dB.
pub const DEFAULT_GAIN_DB: i32 = 6;
/// Default compressor threshold in dB.
pub const DEFAULT_THRESHOLD_DB: i32 = -15;
/// How long the learning flag stays up when noise removal is switched on.
pub const NOISE_LEARN_WINDOW: Duration = Duration::from_secs(1);

/// Spectral mapping strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MappingMode {
    /// Sparse harmonics, clearer.
    #[default]
    Thin,
    /// Dense spectrum, fuzzier.
    Wide,
}

/// How the natural voice mixes with the vocoder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ThroughMode {
    /// Vocoder only while notes are held, natural voice otherwise.
    #[default]
    Solo,
    /// Natural voice always present alongside the vocoder.
    Mix,
}

/// How note events populate the active set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyingMode {
    /// One note at a time.
    Single,
    /// Bassline plus melody.
    Double,
    /// Notes struck together form a chord.
    #[default]
    Chords,
}

impl MappingMode {
    fn from_u8(v: u8) -> Self {
        if v == 1 { Self::Wide } else { Self::Thin }
    }
}

impl ThroughMode {
    fn from_u8(v: u8) -> Self {
        if v == 1 { Self::Mix } else { Self::Solo }
    }
}

impl KeyingMode {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Single,
            1 => Self::Double,
            _ => Self::Chords,
        }
    }
}

/// A thread-safe `f32` parameter stored as bits in an `AtomicU32`.
#[derive(Debug)]
pub struct AtomicParam {
    value: AtomicU32,
    min: f32,
    max: f32,
    default: f32,
}

impl AtomicParam {
    /// Create a parameter with range and default.
    pub fn new(default: f32, min: f32, max: f32) -> Self {
        Self {
            value: AtomicU32::new(default.to_bits()),
            min,
            max,
            default,
        }
    }

    /// Store a value, clamped to range. NaN stores the default.
    #[inline]
    pub fn set(&self, v: f32) {
        let v = if v.is_nan() { self.default } else { v.clamp(self.min, self.max) };
        self.value.store(v.to_bits(), Ordering::Release);
    }

    /// Load the current value.
    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.value.load(Ordering::Acquire))
    }

    /// Lower bound.
    pub fn min(&self) -> f32 {
        self.min
    }

    /// Upper bound.
    pub fn max(&self) -> f32 {
        self.max
    }

    /// Restore the default.
    pub fn reset(&self) {
        self.set(self.default);
    }
}

/// Shared control state. Wrap in an `Arc` and hand one clone to each thread.
#[derive(Debug)]
pub struct ControlParams {
    registers: [AtomicU8; PITCH_CLASSES],
    learning: AtomicBool,
    noise_removal: AtomicBool,
    noise_clear_seq: AtomicU32,
    echo_enabled: AtomicBool,
    echo_delay: AtomicU32,
    echo_clear_seq: AtomicU32,
    mapping: AtomicU8,
    through: AtomicU8,
    keying: AtomicU8,
    formant: AtomicParam,
    gain_db: AtomicI32,
    threshold_db: AtomicI32,
    recording: AtomicBool,
}

/// Plain copy of [`ControlParams`] read by the audio thread once per block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlSnapshot {
    /// Active registers per pitch class.
    pub registers: [RegisterSet; PITCH_CLASSES],
    /// Noise learning in progress.
    pub learning: bool,
    /// Noise-clear request counter.
    pub noise_clear_seq: u32,
    /// Echo on or off.
    pub echo_enabled: bool,
    /// Echo delay in samples.
    pub echo_delay: usize,
    /// Echo clear-and-retime request counter.
    pub echo_clear_seq: u32,
    /// Spectral mapping strategy.
    pub mapping: MappingMode,
    /// Natural voice mixing.
    pub through: ThroughMode,
    /// Formant shift factor.
    pub formant: f32,
    /// Input gain in dB.
    pub gain_db: i32,
    /// Compressor threshold in dB (0 = off).
    pub threshold_db: i32,
    /// Recording on or off.
    pub recording: bool,
}

impl ControlSnapshot {
    /// Whether any pitch class has any register active.
    pub fn any_active(&self) -> bool {
        self.registers.iter().any(|r| !r.is_empty())
    }
}

impl ControlParams {
    /// Create the channel with default settings and no notes.
    pub fn new() -> Self {
        Self {
            registers: core::array::from_fn(|_| AtomicU8::new(0)),
            learning: AtomicBool::new(false),
            noise_removal: AtomicBool::new(false),
            noise_clear_seq: AtomicU32::new(0),
            echo_enabled: AtomicBool::new(false),
            echo_delay: AtomicU32::new(DEFAULT_ECHO_DELAY as u32),
            echo_clear_seq: AtomicU32::new(0),
            mapping: AtomicU8::new(MappingMode::Thin as u8),
            through: AtomicU8::new(ThroughMode::Solo as u8),
            keying: AtomicU8::new(KeyingMode::Chords as u8),
            formant: AtomicParam::new(1.0, FORMANT_MIN, FORMANT_MAX),
            gain_db: AtomicI32::new(DEFAULT_GAIN_DB),
            threshold_db: AtomicI32::new(DEFAULT_THRESHOLD_DB),
            recording: AtomicBool::new(false),
        }
    }

    /// Read every field once.
    pub fn snapshot(&self) -> ControlSnapshot {
        // Request counters first: a counter read here happens-before the
        // values it guards, so a served request never sees older values.
        let noise_clear_seq = self.noise_clear_seq.load(Ordering::Acquire);
        let echo_clear_seq = self.echo_clear_seq.load(Ordering::Acquire);
        ControlSnapshot {
            registers: core::array::from_fn(|i| {
                RegisterSet::from_bits(self.registers[i].load(Ordering::Acquire))
            }),
            learning: self.learning.load(Ordering::Acquire),
            noise_clear_seq,
            echo_enabled: self.echo_enabled.load(Ordering::Acquire),
            echo_delay: self.echo_delay.load(Ordering::Acquire) as usize,
            echo_clear_seq,
            mapping: MappingMode::from_u8(self.mapping.load(Ordering::Acquire)),
            through: ThroughMode::from_u8(self.through.load(Ordering::Acquire)),
            formant: self.formant.get(),
            gain_db: self.gain_db.load(Ordering::Acquire),
            threshold_db: self.threshold_db.load(Ordering::Acquire),
            recording: self.recording.load(Ordering::Acquire),
        }
    }

    // --- note registers (note listener thread) ---

    /// Activate or release one class/register slot.
    pub fn set_note(&self, slot: NoteSlot, on: bool) {
        let Some(cell) = self.registers.get(slot.class) else {
            return;
        };
        let bits = RegisterSet::from_bits(cell.load(Ordering::Acquire));
        let next = if on { bits.with(slot.register) } else { bits.without(slot.register) };
        cell.store(next.bits(), Ordering::Release);
    }

    /// Replace the register set of a pitch class.
    pub fn set_registers(&self, class: usize, registers: RegisterSet) {
        if let Some(cell) = self.registers.get(class) {
            cell.store(registers.bits(), Ordering::Release);
        }
    }

    /// Release every note.
    pub fn clear_notes(&self) {
        for cell in &self.registers {
            cell.store(0, Ordering::Release);
        }
    }

    // --- everything below: interactive control thread ---

    /// Start or stop noise learning.
    pub fn set_learning(&self, learning: bool) {
        self.learning.store(learning, Ordering::Release);
    }

    /// Whether noise learning is in progress.
    pub fn learning(&self) -> bool {
        self.learning.load(Ordering::Acquire)
    }

    /// Record whether a learned noise floor is in use.
    pub fn set_noise_removal(&self, on: bool) {
        self.noise_removal.store(on, Ordering::Release);
    }

    /// Whether a learned noise floor is in use.
    pub fn noise_removal(&self) -> bool {
        self.noise_removal.load(Ordering::Acquire)
    }

    /// Ask the audio thread to forget the noise floor and gate level.
    pub fn request_noise_clear(&self) {
        self.noise_clear_seq.fetch_add(1, Ordering::Release);
    }

    /// Turn the echo on with `delay` samples, or off when the delay does not
    /// fit the echo buffer. Always requests a clear-and-retime.
    ///
    /// Returns whether the echo ended up enabled.
    pub fn set_echo(&self, delay: Option<usize>) -> bool {
        let enabled = match delay {
            Some(d) if d > 0 && d < ECHO_CAPACITY => {
                self.echo_delay.store(d as u32, Ordering::Release);
                true
            }
            _ => false,
        };
        self.echo_enabled.store(enabled, Ordering::Release);
        // Publish after the values so a reader that sees the bump sees them.
        self.echo_clear_seq.fetch_add(1, Ordering::Release);
        #[cfg(feature = "tracing")]
        tracing::debug!(enabled, ?delay, "echo");
        enabled
    }

    /// Current echo delay in samples.
    pub fn echo_delay(&self) -> usize {
        self.echo_delay.load(Ordering::Acquire) as usize
    }

    /// Whether the echo is on.
    pub fn echo_enabled(&self) -> bool {
        self.echo_enabled.load(Ordering::Acquire)
    }

    /// Select the spectral mapping strategy.
    pub fn set_mapping(&self, mode: MappingMode) {
        self.mapping.store(mode as u8, Ordering::Release);
    }

    /// Current mapping strategy.
    pub fn mapping(&self) -> MappingMode {
        MappingMode::from_u8(self.mapping.load(Ordering::Acquire))
    }

    /// Select the natural-voice mixing mode.
    pub fn set_through(&self, mode: ThroughMode) {
        self.through.store(mode as u8, Ordering::Release);
    }

    /// Current natural-voice mixing mode.
    pub fn through(&self) -> ThroughMode {
        ThroughMode::from_u8(self.through.load(Ordering::Acquire))
    }

    /// Select the note keying mode.
    pub fn set_keying(&self, mode: KeyingMode) {
        self.keying.store(mode as u8, Ordering::Release);
    }

    /// Current keying mode.
    pub fn keying(&self) -> KeyingMode {
        KeyingMode::from_u8(self.keying.load(Ordering::Acquire))
    }

    /// Set the formant shift (clamped to 0.2..=4.0).
    pub fn set_formant(&self, formant: f32) {
        self.formant.set(formant);
        #[cfg(feature = "tracing")]
        tracing::debug!(formant = self.formant.get(), "formant");
    }

    /// Current formant shift.
    pub fn formant(&self) -> f32 {
        self.formant.get()
    }

    /// Set the input gain in dB.
    pub fn set_gain_db(&self, gain_db: i32) {
        self.gain_db.store(gain_db, Ordering::Release);
    }

    /// Current input gain in dB.
    pub fn gain_db(&self) -> i32 {
        self.gain_db.load(Ordering::Acquire)
    }

    /// Set the compressor threshold (0 to -60 dB, 3 dB steps, 0 = off).
    pub fn set_threshold_db(&self, threshold_db: i32) {
        let stepped = threshold_db.clamp(-60, 0) / 3 * 3;
        self.threshold_db.store(stepped, Ordering::Release);
    }

    /// Current compressor threshold in dB.
    pub fn threshold_db(&self) -> i32 {
        self.threshold_db.load(Ordering::Acquire)
    }

    /// Start or stop recording.
    pub fn set_recording(&self, recording: bool) {
        self.recording.store(recording, Ordering::Release);
    }

    /// Whether recording is on.
    pub fn recording(&self) -> bool {
        self.recording.load(Ordering::Acquire)
    }
}

impl Default for ControlParams {
    fn default() -> Self {
        Self::new()
    }
}
