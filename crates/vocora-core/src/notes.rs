//! Note model: pitch-class slots, register sets, note events, and keying.
//!
//! Notes arrive as *relative* numbers (MIDI note minus the layout's lowest
//! note). Each relative number names one pitch class (`note mod 12`) and one
//! of four octave registers:
//!
//! | Relative note | Register | Harmonic stride |
//! |---------------|----------|-----------------|
//! | `< 0` (down to -128) | 0 | 1 |
//! | `0..12` | 0 | 1 |
//! | `12..24` | 1 | 2 |
//! | `24..36` | 2 | 4 |
//! | `>= 36` | 3 | 8 |
//!
//! Notes below -128 are ignored.
//!
//! [`NoteKeyer`] turns a stream of [`NoteEvent`]s into activation flags
//! according to the current [`KeyingMode`].

use core::time::Duration;

use crate::control::{ControlParams, KeyingMode};

/// Number of pitch classes.
pub const PITCH_CLASSES: usize = 12;

/// Number of octave registers per pitch class.
pub const REGISTERS: usize = 4;

/// Note-ons closer together than this join the same chord.
pub const CHORD_WINDOW: Duration = Duration::from_millis(40);

/// Relative note numbers below this split to the bass slot in double mode.
pub const DOUBLE_SPLIT: i32 = 12;

/// Set of active octave registers for one pitch class (bit `r` = register `r`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RegisterSet(u8);

impl RegisterSet {
    /// No registers active.
    pub const EMPTY: Self = Self(0);

    /// All four registers active.
    pub const ALL: Self = Self(0b1111);

    /// Build from raw bits; bits above register 3 are dropped.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0b1111)
    }

    /// Raw bit pattern.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether no register is active.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether `register` is active.
    pub const fn contains(self, register: usize) -> bool {
        register < REGISTERS && self.0 & (1 << register) != 0
    }

    /// Set with `register` added.
    pub const fn with(self, register: usize) -> Self {
        if register < REGISTERS { Self(self.0 | (1 << register)) } else { self }
    }

    /// Set with `register` removed.
    pub const fn without(self, register: usize) -> Self {
        if register < REGISTERS { Self(self.0 & !(1 << register)) } else { self }
    }

    /// Number of active registers.
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Active registers in ascending order.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..REGISTERS).filter(move |&r| self.contains(r))
    }
}

/// A pitch class and octave register addressed by a relative note.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NoteSlot {
    /// Pitch class, `0..12`.
    pub class: usize,
    /// Octave register, `0..4`.
    pub register: usize,
}

impl NoteSlot {
    /// Map a relative note number to its slot, or `None` below -128.
    pub fn from_relative(note: i32) -> Option<Self> {
        if note < -128 {
            return None;
        }
        let class = note.rem_euclid(PITCH_CLASSES as i32) as usize;
        let register = if note < 0 { 0 } else { (note / 12).min(REGISTERS as i32 - 1) as usize };
        Some(Self { class, register })
    }
}

/// Note activation event, as produced by a MIDI port or the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteEvent {
    /// Key pressed. A velocity of zero is a release.
    On {
        /// Relative note number.
        note: i32,
        /// MIDI velocity.
        velocity: u8,
    },
    /// Key released.
    Off {
        /// Relative note number.
        note: i32,
    },
    /// Release every note (return to the natural voice).
    AllOff,
}

impl NoteEvent {
    /// Fold a zero-velocity `On` into `Off`.
    pub fn normalized(self) -> Self {
        match self {
            Self::On { note, velocity: 0 } => Self::Off { note },
            other => other,
        }
    }
}

/// Applies keying rules to note events and writes activation flags.
///
/// The keyer is owned by the single thread that writes note activations.
/// Time is passed in by the caller so the chord window can be tested
/// without a clock.
#[derive(Debug, Clone, Default)]
pub struct NoteKeyer {
    mode: Option<KeyingMode>,
    last_on: Option<Duration>,
    bass: Option<i32>,
    melody: Option<i32>,
}

impl NoteKeyer {
    /// Create a keyer with no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event at time `now`.
    ///
    /// Reads the keying mode from `params`; a mode change since the last
    /// event clears every activation first.
    pub fn apply(&mut self, event: NoteEvent, now: Duration, params: &ControlParams) {
        let mode = params.keying();
        if self.mode != Some(mode) {
            if self.mode.is_some() {
                self.release_all(params);
            }
            self.mode = Some(mode);
        }

        match event.normalized() {
            NoteEvent::AllOff => self.release_all(params),
            NoteEvent::On { note, .. } => {
                let Some(slot) = NoteSlot::from_relative(note) else {
                    return;
                };
                match mode {
                    KeyingMode::Single => {
                        params.clear_notes();
                    }
                    KeyingMode::Double => {
                        let held = if note < DOUBLE_SPLIT { &mut self.bass } else { &mut self.melody };
                        if let Some(prev) = held.replace(note) {
                            if let Some(prev_slot) = NoteSlot::from_relative(prev) {
                                params.set_note(prev_slot, false);
                            }
                        }
                    }
                    KeyingMode::Chords => {
                        let fresh = self
                            .last_on
                            .is_none_or(|last| now.saturating_sub(last) > CHORD_WINDOW);
                        if fresh {
                            params.clear_notes();
                        }
                        self.last_on = Some(now);
                    }
                }
                params.set_note(slot, true);
            }
            NoteEvent::Off { note } => {
                let Some(slot) = NoteSlot::from_relative(note) else {
                    return;
                };
                if mode == KeyingMode::Double {
                    if self.bass == Some(note) {
                        self.bass = None;
                    } else if self.melody == Some(note) {
                        self.melody = None;
                    } else {
                        return;
                    }
                }
                params.set_note(slot, false);
            }
        }
    }

    fn release_all(&mut self, params: &ControlParams) {
        params.clear_notes();
        self.bass = None;
        self.melody = None;
        self.last_on = None;
    }
}
