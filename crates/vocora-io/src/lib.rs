//! Audio I/O layer for the vocora vocoder.
//!
//! This crate connects the block engine to the outside world:
//!
//! - **Real-time streaming**: [`VoiceStream`] runs a [`VocoderEngine`] in a
//!   cpal duplex stream, with [`BlockAdapter`] bridging device callbacks to
//!   fixed engine blocks
//! - **Note events**: [`spawn_note_listener`] applies keying rules to a
//!   channel of [`NoteEvent`]s
//! - **Recording**: [`recorder`] pairs a lock-free [`RecordingSink`] on the
//!   audio thread with a WAV writer thread
//! - **Offline rendering**: [`render_buffer`] and [`process_file`]
//! - **WAV file I/O**: [`read_wav`] and [`write_wav`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vocora_core::{ControlParams, NoteSlot};
//! use vocora_io::process_file;
//!
//! let params = Arc::new(ControlParams::new());
//! params.set_note(NoteSlot { class: 0, register: 1 }, true);
//! process_file("speech.wav", "sung.wav", &params, 1024)?;
//! ```
//!
//! [`VocoderEngine`]: vocora_vocoder::VocoderEngine
//! [`NoteEvent`]: vocora_core::NoteEvent

mod adapter;
mod listener;
mod offline;
mod recorder;
mod stream;
mod wav;

pub use adapter::{BlockAdapter, block_len_for};
pub use listener::spawn_note_listener;
pub use offline::{process_file, render_buffer};
pub use recorder::{Recorder, RecordingSink, recorder, recording_file_name};
pub use stream::{AudioDevice, StreamConfig, VoiceStream, default_device, list_devices};
pub use wav::{WavFormat, WavInfo, WavSpec, read_wav, read_wav_info, write_wav};

use vocora_vocoder::EngineError;

/// Error types for audio I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Audio stream setup or runtime error.
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// No audio device available on the system.
    #[error("No audio device available")]
    NoDevice,

    /// The device's sample format or layout cannot be used.
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// The requested audio device was not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The vocoder engine refused its configuration or halted.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for audio I/O operations.
pub type Result<T> = std::result::Result<T, Error>;
