//! Block engine: one call per audio callback.
//!
//! # Signal Flow
//!
//! ```text
//! input → DcOffset → clean ─┬─ natural path: gate → fades ──────────────┐
//!                           └─ vocoder path: analyzer → voices → OLA ───┤ (sum)
//!                                                                       ▼
//!                            output ← Echo ← (recording tap) ← Dynamics ┘
//! ```
//!
//! # Mode arbitration
//!
//! Per block, with `notes` = any class has any register active:
//!
//! ```text
//! vocoder = notes || learning
//! natural = !vocoder || through == Mix || learning
//! ```
//!
//! Each path also runs for one extra block after it turns off, to fade out:
//! the natural path ramps its first `FFT_SIZE` samples down and silences the
//! rest; the vocoder path only flushes its held-over tail. A path turning on
//! ramps in (natural) or discards the stale offset window (vocoder).
//!
//! # Real-time contract
//!
//! After the first block (which sizes the scratch buffer unless
//! [`VocoderEngine::reserve`] was called), `process_block` never allocates,
//! locks, or logs.

use std::sync::Arc;

use crate::FFT_SIZE;
use crate::analyzer::SpectralAnalyzer;
use crate::error::EngineError;
use crate::layout::PitchLayout;
use crate::transform::{RustFftPlanner, TransformPlanner};
use crate::voice::{VoiceBank, volume_correction};
use vocora_core::{
    ControlParams, ControlSnapshot, DcOffset, Dynamics, Echo, Effect, NaturalGate, ThroughMode,
};

/// Consumer of finished (post-dynamics, pre-echo) output blocks.
///
/// Called on the audio thread: implementations must not block or allocate.
pub trait BlockSink: Send {
    /// Take one finished block.
    fn consume(&mut self, block: &[f32]);

    /// Recording stopped; close out whatever was written.
    fn finish(&mut self);
}

/// The vocoder engine.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use vocora_core::{ControlParams, NoteSlot};
/// use vocora_vocoder::VocoderEngine;
///
/// let params = Arc::new(ControlParams::new());
/// let mut engine = VocoderEngine::new(48000.0, Arc::clone(&params)).unwrap();
///
/// params.set_note(NoteSlot { class: 0, register: 1 }, true);
/// let input = vec![0.1f32; 1024];
/// let mut output = vec![0.0f32; 1024];
/// engine.process_block(&input, &mut output).unwrap();
/// ```
pub struct VocoderEngine {
    sample_rate: f32,
    params: Arc<ControlParams>,
    layout: PitchLayout,
    dc: DcOffset,
    clean: Vec<f32>,
    gate: NaturalGate,
    analyzer: SpectralAnalyzer,
    voices: VoiceBank,
    dynamics: Dynamics,
    echo: Echo,
    was_vocoder: bool,
    was_natural: bool,
    was_recording: bool,
    noise_seq: u32,
    echo_seq: u32,
    sink: Option<Box<dyn BlockSink>>,
    fault: Option<EngineError>,
}

impl VocoderEngine {
    /// Build an engine for `sample_rate` using the `rustfft` transforms.
    pub fn new(sample_rate: f32, params: Arc<ControlParams>) -> Result<Self, EngineError> {
        Self::with_planner(sample_rate, params, &mut RustFftPlanner::new())
    }

    /// Build an engine with transforms from `planner`.
    pub fn with_planner(
        sample_rate: f32,
        params: Arc<ControlParams>,
        planner: &mut dyn TransformPlanner,
    ) -> Result<Self, EngineError> {
        let layout = PitchLayout::new(sample_rate)?;
        let analyzer = SpectralAnalyzer::new(planner.plan(FFT_SIZE));
        let voices = VoiceBank::new(&layout, planner);

        let snap = params.snapshot();
        let mut echo = Echo::new();
        echo.retime(snap.echo_delay);

        tracing::info!(
            sample_rate,
            lowest_midi = layout.midi_low(),
            "vocoder engine ready"
        );

        Ok(Self {
            sample_rate,
            params,
            layout,
            dc: DcOffset::new(),
            clean: Vec::new(),
            gate: NaturalGate::new(),
            analyzer,
            voices,
            dynamics: Dynamics::new(),
            echo,
            was_vocoder: false,
            was_natural: false,
            was_recording: false,
            noise_seq: snap.noise_clear_seq,
            echo_seq: snap.echo_clear_seq,
            sink: None,
            fault: None,
        })
    }

    /// Sample rate the engine was built for.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Pitch layout in use.
    pub fn layout(&self) -> &PitchLayout {
        &self.layout
    }

    /// Shared control parameters.
    pub fn params(&self) -> &Arc<ControlParams> {
        &self.params
    }

    /// Spectral analyzer state.
    pub fn analyzer(&self) -> &SpectralAnalyzer {
        &self.analyzer
    }

    /// Voice bank state.
    pub fn voices(&self) -> &VoiceBank {
        &self.voices
    }

    /// Natural-voice gate state.
    pub fn gate(&self) -> &NaturalGate {
        &self.gate
    }

    /// The fatal error that halted the engine, if any.
    pub fn fault(&self) -> Option<&EngineError> {
        self.fault.as_ref()
    }

    /// Whether a fatal error has halted the engine.
    pub fn is_halted(&self) -> bool {
        self.fault.is_some()
    }

    /// Pre-size the scratch buffer so the first block does not allocate.
    pub fn reserve(&mut self, block_len: usize) {
        if self.clean.len() < block_len {
            self.clean.resize(block_len, 0.0);
        }
    }

    /// Install the recording sink. Call before the stream starts.
    pub fn set_recording_sink(&mut self, sink: Box<dyn BlockSink>) {
        self.sink = Some(sink);
    }

    /// Host sample-rate notification. Any change from the construction rate
    /// is fatal.
    pub fn notify_sample_rate(&mut self, sample_rate: f32) -> Result<(), EngineError> {
        if self.fault.is_some() {
            return Err(EngineError::Halted);
        }
        if sample_rate != self.sample_rate {
            return Err(self.halt(EngineError::SampleRateChanged {
                initial: self.sample_rate,
                requested: sample_rate,
            }));
        }
        Ok(())
    }

    fn halt(&mut self, error: EngineError) -> EngineError {
        self.fault = Some(error.clone());
        error
    }

    /// Process one block. `input` and `output` must have the same length, a
    /// positive multiple of `FFT_SIZE`.
    ///
    /// On error the output is silent. Configuration errors halt the engine:
    /// every later call returns [`EngineError::Halted`].
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) -> Result<(), EngineError> {
        output.fill(0.0);
        if self.fault.is_some() {
            return Err(EngineError::Halted);
        }
        if input.len() != output.len() {
            return Err(self.halt(EngineError::BufferMismatch {
                input: input.len(),
                output: output.len(),
            }));
        }
        let len = input.len();
        if len == 0 || len % FFT_SIZE != 0 {
            return Err(self.halt(EngineError::BlockSize {
                len,
                fft_size: FFT_SIZE,
            }));
        }

        let snap = self.params.snapshot();
        self.serve_requests(&snap);

        self.reserve(len);
        self.dc.process_into(input, &mut self.clean[..len]);

        let vocoder = snap.any_active() || snap.learning;
        let natural = !vocoder || snap.through == ThroughMode::Mix || snap.learning;

        if natural || self.was_natural {
            self.natural_path(output, natural, snap.learning);
        }
        if vocoder || self.was_vocoder {
            self.vocoder_path(output, vocoder, &snap);
        }

        self.dynamics.process_block(output, snap.gain_db, snap.threshold_db);

        if let Some(sink) = self.sink.as_mut() {
            if snap.recording {
                sink.consume(output);
            } else if self.was_recording {
                sink.finish();
            }
        }
        self.was_recording = snap.recording;

        if snap.echo_enabled {
            self.echo.process_block_inplace(output);
        }

        self.was_natural = natural;
        self.was_vocoder = vocoder;
        Ok(())
    }

    fn serve_requests(&mut self, snap: &ControlSnapshot) {
        if snap.noise_clear_seq != self.noise_seq {
            self.noise_seq = snap.noise_clear_seq;
            self.analyzer.clear_noise();
            self.gate.clear_level();
        }
        if snap.echo_clear_seq != self.echo_seq {
            self.echo_seq = snap.echo_clear_seq;
            self.echo.retime(snap.echo_delay);
        }
    }

    fn natural_path(&mut self, output: &mut [f32], natural: bool, learning: bool) {
        let len = output.len();
        output.copy_from_slice(&self.clean[..len]);
        self.gate.process_block(output, learning);

        let step = 1.0 / FFT_SIZE as f32;
        if natural && !self.was_natural {
            for (i, y) in output[..FFT_SIZE].iter_mut().enumerate() {
                *y *= i as f32 * step;
            }
        } else if !natural && self.was_natural {
            for (i, y) in output[..FFT_SIZE].iter_mut().enumerate() {
                *y *= (FFT_SIZE - i) as f32 * step;
            }
            output[FFT_SIZE..].fill(0.0);
            self.gate.reset_power();
        }
    }

    fn vocoder_path(&mut self, output: &mut [f32], vocoder: bool, snap: &ControlSnapshot) {
        self.voices.flush_held_over(output);
        if !vocoder {
            return;
        }

        let entering = !self.was_vocoder;
        let correction = volume_correction(&snap.registers, &self.layout, snap.mapping);
        let clean = &self.clean[..output.len()];

        for start in (0..output.len()).step_by(FFT_SIZE) {
            self.analyzer
                .analyze_section(clean, start, entering && start == 0, snap.learning);
            if let Some(correction) = correction {
                self.voices.render_section(
                    self.analyzer.spectrum(),
                    &snap.registers,
                    snap.mapping,
                    snap.formant,
                    correction,
                    output,
                    start,
                );
            }
        }
        self.analyzer.carry_tail(clean);
    }
}
