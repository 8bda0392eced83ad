//! Fixed-block adapter between device callbacks and the engine.
//!
//! Device callbacks arrive with whatever frame count the host picks. The
//! adapter collects input into an engine-sized block and plays back the
//! previous block while it fills:
//!
//! ```text
//! frame k of block n:  out[k] = processed(n-1)[k];  in(n)[k] = next input
//! after the last frame: processed(n) = engine(in(n))
//! ```
//!
//! That costs exactly one block of latency and never allocates after
//! construction.

use vocora_vocoder::{EngineError, FFT_SIZE, VocoderEngine};

/// Round a requested block size up to a positive multiple of `FFT_SIZE`.
pub fn block_len_for(requested: usize) -> usize {
    requested.max(1).div_ceil(FFT_SIZE) * FFT_SIZE
}

/// Collects device input into engine blocks and replays processed blocks.
pub struct BlockAdapter {
    engine: VocoderEngine,
    input: Vec<f32>,
    output: Vec<f32>,
    pos: usize,
}

impl BlockAdapter {
    /// Wrap `engine` with blocks of `block_len` samples.
    ///
    /// `block_len` is taken as given; use [`block_len_for`] to round a user
    /// request. A length the engine rejects surfaces on the first full block.
    pub fn new(mut engine: VocoderEngine, block_len: usize) -> Self {
        engine.reserve(block_len);
        Self {
            engine,
            input: vec![0.0; block_len],
            output: vec![0.0; block_len],
            pos: 0,
        }
    }

    /// Engine block length.
    pub fn block_len(&self) -> usize {
        self.input.len()
    }

    /// The wrapped engine.
    pub fn engine(&self) -> &VocoderEngine {
        &self.engine
    }

    /// Mutable access to the wrapped engine.
    pub fn engine_mut(&mut self) -> &mut VocoderEngine {
        &mut self.engine
    }

    /// Fill interleaved `data` of `channels` channels, pulling one mono input
    /// sample per frame from `next_input` (missing input reads as silence).
    /// Each output frame carries the same sample on every channel.
    ///
    /// On an engine error the rest of `data` is silenced.
    pub fn render_interleaved(
        &mut self,
        data: &mut [f32],
        channels: usize,
        mut next_input: impl FnMut() -> Option<f32>,
    ) -> Result<(), EngineError> {
        let channels = channels.max(1);
        for (i, frame) in data.chunks_mut(channels).enumerate() {
            frame.fill(self.output[self.pos]);
            self.input[self.pos] = next_input().unwrap_or(0.0);
            self.pos += 1;

            if self.pos == self.input.len() {
                self.pos = 0;
                if let Err(err) = self.engine.process_block(&self.input, &mut self.output) {
                    let rest = ((i + 1) * channels).min(data.len());
                    data[rest..].fill(0.0);
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}
