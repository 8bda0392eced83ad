//! Offline rendering through the engine.
//!
//! Runs a whole buffer through a [`VocoderEngine`] block by block, without
//! the stream's one block of latency. The input is zero-padded to a whole
//! number of blocks plus one extra `FFT_SIZE` section, so the last voice
//! fade-out lands in the output.

use std::path::Path;
use std::sync::Arc;

use vocora_core::ControlParams;
use vocora_vocoder::{FFT_SIZE, VocoderEngine};

use crate::adapter::block_len_for;
use crate::wav::{WavSpec, read_wav, write_wav};
use crate::{Error, Result};

/// Render `input` at `sample_rate` with the current state of `params`.
///
/// `block_len` is rounded up to a multiple of `FFT_SIZE`. The output is
/// `input.len() + FFT_SIZE` samples long.
pub fn render_buffer(
    input: &[f32],
    sample_rate: f32,
    params: &Arc<ControlParams>,
    block_len: usize,
) -> Result<Vec<f32>> {
    let block_len = block_len_for(block_len);
    let out_len = input.len() + FFT_SIZE;
    let padded_len = out_len.div_ceil(block_len) * block_len;

    let mut engine = VocoderEngine::new(sample_rate, Arc::clone(params))?;
    engine.reserve(block_len);

    let mut padded = input.to_vec();
    padded.resize(padded_len, 0.0);
    let mut output = vec![0.0; padded_len];

    for (block_in, block_out) in padded
        .chunks_exact(block_len)
        .zip(output.chunks_exact_mut(block_len))
    {
        engine.process_block(block_in, block_out)?;
    }

    output.truncate(out_len);
    Ok(output)
}

/// Render a WAV file into a 16-bit mono WAV file.
pub fn process_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    params: &Arc<ControlParams>,
    block_len: usize,
) -> Result<()> {
    let (samples, info) = read_wav(&input)?;
    if samples.is_empty() {
        return Err(Error::UnsupportedFormat(format!(
            "{} has no audio",
            input.as_ref().display()
        )));
    }

    let rendered = render_buffer(&samples, info.sample_rate as f32, params, block_len)?;
    write_wav(&output, &rendered, WavSpec::pcm16(info.sample_rate))?;

    tracing::info!(
        input = %input.as_ref().display(),
        output = %output.as_ref().display(),
        frames = rendered.len(),
        "rendered"
    );
    Ok(())
}
