//! Offline rendering of a WAV file.

use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use vocora_core::{ControlParams, NoteSlot, linear_to_db};
use vocora_io::{process_file, read_wav};

use super::common::ParamArgs;

#[derive(Args)]
pub struct ProcessArgs {
    /// Input WAV file (multichannel input is averaged to mono)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output WAV file (16-bit mono)
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Relative notes held for the whole file (e.g. "0,12,19"); none renders
    /// the natural voice
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    notes: Vec<i32>,

    /// Processing block size, rounded up to a multiple of 512
    #[arg(long, default_value = "1024")]
    block_size: usize,

    #[command(flatten)]
    params: ParamArgs,
}

pub fn run(args: ProcessArgs) -> anyhow::Result<()> {
    let params = Arc::new(ControlParams::new());
    args.params.apply(&params);
    for &note in &args.notes {
        let Some(slot) = NoteSlot::from_relative(note) else {
            anyhow::bail!("note {note} is out of range");
        };
        params.set_note(slot, true);
    }

    if args.notes.is_empty() {
        println!("Rendering natural voice from {}...", args.input.display());
    } else {
        println!(
            "Rendering {} with {} note(s)...",
            args.input.display(),
            args.notes.len()
        );
    }
    process_file(&args.input, &args.output, &params, args.block_size)?;

    let (output, info) = read_wav(&args.output)?;
    println!(
        "  {} samples, {} Hz, {:.2}s",
        output.len(),
        info.sample_rate,
        info.duration_secs
    );
    println!(
        "  Output: RMS {:.1} dB, Peak {:.1} dB",
        linear_to_db(rms(&output)),
        linear_to_db(peak(&output))
    );
    println!("Wrote {}", args.output.display());

    Ok(())
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0, f32::max)
}
