//! Live session: duplex audio, note listener, recorder and console.

use clap::Args;
use crossbeam_channel::unbounded;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use vocora_core::{ControlParams, NoteEvent};
use vocora_io::{StreamConfig, VoiceStream, block_len_for, recorder, spawn_note_listener};
use vocora_vocoder::VocoderEngine;

use super::common::ParamArgs;
use crate::console::Console;

/// Samples the recording ring holds before it starts dropping.
const RECORD_RING: usize = 1 << 18;

#[derive(Args)]
pub struct RunArgs {
    /// Input device name or index
    #[arg(long)]
    input_device: Option<String>,

    /// Output device name or index
    #[arg(long)]
    output_device: Option<String>,

    /// Sample rate (output device default when omitted)
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Engine block size, rounded up to a multiple of 512
    #[arg(long, default_value = "1024")]
    block_size: usize,

    /// Directory for `rec` takes
    #[arg(long, default_value = ".")]
    record_dir: PathBuf,

    /// Relative notes held from the start (e.g. "0,12,19")
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    notes: Vec<i32>,

    #[command(flatten)]
    params: ParamArgs,
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = StreamConfig {
        sample_rate: args.sample_rate,
        block_len: block_len_for(args.block_size),
        input_device: args.input_device,
        output_device: args.output_device,
    };
    let mut stream = VoiceStream::new(&config)?;
    let sample_rate = stream.sample_rate();

    let params = Arc::new(ControlParams::new());
    args.params.apply(&params);

    let mut engine = VocoderEngine::new(sample_rate as f32, Arc::clone(&params))?;
    let layout = engine.layout().clone();

    std::fs::create_dir_all(&args.record_dir)?;
    let (sink, takes) = recorder(&args.record_dir, sample_rate, RECORD_RING)?;
    engine.set_recording_sink(Box::new(sink));

    let (note_tx, note_rx) = unbounded();
    spawn_note_listener(note_rx, Arc::clone(&params))?;
    for note in &args.notes {
        note_tx.send(NoteEvent::On { note: *note, velocity: 127 })?;
    }

    let running = stream.running();
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        eprintln!("\nStopping...");
        r.store(false, Ordering::SeqCst);
    })?;

    println!("vocora at {sample_rate} Hz, block {} samples", stream.block_len());
    println!(
        "relative note 0 is {} (MIDI {}); type 'help' for commands",
        layout.label(0, 0).unwrap_or_default(),
        layout.midi_low()
    );

    // The console blocks on stdin; it is left behind if the stream stops first.
    let console_running = Arc::clone(&running);
    let mut console = Console::new(Arc::clone(&params), note_tx, layout);
    thread::Builder::new()
        .name("vocora-control".into())
        .spawn(move || {
            if let Err(err) = console.run(io::stdin().lock(), io::stdout()) {
                tracing::warn!("console stopped: {err}");
            }
            console_running.store(false, Ordering::SeqCst);
        })?;

    let outcome = stream.run(engine);

    let dropped = takes.dropped();
    if dropped > 0 {
        tracing::warn!(dropped, "recording ring overflowed");
    }
    for file in takes.stop()? {
        println!("recorded {}", file.display());
    }

    outcome?;
    println!("Done!");
    Ok(())
}
