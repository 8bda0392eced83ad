//! Recording: a lock-free tap on the audio thread and a WAV writer thread.
//!
//! ```text
//! audio thread                         writer thread
//! RecordingSink ──rtrb<Frame>──▶  Recorder  ──▶ vocora_<unix-secs>.wav
//!   consume(block) → Sample…              opens a file on the first sample
//!   finish()       → End                  finalizes it on End
//! ```
//!
//! The sink never blocks or allocates: when the ring is full, samples are
//! dropped and counted. An end marker that does not fit is retried on the
//! next call.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hound::WavWriter;
use rtrb::{Consumer, Producer, RingBuffer};
use vocora_vocoder::BlockSink;

use crate::wav::{WavSpec, to_pcm16};
use crate::{Error, Result};

/// Writer poll interval while the ring is empty.
const IDLE_POLL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq)]
enum Frame {
    Sample(f32),
    End,
}

/// Audio-thread half of a recorder. Install with
/// [`VocoderEngine::set_recording_sink`](vocora_vocoder::VocoderEngine::set_recording_sink).
pub struct RecordingSink {
    producer: Producer<Frame>,
    end_pending: bool,
    dropped: Arc<AtomicU64>,
}

impl RecordingSink {
    fn flush_end(&mut self) -> bool {
        if self.end_pending && self.producer.push(Frame::End).is_ok() {
            self.end_pending = false;
        }
        !self.end_pending
    }
}

impl BlockSink for RecordingSink {
    fn consume(&mut self, block: &[f32]) {
        if !self.flush_end() {
            self.dropped.fetch_add(block.len() as u64, Ordering::Relaxed);
            return;
        }
        for &sample in block {
            if self.producer.push(Frame::Sample(sample)).is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn finish(&mut self) {
        self.end_pending = true;
        self.flush_end();
    }
}

/// Writer-thread half of a recorder.
pub struct Recorder {
    stop: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
    handle: JoinHandle<Result<Vec<PathBuf>>>,
}

impl Recorder {
    /// Samples lost to a full ring so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Drain what is left in the ring, finalize any open file, and return
    /// every file written.
    pub fn stop(self) -> Result<Vec<PathBuf>> {
        self.stop.store(true, Ordering::Release);
        self.handle
            .join()
            .map_err(|_| Error::Stream("recorder thread panicked".into()))?
    }
}

/// Build a recorder writing into `dir` at `sample_rate`, with a ring of
/// `capacity` samples.
pub fn recorder(
    dir: impl Into<PathBuf>,
    sample_rate: u32,
    capacity: usize,
) -> Result<(RecordingSink, Recorder)> {
    let dir = dir.into();
    let (producer, consumer) = RingBuffer::new(capacity);
    let stop = Arc::new(AtomicBool::new(false));
    let dropped = Arc::new(AtomicU64::new(0));

    let handle = {
        let stop = Arc::clone(&stop);
        thread::Builder::new()
            .name("vocora-recorder".into())
            .spawn(move || write_loop(consumer, &dir, sample_rate, &stop))?
    };

    Ok((
        RecordingSink {
            producer,
            end_pending: false,
            dropped: Arc::clone(&dropped),
        },
        Recorder {
            stop,
            dropped,
            handle,
        },
    ))
}

/// `vocora_<unix-seconds>.wav`.
pub fn recording_file_name(at: SystemTime) -> String {
    let secs = at.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());
    format!("vocora_{secs}.wav")
}

fn next_path(dir: &Path) -> PathBuf {
    let name = recording_file_name(SystemTime::now());
    let mut path = dir.join(&name);
    let stem = name.trim_end_matches(".wav");
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{stem}_{n}.wav"));
        n += 1;
    }
    path
}

type FileWriter = WavWriter<std::io::BufWriter<std::fs::File>>;

fn write_loop(
    mut consumer: Consumer<Frame>,
    dir: &Path,
    sample_rate: u32,
    stop: &AtomicBool,
) -> Result<Vec<PathBuf>> {
    let spec = hound::WavSpec::from(WavSpec::pcm16(sample_rate));
    let mut written = Vec::new();
    let mut current: Option<(FileWriter, PathBuf)> = None;

    loop {
        match consumer.pop() {
            Ok(Frame::Sample(sample)) => {
                if current.is_none() {
                    let path = next_path(dir);
                    tracing::info!(path = %path.display(), "recording started");
                    current = Some((WavWriter::create(&path, spec)?, path));
                }
                if let Some((writer, _)) = current.as_mut() {
                    writer.write_sample(to_pcm16(sample))?;
                }
            }
            Ok(Frame::End) => {
                if let Some((writer, path)) = current.take() {
                    writer.finalize()?;
                    tracing::info!(path = %path.display(), "recording saved");
                    written.push(path);
                }
            }
            Err(_) => {
                if stop.load(Ordering::Acquire) && consumer.is_empty() {
                    break;
                }
                thread::sleep(IDLE_POLL);
            }
        }
    }

    if let Some((writer, path)) = current.take() {
        writer.finalize()?;
        tracing::info!(path = %path.display(), "recording saved at shutdown");
        written.push(path);
    }
    Ok(written)
}
