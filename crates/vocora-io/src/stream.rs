//! Real-time audio streaming via cpal.
//!
//! [`VoiceStream`] opens an input and an output stream on the chosen devices
//! and runs a [`VocoderEngine`] between them:
//!
//! ```text
//! input callback ── mono downmix ──▶ rtrb<f32> ──▶ output callback
//!                                                  BlockAdapter → engine
//!                                                  mono → every channel
//! ```
//!
//! Both callbacks are allocation-free. A fatal engine error is sent once over
//! a bounded channel and latches the stream's fault flag; [`VoiceStream::run`]
//! returns it to the caller.

use crate::adapter::BlockAdapter;
use crate::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, Stream};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use rtrb::RingBuffer;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use vocora_vocoder::{EngineError, VocoderEngine};

/// Extract device name via `description()` (cpal 0.17+).
pub(crate) fn device_name(device: &Device) -> std::result::Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

/// Audio device information.
#[derive(Debug, Clone)]
pub struct AudioDevice {
    /// Human-readable device name.
    pub name: String,
    /// Whether the device supports audio input.
    pub is_input: bool,
    /// Whether the device supports audio output.
    pub is_output: bool,
    /// Default sample rate in Hz.
    pub default_sample_rate: u32,
}

/// Stream configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Sample rate in Hz (device default if `None`).
    pub sample_rate: Option<u32>,
    /// Engine block size in samples, a multiple of `FFT_SIZE`.
    pub block_len: usize,
    /// Input device name or index (uses default if `None`).
    pub input_device: Option<String>,
    /// Output device name or index (uses default if `None`).
    pub output_device: Option<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: None,
            block_len: 1024,
            input_device: None,
            output_device: None,
        }
    }
}

/// List all available audio devices.
pub fn list_devices() -> Result<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    if let Ok(inputs) = host.input_devices() {
        for device in inputs {
            if let Ok(name) = device_name(&device) {
                devices.push(AudioDevice {
                    name,
                    is_input: true,
                    is_output: device.default_output_config().is_ok(),
                    default_sample_rate: device
                        .default_input_config()
                        .map(|c| c.sample_rate())
                        .unwrap_or(48000),
                });
            }
        }
    }

    if let Ok(outputs) = host.output_devices() {
        for device in outputs {
            if let Ok(name) = device_name(&device) {
                if devices.iter().any(|d| d.name == name) {
                    continue;
                }
                devices.push(AudioDevice {
                    name,
                    is_input: false,
                    is_output: true,
                    default_sample_rate: device
                        .default_output_config()
                        .map(|c| c.sample_rate())
                        .unwrap_or(48000),
                });
            }
        }
    }

    Ok(devices)
}

/// Get the default input and output device info.
pub fn default_device() -> Result<(Option<AudioDevice>, Option<AudioDevice>)> {
    let host = cpal::default_host();

    let input = host.default_input_device().and_then(|d| {
        device_name(&d).ok().map(|name| AudioDevice {
            name,
            is_input: true,
            is_output: false,
            default_sample_rate: d
                .default_input_config()
                .map(|c| c.sample_rate())
                .unwrap_or(48000),
        })
    });

    let output = host.default_output_device().and_then(|d| {
        device_name(&d).ok().map(|name| AudioDevice {
            name,
            is_input: false,
            is_output: true,
            default_sample_rate: d
                .default_output_config()
                .map(|c| c.sample_rate())
                .unwrap_or(48000),
        })
    });

    Ok((input, output))
}

/// Find a device from a list by index, exact name, or case-insensitive
/// partial name.
fn find_device_from_list(devices: &[Device], name_or_index: &str, kind: &str) -> Result<Device> {
    if let Ok(index) = name_or_index.parse::<usize>() {
        return devices.get(index).cloned().ok_or_else(|| {
            Error::DeviceNotFound(format!(
                "{} device index {} (only {} devices available)",
                kind,
                index,
                devices.len()
            ))
        });
    }

    if let Some(device) = devices
        .iter()
        .find(|d| device_name(d).is_ok_and(|n| n == name_or_index))
    {
        return Ok(device.clone());
    }

    let search = name_or_index.to_lowercase();
    let matches: Vec<(Device, String)> = devices
        .iter()
        .filter_map(|d| {
            device_name(d)
                .ok()
                .filter(|name| name.to_lowercase().contains(&search))
                .map(|name| (d.clone(), name))
        })
        .collect();

    match matches.as_slice() {
        [] => Err(Error::DeviceNotFound(format!(
            "no {} device matching '{}'",
            kind, name_or_index
        ))),
        [(device, _)] => Ok(device.clone()),
        [(device, first), ..] => {
            let names: Vec<&str> = matches.iter().map(|(_, n)| n.as_str()).collect();
            tracing::warn!(
                search = name_or_index,
                kind,
                ?names,
                "several devices match, using {first}"
            );
            Ok(device.clone())
        }
    }
}

fn input_device(host: &Host, name: Option<&str>) -> Result<Device> {
    match name {
        Some(name) => {
            let devices: Vec<_> = host
                .input_devices()
                .map_err(|e| Error::Stream(e.to_string()))?
                .collect();
            find_device_from_list(&devices, name, "input")
        }
        None => host.default_input_device().ok_or(Error::NoDevice),
    }
}

fn output_device(host: &Host, name: Option<&str>) -> Result<Device> {
    match name {
        Some(name) => {
            let devices: Vec<_> = host
                .output_devices()
                .map_err(|e| Error::Stream(e.to_string()))?
                .collect();
            find_device_from_list(&devices, name, "output")
        }
        None => host.default_output_device().ok_or(Error::NoDevice),
    }
}

/// Channel count for an f32 stream at `rate`.
///
/// The default config wins when it is already f32. Otherwise the first f32
/// range covering `rate` is used, preferring the default channel count.
fn f32_channels(
    default: &cpal::SupportedStreamConfig,
    supported: impl IntoIterator<Item = cpal::SupportedStreamConfigRange>,
    rate: u32,
    kind: &str,
) -> Result<u16> {
    if default.sample_format() == cpal::SampleFormat::F32 {
        return Ok(default.channels());
    }

    let covering: Vec<_> = supported
        .into_iter()
        .filter(|range| {
            range.sample_format() == cpal::SampleFormat::F32
                && range.min_sample_rate() <= rate
                && rate <= range.max_sample_rate()
        })
        .collect();
    let chosen = covering
        .iter()
        .find(|range| range.channels() == default.channels())
        .or(covering.first())
        .ok_or_else(|| {
            Error::UnsupportedFormat(format!(
                "{kind} defaults to {:?} and has no f32 config at {rate} Hz",
                default.sample_format()
            ))
        })?;

    tracing::debug!(
        kind,
        default = ?default.sample_format(),
        channels = chosen.channels(),
        "default format is not f32, using a supported f32 config"
    );
    Ok(chosen.channels())
}

/// Live duplex stream running the vocoder engine.
pub struct VoiceStream {
    input_device: Device,
    output_device: Device,
    input_config: cpal::StreamConfig,
    output_config: cpal::StreamConfig,
    block_len: usize,
    running: Arc<AtomicBool>,
    fault: Arc<AtomicBool>,
    _streams: Option<(Stream, Stream)>,
}

impl VoiceStream {
    /// Open the configured devices and settle on a shared sample rate.
    pub fn new(config: &StreamConfig) -> Result<Self> {
        let host = cpal::default_host();
        let input_device = input_device(&host, config.input_device.as_deref())?;
        let output_device = output_device(&host, config.output_device.as_deref())?;

        let default_out = output_device
            .default_output_config()
            .map_err(|e| Error::Stream(e.to_string()))?;
        let default_in = input_device
            .default_input_config()
            .map_err(|e| Error::Stream(e.to_string()))?;

        let sample_rate = config.sample_rate.unwrap_or(default_out.sample_rate());
        let output_channels = f32_channels(
            &default_out,
            output_device.supported_output_configs().into_iter().flatten(),
            sample_rate,
            "output",
        )?;
        let input_channels = f32_channels(
            &default_in,
            input_device.supported_input_configs().into_iter().flatten(),
            sample_rate,
            "input",
        )?;

        let output_config = cpal::StreamConfig {
            channels: output_channels,
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };
        let input_config = cpal::StreamConfig {
            channels: input_channels,
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        tracing::info!(
            input = %device_name(&input_device).unwrap_or_default(),
            output = %device_name(&output_device).unwrap_or_default(),
            sample_rate,
            block_len = config.block_len,
            "audio devices opened"
        );

        Ok(Self {
            input_device,
            output_device,
            input_config,
            output_config,
            block_len: config.block_len,
            running: Arc::new(AtomicBool::new(false)),
            fault: Arc::new(AtomicBool::new(false)),
            _streams: None,
        })
    }

    /// Sample rate both streams run at.
    pub fn sample_rate(&self) -> u32 {
        self.output_config.sample_rate
    }

    /// Engine block length.
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Flag that keeps [`run`](Self::run) going; clear it to stop.
    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Whether a fatal engine error has latched.
    pub fn is_faulted(&self) -> bool {
        self.fault.load(Ordering::Acquire)
    }

    /// Run `engine` until the running flag is cleared or the engine fails.
    ///
    /// The engine must have been built for [`sample_rate`](Self::sample_rate).
    pub fn run(&mut self, engine: VocoderEngine) -> Result<()> {
        let (fault_tx, fault_rx): (Sender<EngineError>, Receiver<EngineError>) = bounded(1);
        let (mut producer, mut consumer) = RingBuffer::<f32>::new(self.block_len * 4);

        let mut adapter = BlockAdapter::new(engine, self.block_len);
        adapter
            .engine_mut()
            .notify_sample_rate(self.sample_rate() as f32)?;

        self.running.store(true, Ordering::SeqCst);

        let in_channels = usize::from(self.input_config.channels);
        let input_stream = self
            .input_device
            .build_input_stream(
                &self.input_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for frame in data.chunks(in_channels) {
                        let mono = frame.iter().sum::<f32>() / frame.len() as f32;
                        // Overflow drops input; the output side reads silence.
                        let _ = producer.push(mono);
                    }
                },
                |err| tracing::error!("input stream error: {err}"),
                None,
            )
            .map_err(|e| Error::Stream(e.to_string()))?;

        let out_channels = usize::from(self.output_config.channels);
        let fault = Arc::clone(&self.fault);
        let output_stream = self
            .output_device
            .build_output_stream(
                &self.output_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if fault.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    let result =
                        adapter.render_interleaved(data, out_channels, || consumer.pop().ok());
                    if let Err(err) = result {
                        if !fault.swap(true, Ordering::AcqRel) {
                            let _ = fault_tx.try_send(err);
                        }
                    }
                },
                |err| tracing::error!("output stream error: {err}"),
                None,
            )
            .map_err(|e| Error::Stream(e.to_string()))?;

        input_stream
            .play()
            .map_err(|e| Error::Stream(e.to_string()))?;
        output_stream
            .play()
            .map_err(|e| Error::Stream(e.to_string()))?;
        self._streams = Some((input_stream, output_stream));
        tracing::info!("streaming");

        let outcome = loop {
            if !self.running.load(Ordering::SeqCst) {
                break Ok(());
            }
            match fault_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(err) => break Err(Error::Engine(err)),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    break Err(Error::Stream("output stream closed".into()));
                }
            }
        };

        self._streams = None;
        self.running.store(false, Ordering::SeqCst);
        if let Err(err) = &outcome {
            tracing::error!("stream stopped: {err}");
        }
        outcome
    }

    /// Stop a running stream.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
