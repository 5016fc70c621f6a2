//! Audio capture from microphone
//!
//! The ingestor owns the input stream for as long as it lives. Dropping it
//! (or calling [`AudioIngestor::release`]) gives the device back on every
//! exit path, including signal-driven shutdown.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use tokio::sync::mpsc;

use super::frame::{FrameChunker, FrameSender, f32_to_i16};
use crate::config::AudioConfig;
use crate::{Error, Result};

/// Fatal device errors reported from the capture thread
pub type DeviceErrors = mpsc::UnboundedReceiver<Error>;

/// The two steps shutdown drives on an input stream
///
/// `stop` must halt frame delivery while leaving the device open so the
/// consumer can drain; `release` gives the device back.
pub trait CaptureControl {
    /// Stop delivering frames
    fn stop(&mut self);

    /// Close the stream and release the device
    fn release(&mut self);
}

/// Resolved input device and stream shape
struct CaptureConfig {
    device: Device,
    config: StreamConfig,
    native_rate: u32,
}

/// Owns the microphone and feeds fixed-size frames into the frame queue
pub struct AudioIngestor {
    device_name: String,
    stream: Option<Stream>,
    capturing: bool,
    sample_rate: u32,
}

impl AudioIngestor {
    /// Open the input device and start pushing frames
    ///
    /// Returns the ingestor plus a receiver for device errors raised after
    /// the stream is running.
    ///
    /// # Errors
    ///
    /// Returns `Error::AudioDevice` if no usable input device can be opened
    pub fn start(audio: &AudioConfig, sender: FrameSender) -> Result<(Self, DeviceErrors)> {
        let cfg = resolve_device(audio.input_device.as_deref(), audio.sample_rate)?;
        let device_name = cfg.device.name().unwrap_or_else(|_| "unknown".to_string());

        let target_rate = audio.sample_rate;
        let native_rate = cfg.native_rate;
        let channels = cfg.config.channels;
        let mut chunker = FrameChunker::new(audio.frame_size, sender);
        let mut resampler = LinearResampler::new(native_rate, target_rate);
        let (err_tx, err_rx) = mpsc::unbounded_channel();

        let stream = cfg
            .device
            .build_input_stream(
                &cfg.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mono = to_mono(data, channels);
                    let resampled = resampler.process(&mono);
                    chunker.push_samples(&f32_to_i16(&resampled));
                },
                move |err| {
                    tracing::error!(error = %err, "audio capture error");
                    let _ = err_tx.send(Error::AudioDevice(err.to_string()));
                },
                None,
            )
            .map_err(|e| Error::AudioDevice(e.to_string()))?;

        stream
            .play()
            .map_err(|e| Error::AudioDevice(e.to_string()))?;

        tracing::info!(
            device = %device_name,
            native_rate,
            sample_rate = target_rate,
            channels,
            frame_size = audio.frame_size,
            "audio capture started"
        );

        Ok((
            Self {
                device_name,
                stream: Some(stream),
                capturing: true,
                sample_rate: target_rate,
            },
            err_rx,
        ))
    }

    /// Stop delivering frames; the device stays open until [`release`](Self::release)
    pub fn stop(&mut self) {
        if !self.capturing {
            return;
        }
        self.capturing = false;
        if let Some(stream) = &self.stream
            && let Err(e) = stream.pause()
        {
            tracing::debug!(error = %e, "failed to pause input stream");
        }
        tracing::info!(device = %self.device_name, "audio capture stopped");
    }

    /// Close the input stream and give the microphone back
    pub fn release(&mut self) {
        self.stop();
        if self.stream.take().is_some() {
            tracing::info!(device = %self.device_name, "microphone released");
        }
    }

    /// Check if currently capturing
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.capturing
    }

    /// Name of the device being captured
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Sample rate of emitted frames
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl CaptureControl for AudioIngestor {
    fn stop(&mut self) {
        Self::stop(self);
    }

    fn release(&mut self) {
        Self::release(self);
    }
}

impl Drop for AudioIngestor {
    fn drop(&mut self) {
        self.release();
    }
}

/// List available input device names
#[must_use]
pub fn list_input_devices() -> Vec<String> {
    cpal::default_host()
        .input_devices()
        .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
        .unwrap_or_default()
}

/// Find the input device and pick a stream config
///
/// Prefers a config that supports the target rate natively; otherwise
/// captures at the device default and resamples in the callback.
fn resolve_device(device_name: Option<&str>, target_rate: u32) -> Result<CaptureConfig> {
    let host = cpal::default_host();

    let device = match device_name {
        Some(name) => host
            .input_devices()
            .map_err(|e| Error::AudioDevice(e.to_string()))?
            .find(|d| d.name().is_ok_and(|n| n == name))
            .ok_or_else(|| Error::AudioDevice(format!("input device not found: {name}")))?,
        None => host
            .default_input_device()
            .ok_or_else(|| Error::AudioDevice("no input device available".to_string()))?,
    };

    let native = device
        .supported_input_configs()
        .map_err(|e| Error::AudioDevice(e.to_string()))?
        .filter(|c| {
            c.sample_format() == cpal::SampleFormat::F32
                && c.min_sample_rate() <= SampleRate(target_rate)
                && c.max_sample_rate() >= SampleRate(target_rate)
        })
        .min_by_key(cpal::SupportedStreamConfigRange::channels);

    let (config, native_rate) = if let Some(range) = native {
        (
            range.with_sample_rate(SampleRate(target_rate)).config(),
            target_rate,
        )
    } else {
        let default = device
            .default_input_config()
            .map_err(|e| Error::AudioDevice(e.to_string()))?;
        let rate = default.sample_rate().0;
        (default.config(), rate)
    };

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        native_rate,
        target_rate,
        channels = config.channels,
        "audio capture initialized"
    );

    Ok(CaptureConfig {
        device,
        config,
        native_rate,
    })
}

/// Encode 16-bit mono PCM as an in-memory WAV file
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn pcm_to_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| Error::BackendTransient(e.to_string()))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| Error::BackendTransient(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| Error::BackendTransient(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Down-mix interleaved multi-channel audio to mono by averaging
#[must_use]
pub fn to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let ch = usize::from(channels);
    samples
        .chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / f32::from(channels))
        .collect()
}

/// Streaming linear resampler for mono f32 audio
///
/// Keeps its read position and the previous block's last sample, so audio
/// delivered in callback-sized pieces resamples the same as one buffer.
#[derive(Debug, Clone)]
pub struct LinearResampler {
    passthrough: bool,
    /// Input samples consumed per output sample
    step: f64,
    /// Next read position relative to the start of the next block; -1.0..0.0
    /// falls between `last` and that block's first sample
    pos: f64,
    last: Option<f32>,
}

impl LinearResampler {
    #[must_use]
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        Self {
            passthrough: from_rate == to_rate,
            step: f64::from(from_rate) / f64::from(to_rate),
            pos: 0.0,
            last: None,
        }
    }

    /// Resample the next block of a continuous stream
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.passthrough || input.is_empty() {
            return input.to_vec();
        }

        let last_index = (input.len() - 1) as f64;
        let mut out = Vec::with_capacity((input.len() as f64 / self.step).ceil() as usize + 1);
        while self.pos < last_index {
            let base = self.pos.floor();
            let frac = (self.pos - base) as f32;
            let (s0, s1) = if base < 0.0 {
                (self.last.unwrap_or(input[0]), input[0])
            } else {
                let idx = base as usize;
                (input[idx], input[idx + 1])
            };
            out.push(s0 + frac * (s1 - s0));
            self.pos += self.step;
        }

        self.pos -= input.len() as f64;
        self.last = input.last().copied();
        out
    }
}

/// Resample one self-contained buffer
#[must_use]
pub fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    LinearResampler::new(from_rate, to_rate).process(input)
}
