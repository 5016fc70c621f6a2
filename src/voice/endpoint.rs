//! Energy-based speech endpointing
//!
//! Cloud backends decode whole segments, so incoming frames are buffered
//! until a stretch of speech is followed by enough silence.

use super::frame::i16_to_f32;

/// Minimum RMS energy to count a frame as speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum speech length worth decoding
const MIN_SPEECH_MS: u32 = 300;

/// Trailing silence that closes a segment
const SILENCE_MS: u32 = 500;

/// Upper bound on a single segment
const MAX_SEGMENT_MS: u32 = 15_000;

/// Endpointer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// Waiting for speech
    Idle,
    /// Speech started, accumulating
    Speaking,
}

/// Splits a frame stream into speech segments
#[derive(Debug)]
pub struct Endpointer {
    state: EndpointState,
    buffer: Vec<i16>,
    silence_samples: usize,
    min_speech_samples: usize,
    silence_limit: usize,
    max_samples: usize,
}

impl Endpointer {
    /// Create an endpointer for audio at `sample_rate`
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(sample_rate: u32) -> Self {
        let samples = |ms: u32| (u64::from(sample_rate) * u64::from(ms) / 1000) as usize;
        Self {
            state: EndpointState::Idle,
            buffer: Vec::new(),
            silence_samples: 0,
            min_speech_samples: samples(MIN_SPEECH_MS),
            silence_limit: samples(SILENCE_MS),
            max_samples: samples(MAX_SEGMENT_MS),
        }
    }

    /// Feed one frame, returning a finished segment if one closed
    pub fn push(&mut self, samples: &[i16]) -> Option<Vec<i16>> {
        let energy = rms_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            EndpointState::Idle => {
                if is_speech {
                    self.state = EndpointState::Speaking;
                    self.buffer.clear();
                    self.buffer.extend_from_slice(samples);
                    self.silence_samples = 0;
                    tracing::trace!(energy, "speech detected");
                }
                None
            }
            EndpointState::Speaking => {
                self.buffer.extend_from_slice(samples);
                if is_speech {
                    self.silence_samples = 0;
                } else {
                    self.silence_samples += samples.len();
                }

                let voiced = self.buffer.len().saturating_sub(self.silence_samples);
                if self.silence_samples > self.silence_limit {
                    if voiced >= self.min_speech_samples {
                        tracing::debug!(samples = self.buffer.len(), "speech segment complete");
                        return Some(self.take());
                    }
                    tracing::trace!("too short, discarding");
                    self.reset();
                } else if self.buffer.len() >= self.max_samples {
                    tracing::debug!(samples = self.buffer.len(), "segment at maximum length");
                    return Some(self.take());
                }
                None
            }
        }
    }

    /// Take whatever speech is buffered, if it is long enough to decode
    pub fn flush(&mut self) -> Option<Vec<i16>> {
        let voiced = self.buffer.len().saturating_sub(self.silence_samples);
        if self.state == EndpointState::Speaking && voiced >= self.min_speech_samples {
            Some(self.take())
        } else {
            self.reset();
            None
        }
    }

    /// Discard buffered audio
    pub fn reset(&mut self) {
        self.state = EndpointState::Idle;
        self.buffer.clear();
        self.silence_samples = 0;
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> EndpointState {
        self.state
    }

    fn take(&mut self) -> Vec<i16> {
        self.state = EndpointState::Idle;
        self.silence_samples = 0;
        std::mem::take(&mut self.buffer)
    }
}

/// RMS energy of 16-bit samples, normalized to [0, 1]
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms_energy(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = i16_to_f32(samples).iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
