//! Audio frames and the bounded capture → recognition queue
//!
//! The capture callback is the only producer while the microphone is live.
//! Pushing never blocks: when the queue is full the newest frame is dropped,
//! so the real-time thread keeps pace no matter how slow recognition is.
//! Shutdown pushes an explicit [`FrameMessage::EndOfStream`] sentinel after
//! capture has stopped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::{Error, Result};

/// Log a warning on the first dropped frame and every Nth after that
const DROP_WARN_INTERVAL: u64 = 50;

/// A fixed-size block of 16-bit mono PCM samples
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Monotonic sequence number assigned at capture
    pub sequence: u64,

    /// When the last sample of the frame was captured
    pub captured_at: Instant,

    /// Raw samples
    pub samples: Vec<i16>,
}

impl AudioFrame {
    /// Frame duration at the given sample rate
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self, sample_rate: u32) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(sample_rate))
    }
}

/// Item carried by the frame queue
#[derive(Debug)]
pub enum FrameMessage {
    /// Captured audio
    Frame(AudioFrame),
    /// No more frames will follow
    EndOfStream,
}

/// What happened to a pushed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Frame is waiting for the consumer
    Queued,
    /// Queue was full, frame discarded
    Dropped,
    /// Consumer is gone
    Closed,
}

/// Create a bounded frame queue
///
/// # Panics
///
/// Panics if `capacity` is zero (rejected earlier by config validation)
#[must_use]
pub fn frame_queue(capacity: usize) -> (FrameSender, FrameReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        FrameSender {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        FrameReceiver { rx },
    )
}

/// Producer half of the frame queue
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<FrameMessage>,
    dropped: Arc<AtomicU64>,
}

impl FrameSender {
    /// Push a frame without blocking
    pub fn push(&self, frame: AudioFrame) -> PushOutcome {
        let sequence = frame.sequence;
        match self.tx.try_send(FrameMessage::Frame(frame)) {
            Ok(()) => PushOutcome::Queued,
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped % DROP_WARN_INTERVAL == 0 {
                    tracing::warn!(sequence, dropped, "frame queue full, dropping newest frame");
                }
                PushOutcome::Dropped
            }
            Err(TrySendError::Closed(_)) => PushOutcome::Closed,
        }
    }

    /// Push the end-of-stream sentinel, waiting up to `timeout` for space
    ///
    /// # Errors
    ///
    /// Returns error if the consumer is gone or the queue stays full
    pub async fn end_of_stream(&self, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.tx.send(FrameMessage::EndOfStream)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(Error::AudioDevice(
                "frame consumer already stopped".to_string(),
            )),
            Err(_) => Err(Error::AudioDevice(
                "timed out queueing end of stream".to_string(),
            )),
        }
    }

    /// Total frames dropped because the queue was full
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer half of the frame queue
#[derive(Debug)]
pub struct FrameReceiver {
    rx: mpsc::Receiver<FrameMessage>,
}

impl FrameReceiver {
    /// Receive the next message in production order
    ///
    /// A queue whose producers are all gone reads as end of stream.
    /// Cancel safe.
    pub async fn recv(&mut self) -> FrameMessage {
        self.rx.recv().await.unwrap_or(FrameMessage::EndOfStream)
    }
}

/// Cuts a continuous sample stream into fixed-size, sequenced frames
#[derive(Debug)]
pub struct FrameChunker {
    frame_size: usize,
    next_sequence: u64,
    pending: Vec<i16>,
    sender: FrameSender,
}

impl FrameChunker {
    /// Create a chunker emitting frames of `frame_size` samples
    #[must_use]
    pub fn new(frame_size: usize, sender: FrameSender) -> Self {
        Self {
            frame_size,
            next_sequence: 0,
            pending: Vec::with_capacity(frame_size * 2),
            sender,
        }
    }

    /// Append samples, pushing every completed frame
    ///
    /// Returns the number of frames dropped during this call.
    pub fn push_samples(&mut self, samples: &[i16]) -> usize {
        self.pending.extend_from_slice(samples);

        let mut dropped = 0;
        while self.pending.len() >= self.frame_size {
            let frame = AudioFrame {
                sequence: self.next_sequence,
                captured_at: Instant::now(),
                samples: self.pending.drain(..self.frame_size).collect(),
            };
            self.next_sequence += 1;

            if self.sender.push(frame) == PushOutcome::Dropped {
                dropped += 1;
            }
        }
        dropped
    }

    /// Sequence number the next frame will carry
    #[must_use]
    pub const fn next_sequence(&self) -> u64 {
        self.next_sequence
    }
}

/// Convert f32 samples in [-1.0, 1.0] to 16-bit PCM
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16)
        .collect()
}

/// Convert 16-bit PCM to f32 samples in [-1.0, 1.0]
#[must_use]
pub fn i16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| f32::from(s) / 32768.0).collect()
}
