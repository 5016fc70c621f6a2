//! Utterance assembly
//!
//! Single consumer of the frame queue. Frames go to the recognition backend
//! in production order and come back out as discrete utterance events.

use chrono::{DateTime, Local};
use tokio::time::Instant;

use super::frame::{FrameMessage, FrameReceiver};
use super::stt::{Recognition, RecognitionBackend};
use crate::Result;

/// A transcript emitted by the assembler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Transcribed text
    pub text: String,

    /// Partials are advisory and never dispatched
    pub is_final: bool,

    /// When the utterance was emitted
    pub timestamp: DateTime<Local>,
}

impl Utterance {
    /// A finalized transcript stamped now
    #[must_use]
    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
            timestamp: Local::now(),
        }
    }

    /// A partial hypothesis stamped now
    #[must_use]
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
            timestamp: Local::now(),
        }
    }
}

/// What [`UtteranceAssembler::next_event`] produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyEvent {
    /// A finalized utterance
    Utterance(Utterance),
    /// The caller's deadline passed before any utterance completed
    DeadlineElapsed,
}

/// Turns the frame stream into a stream of utterances
pub struct UtteranceAssembler {
    frames: FrameReceiver,
    backend: Box<dyn RecognitionBackend>,
    finished: bool,
    frames_seen: u64,
    transient_failures: u64,
}

impl UtteranceAssembler {
    /// Create an assembler over the consumer half of the frame queue
    #[must_use]
    pub fn new(frames: FrameReceiver, backend: Box<dyn RecognitionBackend>) -> Self {
        Self {
            frames,
            backend,
            finished: false,
            frames_seen: 0,
            transient_failures: 0,
        }
    }

    /// Wait for the next finalized utterance
    ///
    /// With a deadline, returns [`AssemblyEvent::DeadlineElapsed`] once it
    /// passes. Only the wait for a frame races the deadline; a decode in
    /// progress always completes first. Returns `None` after end of stream,
    /// once pending audio has been flushed and the backend closed.
    ///
    /// # Errors
    ///
    /// Returns a fatal backend error; transient ones are logged and skipped
    pub async fn next_event(&mut self, deadline: Option<Instant>) -> Result<Option<AssemblyEvent>> {
        loop {
            if self.finished {
                return Ok(None);
            }

            let message = match deadline {
                Some(at) => tokio::select! {
                    biased;
                    message = self.frames.recv() => message,
                    () = tokio::time::sleep_until(at) => {
                        return Ok(Some(AssemblyEvent::DeadlineElapsed));
                    }
                },
                None => self.frames.recv().await,
            };

            match message {
                FrameMessage::Frame(frame) => {
                    self.frames_seen += 1;
                    let result = self.backend.submit_frame(&frame).await;
                    if let Some(utterance) = self.accept(result)? {
                        return Ok(Some(AssemblyEvent::Utterance(utterance)));
                    }
                }
                FrameMessage::EndOfStream => {
                    tracing::debug!(frames = self.frames_seen, "end of stream, flushing");
                    self.finished = true;
                    let result = self.backend.flush().await;
                    let pending = self.accept(result);
                    self.backend.close();
                    if let Some(utterance) = pending? {
                        return Ok(Some(AssemblyEvent::Utterance(utterance)));
                    }
                    return Ok(None);
                }
            }
        }
    }

    /// Frames consumed so far
    #[must_use]
    pub const fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Decode cycles lost to transient backend errors
    #[must_use]
    pub const fn transient_failures(&self) -> u64 {
        self.transient_failures
    }

    fn accept(&mut self, result: Result<Recognition>) -> Result<Option<Utterance>> {
        match result {
            Ok(recognition) => {
                if let Some(partial) = recognition.partial.as_deref() {
                    tracing::debug!(partial, "partial hypothesis");
                }
                Ok(recognition.final_text.map(|text| {
                    tracing::info!(text = %text, "utterance");
                    Utterance::final_text(text)
                }))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                self.transient_failures += 1;
                tracing::warn!(
                    backend = self.backend.name(),
                    error = %e,
                    failures = self.transient_failures,
                    "recognition failed, skipping cycle"
                );
                self.backend.reset();
                Ok(None)
            }
        }
    }
}
