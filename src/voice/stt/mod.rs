//! Speech recognition backends
//!
//! Every backend consumes the same [`AudioFrame`] shape. Both shipped
//! variants buffer frames through an [`Endpointer`] and decode a whole
//! segment once it closes; a streaming service could implement
//! [`RecognitionBackend`] directly and report partials as it goes.

mod cloud;
mod local;

use async_trait::async_trait;

pub use cloud::CloudTranscriber;
pub use local::LocalTranscriber;

use super::endpoint::Endpointer;
use super::frame::AudioFrame;
use crate::config::{BackendKind, Config};
use crate::{Error, Result};

/// Result of feeding audio to a backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recognition {
    /// Unstable hypothesis, diagnostics only
    pub partial: Option<String>,

    /// Completed transcript for an utterance boundary
    pub final_text: Option<String>,
}

impl Recognition {
    /// Nothing to report this frame
    #[must_use]
    pub const fn none() -> Self {
        Self {
            partial: None,
            final_text: None,
        }
    }

    /// A finished utterance; blank transcripts mean no speech
    #[must_use]
    pub fn finished(text: String) -> Self {
        let text = text.trim();
        Self {
            partial: None,
            final_text: (!text.is_empty()).then(|| text.to_string()),
        }
    }
}

/// Incremental speech recognizer
#[async_trait]
pub trait RecognitionBackend: Send {
    /// Feed one frame
    ///
    /// # Errors
    ///
    /// `Error::BackendTransient` if this decode cycle failed
    async fn submit_frame(&mut self, frame: &AudioFrame) -> Result<Recognition>;

    /// Decode whatever audio is still buffered
    ///
    /// # Errors
    ///
    /// `Error::BackendTransient` if the final decode failed
    async fn flush(&mut self) -> Result<Recognition>;

    /// Discard buffered audio without decoding
    fn reset(&mut self);

    /// Release backend resources
    fn close(&mut self);

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Turns one closed speech segment into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe 16-bit mono PCM at `sample_rate`
    ///
    /// # Errors
    ///
    /// `Error::BackendTransient` if decoding fails
    async fn transcribe(&self, pcm: &[i16], sample_rate: u32) -> Result<String>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Endpointed backend: buffers frames and transcribes whole segments
pub struct SegmentBackend<T> {
    transcriber: T,
    endpointer: Endpointer,
    sample_rate: u32,
}

impl<T: Transcriber> SegmentBackend<T> {
    /// Wrap a transcriber
    #[must_use]
    pub fn new(transcriber: T, sample_rate: u32) -> Self {
        Self {
            transcriber,
            endpointer: Endpointer::new(sample_rate),
            sample_rate,
        }
    }

    async fn decode(&self, segment: &[i16]) -> Result<Recognition> {
        let text = self.transcriber.transcribe(segment, self.sample_rate).await?;
        Ok(Recognition::finished(text))
    }
}

#[async_trait]
impl<T: Transcriber> RecognitionBackend for SegmentBackend<T> {
    async fn submit_frame(&mut self, frame: &AudioFrame) -> Result<Recognition> {
        match self.endpointer.push(&frame.samples) {
            Some(segment) => {
                tracing::debug!(
                    backend = self.transcriber.name(),
                    sequence = frame.sequence,
                    samples = segment.len(),
                    "decoding segment"
                );
                self.decode(&segment).await
            }
            None => Ok(Recognition::none()),
        }
    }

    async fn flush(&mut self) -> Result<Recognition> {
        match self.endpointer.flush() {
            Some(segment) => self.decode(&segment).await,
            None => Ok(Recognition::none()),
        }
    }

    fn reset(&mut self) {
        self.endpointer.reset();
    }

    fn close(&mut self) {
        self.endpointer.reset();
        tracing::debug!(backend = self.transcriber.name(), "recognition backend closed");
    }

    fn name(&self) -> &'static str {
        self.transcriber.name()
    }
}

/// Build the configured backend
///
/// # Errors
///
/// Returns `Error::BackendInit` if credentials or the local model are missing
pub fn create_backend(config: &Config) -> Result<Box<dyn RecognitionBackend>> {
    let rate = config.audio.sample_rate;
    let rec = &config.recognition;
    let client = || crate::http::client(config.http_timeout);

    let backend: Box<dyn RecognitionBackend> = match rec.backend {
        BackendKind::CloudWhisper => {
            let key = config.api_keys.openai.clone().ok_or_else(|| {
                Error::BackendInit("OPENAI_API_KEY required for cloud-whisper".to_string())
            })?;
            Box::new(SegmentBackend::new(
                CloudTranscriber::whisper(client()?, key, rec.model.clone()),
                rate,
            ))
        }
        BackendKind::CloudDeepgram => {
            let key = config.api_keys.deepgram.clone().ok_or_else(|| {
                Error::BackendInit("DEEPGRAM_API_KEY required for cloud-deepgram".to_string())
            })?;
            Box::new(SegmentBackend::new(
                CloudTranscriber::deepgram(client()?, key, rec.model.clone()),
                rate,
            ))
        }
        BackendKind::LocalWhisper => {
            Box::new(SegmentBackend::new(
                LocalTranscriber::new(&rec.model_path, rate)?,
                rate,
            ))
        }
    };

    tracing::info!(backend = %rec.backend, model = %rec.model, "recognition backend ready");
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use super::*;

    struct CountingTranscriber {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Transcriber for CountingTranscriber {
        async fn transcribe(&self, _pcm: &[i16], _sample_rate: u32) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::BackendTransient("offline".to_string()))
            } else {
                Ok("  jarvis open notes ".to_string())
            }
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn frame(sequence: u64, level: i16) -> AudioFrame {
        AudioFrame {
            sequence,
            captured_at: Instant::now(),
            samples: vec![level; 1600],
        }
    }

    #[tokio::test]
    async fn test_segment_decoded_after_silence() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut backend = SegmentBackend::new(
            CountingTranscriber {
                calls: Arc::clone(&calls),
                fail: false,
            },
            16_000,
        );

        let mut finals = Vec::new();
        for seq in 0..5 {
            let r = backend.submit_frame(&frame(seq, 8000)).await.unwrap();
            assert!(r.final_text.is_none());
        }
        for seq in 5..12 {
            if let Some(text) = backend.submit_frame(&frame(seq, 0)).await.unwrap().final_text {
                finals.push(text);
            }
        }

        assert_eq!(finals, vec!["jarvis open notes".to_string()]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_surfaces_and_backend_recovers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut backend = SegmentBackend::new(
            CountingTranscriber {
                calls: Arc::clone(&calls),
                fail: true,
            },
            16_000,
        );

        for seq in 0..5 {
            backend.submit_frame(&frame(seq, 8000)).await.unwrap();
        }
        let err = backend.flush().await.unwrap_err();
        assert!(matches!(err, Error::BackendTransient(_)));

        // Buffer was consumed; nothing left to decode
        assert_eq!(backend.flush().await.unwrap(), Recognition::none());
    }

    #[test]
    fn test_blank_transcript_is_no_speech() {
        assert_eq!(Recognition::finished("   ".to_string()), Recognition::none());
    }

    #[test]
    fn test_cloud_backend_requires_key() {
        let config = Config::default();
        let err = create_backend(&config).err().unwrap();
        assert!(matches!(err, Error::BackendInit(_)));
    }

    #[test]
    fn test_local_backend_rejects_non_16k_capture() {
        let mut config = Config::default();
        config.recognition.backend = BackendKind::LocalWhisper;
        config.audio.sample_rate = 44_100;

        let err = create_backend(&config).err().unwrap();
        assert!(matches!(err, Error::BackendInit(_)));
        assert!(err.to_string().contains("16000 Hz"));
    }
}
