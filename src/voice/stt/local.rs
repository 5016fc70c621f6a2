//! Local whisper.cpp recognition via whisper-rs
//!
//! The real decoder is gated behind the `whisper` feature. Without it the
//! constructor fails with `BackendInit`, which stops the agent at startup.

use crate::{Error, Result};

/// whisper.cpp expects 16 kHz input
pub const WHISPER_RATE: u32 = 16_000;

/// Reject capture rates the local model cannot decode
///
/// # Errors
///
/// Returns `Error::BackendInit` unless `sample_rate` is 16 kHz
pub fn require_whisper_rate(sample_rate: u32) -> Result<()> {
    if sample_rate == WHISPER_RATE {
        Ok(())
    } else {
        Err(Error::BackendInit(format!(
            "local whisper requires {WHISPER_RATE} Hz audio, configured for {sample_rate} Hz"
        )))
    }
}

#[cfg(feature = "whisper")]
mod inner {
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use whisper_rs::{
        FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, WhisperState,
    };

    use super::{WHISPER_RATE, require_whisper_rate};
    use crate::voice::frame::i16_to_f32;
    use crate::voice::stt::Transcriber;
    use crate::{Error, Result};

    /// Half the cores, capped, so capture and playback keep headroom
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn inference_threads() -> i32 {
        let cores = std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get);
        (cores / 2).clamp(1, 8) as i32
    }

    struct Decoder {
        ctx: WhisperContext,
        state: Option<WhisperState>,
    }

    /// Decodes segments with a GGML whisper model on a blocking thread
    pub struct LocalTranscriber {
        decoder: Arc<Mutex<Decoder>>,
        n_threads: i32,
    }

    impl LocalTranscriber {
        /// Load a GGML whisper model for audio at `sample_rate`
        ///
        /// # Errors
        ///
        /// Returns `Error::BackendInit` if the rate is not 16 kHz or the
        /// model is missing or invalid
        pub fn new(model_path: &Path, sample_rate: u32) -> Result<Self> {
            require_whisper_rate(sample_rate)?;
            if !model_path.exists() {
                return Err(Error::BackendInit(format!(
                    "whisper model not found: {}",
                    model_path.display()
                )));
            }
            let path = model_path.to_str().ok_or_else(|| {
                Error::BackendInit(format!("model path is not UTF-8: {}", model_path.display()))
            })?;
            let ctx = WhisperContext::new_with_params(path, WhisperContextParameters::default())
                .map_err(|e| Error::BackendInit(format!("failed to load whisper model: {e}")))?;

            let n_threads = inference_threads();
            tracing::info!(model = %model_path.display(), threads = n_threads, "whisper model loaded");

            Ok(Self {
                decoder: Arc::new(Mutex::new(Decoder { ctx, state: None })),
                n_threads,
            })
        }
    }

    #[async_trait]
    impl Transcriber for LocalTranscriber {
        async fn transcribe(&self, pcm: &[i16], sample_rate: u32) -> Result<String> {
            if sample_rate != WHISPER_RATE {
                return Err(Error::BackendTransient(format!(
                    "whisper requires {WHISPER_RATE} Hz audio, got {sample_rate}"
                )));
            }

            let audio = i16_to_f32(pcm);
            let decoder = Arc::clone(&self.decoder);
            let n_threads = self.n_threads;

            tokio::task::spawn_blocking(move || -> Result<String> {
                let mut guard = decoder
                    .lock()
                    .map_err(|_| Error::BackendTransient("whisper decoder poisoned".to_string()))?;
                let Decoder { ctx, state } = &mut *guard;

                // State allocation is expensive; build it once and reuse
                if state.is_none() {
                    *state = Some(ctx.create_state().map_err(|e| {
                        Error::BackendTransient(format!("failed to create whisper state: {e}"))
                    })?);
                }
                let Some(state) = state.as_mut() else {
                    return Err(Error::BackendTransient("whisper state unavailable".to_string()));
                };

                let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
                params.set_language(Some("en"));
                params.set_n_threads(n_threads);
                params.set_print_special(false);
                params.set_print_progress(false);
                params.set_print_realtime(false);
                params.set_print_timestamps(false);
                params.set_single_segment(true);
                params.set_no_timestamps(true);
                params.set_suppress_nst(true);

                state
                    .full(params, &audio)
                    .map_err(|e| Error::BackendTransient(format!("whisper inference failed: {e}")))?;

                let segments = state
                    .full_n_segments()
                    .map_err(|e| Error::BackendTransient(e.to_string()))?;
                let text = (0..segments)
                    .filter_map(|i| state.full_get_segment_text(i).ok())
                    .map(|s| s.trim().to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                Ok(text)
            })
            .await
            .map_err(|e| Error::BackendTransient(format!("whisper task failed: {e}")))?
        }

        fn name(&self) -> &'static str {
            "local-whisper"
        }
    }
}

#[cfg(not(feature = "whisper"))]
mod inner {
    use std::path::Path;

    use async_trait::async_trait;

    use super::require_whisper_rate;
    use crate::voice::stt::Transcriber;
    use crate::{Error, Result};

    /// Placeholder when built without the `whisper` feature
    pub struct LocalTranscriber;

    impl LocalTranscriber {
        /// Always fails: local recognition is not compiled in
        ///
        /// # Errors
        ///
        /// Always returns `Error::BackendInit`
        pub fn new(model_path: &Path, sample_rate: u32) -> Result<Self> {
            require_whisper_rate(sample_rate)?;
            tracing::warn!(
                model = %model_path.display(),
                "local-whisper requested but the whisper feature is disabled"
            );
            Err(Error::BackendInit(
                "local whisper is not available (build with --features whisper)".to_string(),
            ))
        }
    }

    #[async_trait]
    impl Transcriber for LocalTranscriber {
        async fn transcribe(&self, _pcm: &[i16], _sample_rate: u32) -> Result<String> {
            Err(Error::BackendInit(
                "local whisper is not available (build with --features whisper)".to_string(),
            ))
        }

        fn name(&self) -> &'static str {
            "local-whisper"
        }
    }
}

pub use inner::LocalTranscriber;
