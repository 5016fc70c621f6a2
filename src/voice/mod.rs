//! Voice pipeline
//!
//! Microphone capture feeds a bounded frame queue; the assembler drains it
//! through a recognition backend into utterances. Speech output is a
//! separate, serialized channel.

pub mod assembler;
pub mod capture;
pub mod endpoint;
pub mod frame;
pub mod playback;
pub mod speech;
pub mod stt;
pub mod tts;

pub use assembler::{AssemblyEvent, Utterance, UtteranceAssembler};
pub use capture::{AudioIngestor, CaptureControl, DeviceErrors, LinearResampler, list_input_devices, pcm_to_wav};
pub use frame::{AudioFrame, FrameChunker, FrameMessage, FrameReceiver, FrameSender, PushOutcome, frame_queue};
pub use speech::{SpeechChannel, SpeechRenderer, create_renderer};
pub use stt::{Recognition, RecognitionBackend, create_backend};
