//! Jarvis - always-listening voice command agent
//!
//! Listens to the microphone, waits for a wake word, and runs the spoken
//! command against the local desktop: open or search for files, read a
//! document aloud, report the time, or ask a remote assistant.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  frames   ┌──────────────────┐  utterances  ┌───────────┐
//! │ AudioIngestor├──────────►│UtteranceAssembler├─────────────►│ WakeGate  │
//! │  (cpal)      │  bounded  │ + Recognition    │              └─────┬─────┘
//! └──────────────┘  queue    └──────────────────┘                    │ command
//!                                                              ┌─────▼─────────────┐
//!                                  SpeechChannel ◄─────────────┤ CommandDispatcher │
//!                                  (serialized)                └───────────────────┘
//! ```

pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod locator;
pub mod voice;
pub mod wake;

pub use config::Config;
pub use daemon::Daemon;
pub use error::{Error, Result};
