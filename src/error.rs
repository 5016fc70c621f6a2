//! Error types for the Jarvis voice agent

use thiserror::Error;

/// Result type alias for Jarvis operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice agent
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Microphone could not be opened or failed mid-stream (fatal)
    #[error("audio device error: {0}")]
    AudioDevice(String),

    /// Recognition backend failed for this decode cycle (recoverable)
    #[error("recognition backend error: {0}")]
    BackendTransient(String),

    /// Recognition backend or model could not be initialized (fatal)
    #[error("recognition backend initialization failed: {0}")]
    BackendInit(String),

    /// No file matched the query
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// File type cannot be read aloud
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// File had no readable content
    #[error("empty content: {0}")]
    EmptyContent(String),

    /// File or application could not be launched
    #[error("launch failure: {0}")]
    Launch(String),

    /// Remote language-model fallback is not reachable
    #[error("remote assistant unavailable: {0}")]
    RemoteAssistantUnavailable(String),

    /// The consumer task died without reporting (panic or abort)
    #[error("pipeline task failed: {0}")]
    Pipeline(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error must stop the pipeline
    ///
    /// Only a lost microphone and a backend that never came up are fatal;
    /// everything else is reported and the agent keeps listening.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::AudioDevice(_) | Self::BackendInit(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::AudioDevice("no mic".to_string()).is_fatal());
        assert!(Error::BackendInit("model missing".to_string()).is_fatal());
        assert!(!Error::BackendTransient("timeout".to_string()).is_fatal());
        assert!(!Error::FileNotFound("notes".to_string()).is_fatal());
        assert!(!Error::Launch("xdg-open".to_string()).is_fatal());
        assert!(!Error::Pipeline("panicked".to_string()).is_fatal());
    }
}
