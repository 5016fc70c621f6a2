//! TOML configuration file loading
//!
//! Supports `~/.config/jarvis/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct JarvisConfigFile {
    /// Wake word (e.g. "jarvis")
    #[serde(default)]
    pub wake_word: Option<String>,

    /// Seconds to wait for a command after a bare wake word
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,

    /// Seconds to wait for the consumer to drain on shutdown
    #[serde(default)]
    pub shutdown_grace_secs: Option<u64>,

    /// Seconds before a hosted API request is abandoned
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,

    /// Microphone configuration
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Recognition backend configuration
    #[serde(default)]
    pub recognition: RecognitionFileConfig,

    /// Speech output configuration
    #[serde(default)]
    pub speech: SpeechFileConfig,

    /// File search configuration
    #[serde(default)]
    pub search: SearchFileConfig,

    /// File reading configuration
    #[serde(default)]
    pub read: ReadFileConfig,

    /// Remote assistant fallback
    #[serde(default)]
    pub assistant: AssistantFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Microphone configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Capture sample rate in Hz
    pub sample_rate: Option<u32>,

    /// Samples per frame
    pub frame_size: Option<usize>,

    /// Frames buffered between capture and recognition
    pub queue_capacity: Option<usize>,

    /// Input device name (system default when absent)
    pub input_device: Option<String>,
}

/// Recognition backend configuration
#[derive(Debug, Default, Deserialize)]
pub struct RecognitionFileConfig {
    /// Backend identifier ("cloud-whisper", "cloud-deepgram", "local-whisper")
    pub backend: Option<String>,

    /// Cloud model identifier (e.g. "whisper-1")
    pub model: Option<String>,

    /// Path to a local GGML model
    pub model_path: Option<String>,
}

/// Speech output configuration
#[derive(Debug, Default, Deserialize)]
pub struct SpeechFileConfig {
    /// Renderer ("openai", "elevenlabs", "system", "console")
    pub output: Option<String>,

    /// TTS voice identifier
    pub voice: Option<String>,

    /// TTS speed multiplier
    pub speed: Option<f32>,
}

/// File search configuration
#[derive(Debug, Default, Deserialize)]
pub struct SearchFileConfig {
    /// Root directories, searched in order
    pub roots: Option<Vec<String>>,

    /// Maximum results per query
    pub max_results: Option<usize>,

    /// Maximum directory depth below each root
    pub max_depth: Option<usize>,
}

/// File reading configuration
#[derive(Debug, Default, Deserialize)]
pub struct ReadFileConfig {
    /// Maximum characters spoken from a file
    pub max_chars: Option<usize>,
}

/// Remote assistant configuration
#[derive(Debug, Default, Deserialize)]
pub struct AssistantFileConfig {
    /// Enable the language-model fallback
    pub enabled: Option<bool>,

    /// Chat model identifier
    pub model: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `JarvisConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> JarvisConfigFile {
    config_file_path().map_or_else(JarvisConfigFile::default, |path| load_config_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// Missing or malformed files fall back to defaults with a warning.
pub fn load_config_from(path: &Path) -> JarvisConfigFile {
    if !path.exists() {
        return JarvisConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                JarvisConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            JarvisConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/jarvis/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("jarvis").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_parses() {
        let fc: JarvisConfigFile = toml::from_str(
            r#"
            wake_word = "friday"

            [search]
            roots = ["/tmp/docs"]
            max_results = 3
            "#,
        )
        .unwrap();

        assert_eq!(fc.wake_word.as_deref(), Some("friday"));
        assert_eq!(fc.search.max_results, Some(3));
        assert!(fc.audio.sample_rate.is_none());
        assert!(fc.api_keys.openai.is_none());
    }

    #[test]
    fn test_missing_file_is_default() {
        let fc = load_config_from(Path::new("/definitely/not/here/config.toml"));
        assert!(fc.wake_word.is_none());
    }
}
