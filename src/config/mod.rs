//! Configuration management for the Jarvis agent

pub mod file;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::{Error, Result};
use file::JarvisConfigFile;

/// Default wake word
pub const DEFAULT_WAKE_WORD: &str = "jarvis";

/// Jarvis agent configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Trigger token that must precede a command
    pub wake_word: String,

    /// Microphone configuration
    pub audio: AudioConfig,

    /// Recognition backend configuration
    pub recognition: RecognitionConfig,

    /// Speech output configuration
    pub speech: SpeechConfig,

    /// File search configuration
    pub search: SearchConfig,

    /// Maximum characters spoken by the read intent
    pub max_read_chars: usize,

    /// How long a bare wake word waits for the command
    pub command_timeout: Duration,

    /// How long shutdown waits for the consumer to drain
    pub shutdown_grace: Duration,

    /// How long a hosted API request may take before it is abandoned
    pub http_timeout: Duration,

    /// Remote assistant fallback
    pub assistant: AssistantConfig,

    /// API keys
    pub api_keys: ApiKeys,

    /// Path to data directory (local models)
    pub data_dir: PathBuf,
}

/// Microphone and frame queue configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Capture sample rate in Hz (mono, 16-bit)
    pub sample_rate: u32,

    /// Samples per frame
    pub frame_size: usize,

    /// Frames buffered between the capture thread and the consumer
    pub queue_capacity: usize,

    /// Named input device; `None` uses the system default
    pub input_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_size: 1600,
            queue_capacity: 64,
            input_device: None,
        }
    }
}

/// Recognition backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// `OpenAI` Whisper transcription API
    CloudWhisper,
    /// Deepgram transcription API
    CloudDeepgram,
    /// Local whisper.cpp model
    LocalWhisper,
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cloud-whisper" | "whisper" | "openai" => Ok(Self::CloudWhisper),
            "cloud-deepgram" | "deepgram" => Ok(Self::CloudDeepgram),
            "local-whisper" | "local" => Ok(Self::LocalWhisper),
            other => Err(Error::Config(format!("unknown recognition backend: {other}"))),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CloudWhisper => write!(f, "cloud-whisper"),
            Self::CloudDeepgram => write!(f, "cloud-deepgram"),
            Self::LocalWhisper => write!(f, "local-whisper"),
        }
    }
}

/// Recognition backend configuration
#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    /// Which backend decodes audio
    pub backend: BackendKind,

    /// Cloud model identifier
    pub model: String,

    /// Local GGML model path
    pub model_path: PathBuf,
}

/// Speech output renderer selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechOutputKind {
    /// `OpenAI` TTS played through the default output device
    OpenAi,
    /// `ElevenLabs` TTS played through the default output device
    ElevenLabs,
    /// Platform speech command (`say`, `espeak-ng`, `System.Speech`)
    System,
    /// Print only
    Console,
}

impl FromStr for SpeechOutputKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "openai-tts" => Ok(Self::OpenAi),
            "elevenlabs" => Ok(Self::ElevenLabs),
            "system" | "local" => Ok(Self::System),
            "console" | "none" => Ok(Self::Console),
            other => Err(Error::Config(format!("unknown speech output: {other}"))),
        }
    }
}

/// Speech output configuration
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Renderer
    pub output: SpeechOutputKind,

    /// TTS voice identifier
    pub voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub speed: f32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            output: SpeechOutputKind::System,
            voice: "alloy".to_string(),
            speed: 1.0,
        }
    }
}

/// File search configuration
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Root directories, searched in order
    pub roots: Vec<PathBuf>,

    /// Maximum results per query
    pub max_results: usize,

    /// Maximum directory depth below each root (`None` = unbounded)
    pub max_depth: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            roots: vec![home_dir()],
            max_results: 5,
            max_depth: None,
        }
    }
}

/// Remote assistant configuration
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Forward unmatched commands to the language model
    pub enabled: bool,

    /// Chat model identifier
    pub model: String,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper, TTS, assistant)
    pub openai: Option<SecretString>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<SecretString>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<SecretString>,
}

/// Command-line overrides, applied above env and file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub wake_word: Option<String>,
    pub backend: Option<String>,
    pub speech: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wake_word: DEFAULT_WAKE_WORD.to_string(),
            audio: AudioConfig::default(),
            recognition: RecognitionConfig {
                backend: BackendKind::CloudWhisper,
                model: "whisper-1".to_string(),
                model_path: default_data_dir().join("models").join("ggml-base.en.bin"),
            },
            speech: SpeechConfig::default(),
            search: SearchConfig::default(),
            max_read_chars: 1500,
            command_timeout: Duration::from_secs(8),
            shutdown_grace: Duration::from_secs(3),
            http_timeout: Duration::from_secs(20),
            assistant: AssistantConfig {
                enabled: false,
                model: "gpt-4o-mini".to_string(),
            },
            api_keys: ApiKeys::default(),
            data_dir: default_data_dir(),
        }
    }
}

impl Config {
    /// Load configuration from the environment and the standard config file
    ///
    /// # Errors
    ///
    /// Returns error if a value cannot be parsed or fails validation
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, overrides, |key| std::env::var(key).ok())
    }

    /// Build configuration from explicit sources (flag > env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if a value cannot be parsed or fails validation
    pub fn from_sources<F>(fc: JarvisConfigFile, overrides: &Overrides, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let wake_word = overrides
            .wake_word
            .clone()
            .or_else(|| env("JARVIS_WAKE_WORD"))
            .or(fc.wake_word)
            .unwrap_or(defaults.wake_word)
            .trim()
            .to_lowercase();

        let audio = AudioConfig {
            sample_rate: parse_env(&env, "JARVIS_SAMPLE_RATE")?
                .or(fc.audio.sample_rate)
                .unwrap_or(defaults.audio.sample_rate),
            frame_size: parse_env(&env, "JARVIS_FRAME_SIZE")?
                .or(fc.audio.frame_size)
                .unwrap_or(defaults.audio.frame_size),
            queue_capacity: parse_env(&env, "JARVIS_QUEUE_CAPACITY")?
                .or(fc.audio.queue_capacity)
                .unwrap_or(defaults.audio.queue_capacity),
            input_device: env("JARVIS_INPUT_DEVICE").or(fc.audio.input_device),
        };

        // API keys (env > toml > None)
        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .map(SecretString::from),
            deepgram: env("DEEPGRAM_API_KEY")
                .or(fc.api_keys.deepgram)
                .map(SecretString::from),
            elevenlabs: env("ELEVENLABS_API_KEY")
                .or(fc.api_keys.elevenlabs)
                .map(SecretString::from),
        };

        let backend = match overrides
            .backend
            .clone()
            .or_else(|| env("JARVIS_BACKEND"))
            .or(fc.recognition.backend)
        {
            Some(s) => s.parse()?,
            None => defaults.recognition.backend,
        };
        let default_model = match backend {
            BackendKind::CloudDeepgram => "nova-2",
            BackendKind::CloudWhisper | BackendKind::LocalWhisper => "whisper-1",
        };
        let recognition = RecognitionConfig {
            backend,
            model: env("JARVIS_STT_MODEL")
                .or(fc.recognition.model)
                .unwrap_or_else(|| default_model.to_string()),
            model_path: env("JARVIS_MODEL_PATH")
                .or(fc.recognition.model_path)
                .map_or(defaults.recognition.model_path, PathBuf::from),
        };

        let speech = SpeechConfig {
            output: match overrides
                .speech
                .clone()
                .or_else(|| env("JARVIS_SPEECH"))
                .or(fc.speech.output)
            {
                Some(s) => s.parse()?,
                None => defaults.speech.output,
            },
            voice: fc.speech.voice.unwrap_or(defaults.speech.voice),
            speed: fc.speech.speed.unwrap_or(defaults.speech.speed),
        };

        let roots = env("JARVIS_SEARCH_ROOTS")
            .map(|paths| std::env::split_paths(&paths).collect::<Vec<_>>())
            .or_else(|| {
                fc.search
                    .roots
                    .map(|roots| roots.into_iter().map(PathBuf::from).collect())
            })
            .unwrap_or(defaults.search.roots);
        let search = SearchConfig {
            roots,
            max_results: parse_env(&env, "JARVIS_MAX_RESULTS")?
                .or(fc.search.max_results)
                .unwrap_or(defaults.search.max_results),
            max_depth: fc.search.max_depth,
        };

        let max_read_chars = parse_env(&env, "JARVIS_MAX_READ_CHARS")?
            .or(fc.read.max_chars)
            .unwrap_or(defaults.max_read_chars);

        let command_timeout = parse_env::<u64, _>(&env, "JARVIS_COMMAND_TIMEOUT_SECS")?
            .or(fc.command_timeout_secs)
            .map_or(defaults.command_timeout, Duration::from_secs);

        let shutdown_grace = fc
            .shutdown_grace_secs
            .map_or(defaults.shutdown_grace, Duration::from_secs);

        let http_timeout = parse_env::<u64, _>(&env, "JARVIS_HTTP_TIMEOUT_SECS")?
            .or(fc.http_timeout_secs)
            .map_or(defaults.http_timeout, Duration::from_secs);

        // Assistant defaults on whenever an OpenAI key is present
        let assistant_enabled = env("JARVIS_ASSISTANT")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .or(fc.assistant.enabled)
            .unwrap_or(api_keys.openai.is_some());
        let assistant = AssistantConfig {
            enabled: assistant_enabled,
            model: env("JARVIS_ASSISTANT_MODEL")
                .or(fc.assistant.model)
                .unwrap_or(defaults.assistant.model),
        };

        let config = Self {
            wake_word,
            audio,
            recognition,
            speech,
            search,
            max_read_chars,
            command_timeout,
            shutdown_grace,
            http_timeout,
            assistant,
            api_keys,
            data_dir: defaults.data_dir,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first invalid option
    pub fn validate(&self) -> Result<()> {
        if self.wake_word.trim().is_empty() {
            return Err(Error::Config("wake word must not be empty".to_string()));
        }
        if self.audio.sample_rate == 0 {
            return Err(Error::Config("sample rate must be positive".to_string()));
        }
        if self.audio.frame_size == 0 {
            return Err(Error::Config("frame size must be positive".to_string()));
        }
        if self.audio.queue_capacity == 0 {
            return Err(Error::Config("queue capacity must be positive".to_string()));
        }
        if self.search.max_results == 0 {
            return Err(Error::Config(
                "max search results must be at least 1".to_string(),
            ));
        }
        if self.max_read_chars == 0 {
            return Err(Error::Config(
                "max read characters must be at least 1".to_string(),
            ));
        }
        if self.command_timeout.is_zero() {
            return Err(Error::Config("command timeout must be positive".to_string()));
        }
        if self.shutdown_grace.is_zero() {
            return Err(Error::Config(
                "shutdown grace period must be positive".to_string(),
            ));
        }
        if self.http_timeout.is_zero() {
            return Err(Error::Config("HTTP timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// Parse an optional numeric environment variable
fn parse_env<T, F>(env: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| Error::Config(format!("{key} is not a valid number: {raw}")))
        })
        .transpose()
}

/// User home directory, the default search root
fn home_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(|| PathBuf::from("."), |d| d.home_dir().to_path_buf())
}

/// Data directory (`~/.local/share/jarvis` on Linux)
fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".local/share/jarvis"),
        |d| d.data_dir().join("jarvis"),
    )
}
