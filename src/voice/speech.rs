//! Serialized speech output
//!
//! [`SpeechChannel`] is the only way the agent talks. It owns the renderer
//! behind an async mutex, so at most one render is in flight no matter how
//! many handles exist.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Mutex;

use super::playback::AudioPlayback;
use super::tts::TextToSpeech;
use crate::config::{Config, SpeechOutputKind};
use crate::{Error, Result};

/// Renders one utterance audibly
#[async_trait]
pub trait SpeechRenderer: Send {
    /// Speak `text`, returning once rendering has finished
    ///
    /// # Errors
    ///
    /// Returns `Error::Tts` if rendering fails
    async fn render(&mut self, text: &str) -> Result<()>;
}

/// Cloud TTS played through the default output device
pub struct CloudSpeech {
    tts: TextToSpeech,
    playback: AudioPlayback,
}

impl CloudSpeech {
    #[must_use]
    pub const fn new(tts: TextToSpeech, playback: AudioPlayback) -> Self {
        Self { tts, playback }
    }
}

#[async_trait]
impl SpeechRenderer for CloudSpeech {
    async fn render(&mut self, text: &str) -> Result<()> {
        let mp3 = self.tts.synthesize(text).await?;
        self.playback.play_mp3(mp3).await
    }
}

/// Platform speech command
///
/// `say` on macOS, `System.Speech` through `PowerShell` on Windows and
/// `espeak-ng` (or `espeak`) elsewhere.
#[derive(Debug)]
pub struct SystemSpeech {
    program: PathBuf,
}

impl SystemSpeech {
    /// Locate the platform speech command
    ///
    /// # Errors
    ///
    /// Returns `Error::Tts` if no speech command is installed
    pub fn detect() -> Result<Self> {
        let candidates: &[&str] = if cfg!(target_os = "macos") {
            &["say"]
        } else if cfg!(windows) {
            &["powershell"]
        } else {
            &["espeak-ng", "espeak"]
        };

        candidates
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(|program| {
                tracing::debug!(program = %program.display(), "system speech command found");
                Self { program }
            })
            .ok_or_else(|| {
                Error::Tts(format!(
                    "no speech command found (tried {})",
                    candidates.join(", ")
                ))
            })
    }

    fn command(&self, text: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        if cfg!(windows) {
            let quoted = text.replace('\'', "''");
            let script = format!(
                "Add-Type -AssemblyName System.Speech; \
                 (New-Object System.Speech.Synthesis.SpeechSynthesizer).Speak('{quoted}')"
            );
            cmd.args(["-NoProfile", "-Command", script.as_str()]);
        } else {
            cmd.arg(text);
        }
        cmd.kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl SpeechRenderer for SystemSpeech {
    async fn render(&mut self, text: &str) -> Result<()> {
        let output = self.command(text).output().await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::Tts(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

/// Prints only; the channel already echoes every utterance
#[derive(Debug, Default)]
pub struct ConsoleSpeech;

#[async_trait]
impl SpeechRenderer for ConsoleSpeech {
    async fn render(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }
}

/// Build the configured renderer
///
/// # Errors
///
/// Returns error if the renderer's credentials or device are unavailable
pub fn create_renderer(config: &Config) -> Result<Box<dyn SpeechRenderer>> {
    let speech = &config.speech;
    let renderer: Box<dyn SpeechRenderer> = match speech.output {
        SpeechOutputKind::OpenAi => {
            let key = config.api_keys.openai.clone().ok_or_else(|| {
                Error::Config("OPENAI_API_KEY required for openai speech".to_string())
            })?;
            Box::new(CloudSpeech::new(
                TextToSpeech::new_openai(
                    crate::http::client(config.http_timeout)?,
                    key,
                    speech.voice.clone(),
                    speech.speed,
                ),
                AudioPlayback::new()?,
            ))
        }
        SpeechOutputKind::ElevenLabs => {
            let key = config.api_keys.elevenlabs.clone().ok_or_else(|| {
                Error::Config("ELEVENLABS_API_KEY required for elevenlabs speech".to_string())
            })?;
            Box::new(CloudSpeech::new(
                TextToSpeech::new_elevenlabs(
                    crate::http::client(config.http_timeout)?,
                    key,
                    speech.voice.clone(),
                ),
                AudioPlayback::new()?,
            ))
        }
        SpeechOutputKind::System => Box::new(SystemSpeech::detect()?),
        SpeechOutputKind::Console => Box::new(ConsoleSpeech),
    };
    Ok(renderer)
}

/// The agent's single, serialized speech output
#[derive(Clone)]
pub struct SpeechChannel {
    renderer: Arc<Mutex<Box<dyn SpeechRenderer>>>,
}

impl SpeechChannel {
    #[must_use]
    pub fn new(renderer: Box<dyn SpeechRenderer>) -> Self {
        Self {
            renderer: Arc::new(Mutex::new(renderer)),
        }
    }

    /// Speak one utterance
    ///
    /// Waits for any render already in flight, then renders `text` to
    /// completion before the next caller can start.
    ///
    /// # Errors
    ///
    /// Returns the renderer's error; the text has still been printed
    pub async fn speak(&self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let mut renderer = self.renderer.lock().await;
        println!("JARVIS: {text}");
        tracing::debug!(text, "speaking");
        renderer.render(text).await
    }

    /// Speak, logging instead of returning a render failure
    pub async fn say(&self, text: &str) {
        if let Err(e) = self.speak(text).await {
            tracing::warn!(error = %e, "speech output failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// Records overlap: fails the test if two renders run at once
    struct Overlap {
        active: Arc<AtomicUsize>,
        max_seen: Arc<AtomicUsize>,
        spoken: Arc<std::sync::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl SpeechRenderer for Overlap {
        async fn render(&mut self, text: &str) -> Result<()> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.spoken.lock().unwrap().push(text.to_string());
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_renders_never_overlap() {
        let max_seen = Arc::new(AtomicUsize::new(0));
        let spoken = Arc::new(std::sync::Mutex::new(Vec::new()));
        let channel = SpeechChannel::new(Box::new(Overlap {
            active: Arc::new(AtomicUsize::new(0)),
            max_seen: Arc::clone(&max_seen),
            spoken: Arc::clone(&spoken),
        }));

        let tasks: Vec<_> = (0..4)
            .map(|i| {
                let channel = channel.clone();
                tokio::spawn(async move { channel.speak(&format!("line {i}")).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(spoken.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_blank_text_is_skipped() {
        let spoken = Arc::new(std::sync::Mutex::new(Vec::new()));
        let channel = SpeechChannel::new(Box::new(Overlap {
            active: Arc::new(AtomicUsize::new(0)),
            max_seen: Arc::new(AtomicUsize::new(0)),
            spoken: Arc::clone(&spoken),
        }));

        channel.speak("   ").await.unwrap();
        assert!(spoken.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_console_renderer_succeeds() {
        let channel = SpeechChannel::new(Box::new(ConsoleSpeech));
        assert!(channel.speak("Yes?").await.is_ok());
    }
}
