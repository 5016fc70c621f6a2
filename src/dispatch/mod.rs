//! Command dispatch
//!
//! Classifies a command with the ordered intent rules and runs exactly one
//! handler. Every outcome, including failures, is reported through the
//! speech channel; nothing here is fatal. Shutdown is returned to the caller
//! as a value rather than ending the process from inside a handler.

pub mod assistant;
pub mod intent;
pub mod open;
pub mod read;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Local};

pub use assistant::{OpenAiAssistant, RemoteAssistant};
pub use intent::{Intent, classify};
pub use open::{FileOpener, SystemOpener};
pub use read::{DocumentExtractor, Extracted, FileContentExtractor};

use crate::config::Config;
use crate::locator::FileLocator;
use crate::voice::SpeechChannel;
use crate::{Error, Result};

pub const GREETING: &str = "Hello. How can I help you today?";
pub const FAREWELL: &str = "Shutting down. Goodbye.";
pub const NOT_UNDERSTOOD: &str = "I didn't understand. Try: 'Jarvis open resume pdf', \
    'Jarvis read notes', 'Jarvis search for budget spreadsheet', or 'Jarvis what time is it'.";
pub const NOTHING_FOUND: &str = "I couldn't find anything with that name.";
pub const READ_NOT_FOUND: &str = "I couldn't find that file to read.";
pub const READ_EMPTY: &str = "File is empty.";
pub const READ_UNSUPPORTED: &str = "I can only read plain text and PDFs for now.";
pub const READ_NO_PAGES: &str = "PDF has no pages.";
pub const READ_NO_TEXT: &str = "I couldn't extract text from that PDF.";

/// Time report pattern (chrono `strftime` syntax)
pub const TIME_FORMAT: &str = "It is %H:%M on %A, %B %d, %Y";

/// Whether the agent keeps listening after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Continue,
    Shutdown,
}

/// Routes commands to intent handlers
pub struct CommandDispatcher {
    speech: SpeechChannel,
    locator: FileLocator,
    opener: Arc<dyn FileOpener>,
    extractor: Arc<dyn FileContentExtractor>,
    assistant: Option<Arc<dyn RemoteAssistant>>,
    max_read_chars: usize,
    clock: fn() -> DateTime<Local>,
}

impl CommandDispatcher {
    /// Dispatcher with the platform opener, the document extractor and no
    /// remote assistant
    #[must_use]
    pub fn new(speech: SpeechChannel, locator: FileLocator, max_read_chars: usize) -> Self {
        Self {
            speech,
            locator,
            opener: Arc::new(SystemOpener),
            extractor: Arc::new(DocumentExtractor),
            assistant: None,
            max_read_chars,
            clock: Local::now,
        }
    }

    /// Build from configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the search settings are invalid
    pub fn from_config(config: &Config, speech: SpeechChannel) -> Result<Self> {
        let locator = FileLocator::new(
            config.search.roots.clone(),
            config.search.max_results,
            config.search.max_depth,
        )?;
        let mut dispatcher = Self::new(speech, locator, config.max_read_chars);

        if config.assistant.enabled {
            match config.api_keys.openai.clone() {
                Some(key) => {
                    let client = crate::http::client(config.http_timeout)?;
                    dispatcher = dispatcher.with_assistant(Arc::new(OpenAiAssistant::new(
                        client,
                        key,
                        config.assistant.model.clone(),
                    )));
                }
                None => tracing::warn!("assistant enabled but OPENAI_API_KEY is not set"),
            }
        }
        Ok(dispatcher)
    }

    #[must_use]
    pub fn with_opener(mut self, opener: Arc<dyn FileOpener>) -> Self {
        self.opener = opener;
        self
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn FileContentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    #[must_use]
    pub fn with_assistant(mut self, assistant: Arc<dyn RemoteAssistant>) -> Self {
        self.assistant = Some(assistant);
        self
    }

    /// Replace the wall clock used by the time intent
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Local>) -> Self {
        self.clock = clock;
        self
    }

    /// Handle one command to completion
    pub async fn dispatch(&self, command: &str) -> DispatchOutcome {
        let intent = classify(command);
        tracing::info!(command, intent = ?intent, "dispatching");

        match intent {
            Intent::Open(query) => self.open(&query).await,
            Intent::Search(query) => self.search(&query).await,
            Intent::Read(query) => self.read(&query).await,
            Intent::Time => {
                let now = (self.clock)();
                self.speech.say(&now.format(TIME_FORMAT).to_string()).await;
            }
            Intent::Greeting => self.speech.say(GREETING).await,
            Intent::Shutdown => {
                // The farewell is best effort; shutdown proceeds regardless
                if let Err(e) = self.speech.speak(FAREWELL).await {
                    tracing::warn!(error = %e, "farewell not rendered");
                }
                return DispatchOutcome::Shutdown;
            }
            Intent::Fallback(text) => self.fallback(&text).await,
        }
        DispatchOutcome::Continue
    }

    async fn open(&self, query: &str) {
        if let Some(path) = self.locator.search_async(query, 1).await.into_iter().next() {
            self.open_path(&path).await;
            return;
        }

        tracing::debug!(query, "no file match, trying application");
        let response = match self.opener.launch(query).await {
            Ok(()) => format!("Attempting to open {query}"),
            Err(e) => {
                tracing::info!(query, error = %e, "launch failed");
                format!("I couldn't find or open {query}")
            }
        };
        self.speech.say(&response).await;
    }

    async fn search(&self, query: &str) {
        let results = self
            .locator
            .search_async(query, self.locator.max_results())
            .await;

        let Some(first) = results.first() else {
            self.speech.say(NOTHING_FOUND).await;
            return;
        };

        let count = results.len();
        let noun = if count == 1 { "item" } else { "items" };
        self.speech
            .say(&format!("I found {count} {noun}. Opening first match."))
            .await;
        self.open_path(first).await;
    }

    async fn read(&self, query: &str) {
        let Some(path) = self.locator.search_async(query, 1).await.into_iter().next() else {
            self.speech.say(READ_NOT_FOUND).await;
            return;
        };

        tracing::info!(path = %path.display(), "reading file");
        let response = match self.extractor.extract(&path, self.max_read_chars).await {
            Ok(Extracted::Text(text)) => text,
            Ok(Extracted::EmptyFile) => READ_EMPTY.to_string(),
            Ok(Extracted::UnsupportedFormat) => READ_UNSUPPORTED.to_string(),
            Ok(Extracted::NoPages) => READ_NO_PAGES.to_string(),
            Ok(Extracted::NoText) => READ_NO_TEXT.to_string(),
            Err(Error::FileNotFound(_)) => READ_NOT_FOUND.to_string(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "read failed");
                format!("Error reading file: {}", reason(&e))
            }
        };
        self.speech.say(&response).await;
    }

    async fn open_path(&self, path: &Path) {
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

        let response = match self.opener.open(path).await {
            Ok(()) => format!("Opened {name}"),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "open failed");
                format!("Failed to open {name}: {}", reason(&e))
            }
        };
        self.speech.say(&response).await;
    }

    async fn fallback(&self, text: &str) {
        let Some(assistant) = &self.assistant else {
            self.speech.say(NOT_UNDERSTOOD).await;
            return;
        };

        let response = match assistant.ask(text).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(error = %e, "remote assistant failed");
                format!("Remote assistant error: {}", reason(&e))
            }
        };
        self.speech.say(&response).await;
    }
}

/// The human-facing part of an error, without the variant prefix
fn reason(e: &Error) -> String {
    match e {
        Error::Launch(r)
        | Error::RemoteAssistantUnavailable(r)
        | Error::UnsupportedFormat(r)
        | Error::EmptyContent(r)
        | Error::FileNotFound(r) => r.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::voice::speech::ConsoleSpeech;

    fn fixed_clock() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 5, 9, 7, 0).unwrap()
    }

    #[test]
    fn test_time_format() {
        assert_eq!(
            fixed_clock().format(TIME_FORMAT).to_string(),
            "It is 09:07 on Tuesday, March 05, 2024"
        );
    }

    #[test]
    fn test_reason_strips_prefix() {
        assert_eq!(reason(&Error::Launch("no xdg-open".to_string())), "no xdg-open");
    }

    #[tokio::test]
    async fn test_shutdown_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let locator = FileLocator::new(vec![dir.path().to_path_buf()], 5, None).unwrap();
        let dispatcher =
            CommandDispatcher::new(SpeechChannel::new(Box::new(ConsoleSpeech)), locator, 100)
                .with_clock(fixed_clock);

        assert_eq!(dispatcher.dispatch("what time is it").await, DispatchOutcome::Continue);
        assert_eq!(dispatcher.dispatch("goodbye").await, DispatchOutcome::Shutdown);
    }
}
