//! Shared test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};

use jarvis_voice::dispatch::{CommandDispatcher, FileOpener, RemoteAssistant};
use jarvis_voice::locator::FileLocator;
use jarvis_voice::voice::{
    AudioFrame, FrameSender, Recognition, RecognitionBackend, SpeechChannel, SpeechRenderer,
};
use jarvis_voice::{Error, Result};

/// Everything the agent said, in order
pub type Transcript = Arc<Mutex<Vec<String>>>;

/// Renderer that records instead of speaking
pub struct RecordingSpeech {
    spoken: Transcript,
}

#[async_trait]
impl SpeechRenderer for RecordingSpeech {
    async fn render(&mut self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Renderer whose output device is always broken
pub struct FailingSpeech;

#[async_trait]
impl SpeechRenderer for FailingSpeech {
    async fn render(&mut self, _text: &str) -> Result<()> {
        Err(Error::Tts("speaker unplugged".to_string()))
    }
}

/// Speech channel plus the transcript it writes to
#[must_use]
pub fn recording_speech() -> (SpeechChannel, Transcript) {
    let spoken = Transcript::default();
    let channel = SpeechChannel::new(Box::new(RecordingSpeech {
        spoken: Arc::clone(&spoken),
    }));
    (channel, spoken)
}

/// Snapshot of a transcript
#[must_use]
pub fn said(spoken: &Transcript) -> Vec<String> {
    spoken.lock().unwrap().clone()
}

/// One scripted reply from the fake recognizer
#[derive(Debug, Clone)]
pub enum Step {
    /// No utterance boundary in this frame
    Silence,
    /// The frame closes an utterance with this transcript
    Say(&'static str),
    /// This decode cycle fails transiently
    Fail,
}

/// Recognizer that replies to each frame with the next scripted step
pub struct ScriptedBackend {
    steps: VecDeque<Step>,
    pub resets: Arc<Mutex<usize>>,
}

impl ScriptedBackend {
    #[must_use]
    pub fn new(steps: &[Step]) -> Self {
        Self {
            steps: steps.iter().cloned().collect(),
            resets: Arc::default(),
        }
    }
}

#[async_trait]
impl RecognitionBackend for ScriptedBackend {
    async fn submit_frame(&mut self, _frame: &AudioFrame) -> Result<Recognition> {
        match self.steps.pop_front() {
            Some(Step::Say(text)) => Ok(Recognition::finished(text.to_string())),
            Some(Step::Fail) => Err(Error::BackendTransient("service hiccup".to_string())),
            Some(Step::Silence) | None => Ok(Recognition::none()),
        }
    }

    async fn flush(&mut self) -> Result<Recognition> {
        Ok(Recognition::none())
    }

    fn reset(&mut self) {
        *self.resets.lock().unwrap() += 1;
    }

    fn close(&mut self) {}

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// A frame of silence with the given sequence number
#[must_use]
pub fn frame(sequence: u64) -> AudioFrame {
    AudioFrame {
        sequence,
        captured_at: Instant::now(),
        samples: vec![0; 160],
    }
}

/// Push `count` frames starting at `first`
pub fn push_frames(tx: &FrameSender, first: u64, count: u64) {
    for sequence in first..first + count {
        tx.push(frame(sequence));
    }
}

/// Opener that records requests
#[derive(Default)]
pub struct FakeOpener {
    pub opened: Mutex<Vec<PathBuf>>,
    pub launched: Mutex<Vec<String>>,
    pub fail_open: bool,
    pub fail_launch: bool,
}

#[async_trait]
impl FileOpener for FakeOpener {
    async fn open(&self, path: &Path) -> Result<()> {
        if self.fail_open {
            return Err(Error::Launch("no default application".to_string()));
        }
        self.opened.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    async fn launch(&self, app: &str) -> Result<()> {
        if self.fail_launch {
            return Err(Error::Launch(format!("{app} not installed")));
        }
        self.launched.lock().unwrap().push(app.to_string());
        Ok(())
    }
}

/// Assistant with a canned answer, or a canned failure
pub struct FakeAssistant {
    pub answer: Result<String>,
    pub asked: Mutex<Vec<String>>,
}

impl FakeAssistant {
    #[must_use]
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: Ok(answer.to_string()),
            asked: Mutex::default(),
        }
    }

    #[must_use]
    pub fn offline() -> Self {
        Self {
            answer: Err(Error::RemoteAssistantUnavailable("offline".to_string())),
            asked: Mutex::default(),
        }
    }
}

#[async_trait]
impl RemoteAssistant for FakeAssistant {
    async fn ask(&self, text: &str) -> Result<String> {
        self.asked.lock().unwrap().push(text.to_string());
        match &self.answer {
            Ok(answer) => Ok(answer.clone()),
            Err(e) => Err(Error::RemoteAssistantUnavailable(e.to_string())),
        }
    }
}

/// Tuesday, March 5 2024, 09:07 local time
#[must_use]
pub fn fixed_clock() -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 3, 5, 9, 7, 0).unwrap()
}

/// Dispatcher over `root` with a recording opener and fixed clock
#[must_use]
pub fn dispatcher(
    root: &Path,
    speech: SpeechChannel,
    opener: Arc<FakeOpener>,
    max_read_chars: usize,
) -> CommandDispatcher {
    let locator = FileLocator::new(vec![root.to_path_buf()], 5, None).unwrap();
    CommandDispatcher::new(speech, locator, max_read_chars)
        .with_opener(opener)
        .with_clock(fixed_clock)
}

/// Write a file under `dir`, creating parent directories
pub fn write_file(dir: &Path, relative: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

/// A structurally valid PDF whose page tree is empty
#[must_use]
pub fn zero_page_pdf() -> Vec<u8> {
    use lopdf::{Document, Object, dictionary};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}
