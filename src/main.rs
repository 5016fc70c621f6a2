use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jarvis_voice::config::Overrides;
use jarvis_voice::dispatch::CommandDispatcher;
use jarvis_voice::locator::FileLocator;
use jarvis_voice::voice::endpoint::rms_energy;
use jarvis_voice::voice::speech::ConsoleSpeech;
use jarvis_voice::voice::{
    AudioIngestor, FrameMessage, SpeechChannel, create_renderer, frame_queue, list_input_devices,
};
use jarvis_voice::{Config, Daemon};

/// Jarvis - always-listening voice command agent
#[derive(Parser)]
#[command(name = "jarvis", version, about)]
struct Cli {
    /// Wake word that must precede every command
    #[arg(short, long)]
    wake_word: Option<String>,

    /// Recognition backend (cloud-whisper, cloud-deepgram, local-whisper)
    #[arg(short, long)]
    backend: Option<String>,

    /// Speech output (openai, elevenlabs, system, console)
    #[arg(short, long)]
    speech: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show microphone levels
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// List audio input devices
    Devices,
    /// Speak text through the configured output
    Say {
        /// Text to speak
        #[arg(default_value = "Hello. This is a test of the speech output.")]
        text: String,
    },
    /// Search the configured roots for a file name
    Search {
        /// Case-insensitive file name fragment
        query: String,
    },
    /// Run one command as if it followed the wake word
    #[command(name = "command")]
    Run {
        /// Command text, e.g. "what time is it"
        text: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,jarvis_voice=info",
        1 => "info,jarvis_voice=debug",
        2 => "debug",
        _ => "trace",
    };

    // RUST_LOG wins over -v when set
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let overrides = Overrides {
        wake_word: cli.wake_word,
        backend: cli.backend,
        speech: cli.speech,
    };
    let config = Config::load(&overrides)?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(&config, duration).await,
            Command::Devices => {
                list_devices();
                Ok(())
            }
            Command::Say { text } => {
                speech_channel(&config).speak(&text).await?;
                Ok(())
            }
            Command::Search { query } => search(&config, &query),
            Command::Run { text } => run_once(&config, &text.join(" ")).await,
        };
    }

    tracing::info!(
        wake_word = %config.wake_word,
        backend = %config.recognition.backend,
        roots = ?config.search.roots,
        "starting jarvis"
    );

    let speech = speech_channel(&config);
    Daemon::new(config, speech).run().await?;
    Ok(())
}

/// Configured speech output, or console output if it is unavailable
fn speech_channel(config: &Config) -> SpeechChannel {
    let renderer = create_renderer(config).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "speech output unavailable, printing responses only");
        Box::new(ConsoleSpeech)
    });
    SpeechChannel::new(renderer)
}

/// Print a level meter for the configured input device
#[allow(clippy::future_not_send)]
async fn test_mic(config: &Config, duration: u64) -> anyhow::Result<()> {
    let (tx, mut rx) = frame_queue(config.audio.queue_capacity);
    let (mut ingestor, _errors) = AudioIngestor::start(&config.audio, tx.clone())?;

    println!("Testing {} for {duration} seconds...", ingestor.device_name());
    println!("Speak into your microphone!\n");

    let sample_rate = config.audio.sample_rate;
    let window = usize::try_from(sample_rate).unwrap_or(usize::MAX);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(duration);
    let mut second = Vec::with_capacity(window);
    let mut elapsed = 0;

    while let Ok(message) = tokio::time::timeout_at(deadline, rx.recv()).await {
        let FrameMessage::Frame(frame) = message else {
            break;
        };
        second.extend_from_slice(&frame.samples);
        if second.len() < window {
            continue;
        }

        elapsed += 1;
        let energy = rms_energy(&second);
        let peak = second.iter().copied().map(i16::unsigned_abs).max().unwrap_or(0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{elapsed:2}s] RMS: {energy:.4} | Peak: {peak:5} | [{meter}]");
        second.clear();
    }

    ingestor.release();
    println!("---");
    println!("Dropped frames: {}", tx.dropped());
    Ok(())
}

fn list_devices() {
    let devices = list_input_devices();
    if devices.is_empty() {
        println!("No input devices found");
        return;
    }
    for name in devices {
        println!("{name}");
    }
}

fn search(config: &Config, query: &str) -> anyhow::Result<()> {
    let locator = FileLocator::new(
        config.search.roots.clone(),
        config.search.max_results,
        config.search.max_depth,
    )?;
    let results = locator.search(query, locator.max_results());
    if results.is_empty() {
        println!("No matches for {query:?}");
    }
    for path in results {
        println!("{}", path.display());
    }
    Ok(())
}

async fn run_once(config: &Config, text: &str) -> anyhow::Result<()> {
    let speech = speech_channel(config);
    let dispatcher = CommandDispatcher::from_config(config, speech)?;
    dispatcher.dispatch(text).await;
    Ok(())
}
