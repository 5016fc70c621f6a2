//! Agent process wiring
//!
//! The capture stream lives on the calling task (cpal streams are not
//! `Send`); recognition, the wake gate and dispatch run on one spawned
//! consumer task. Teardown always runs in the same order: stop capture,
//! queue end of stream, let the consumer drain, release the microphone.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;

use crate::config::Config;
use crate::dispatch::{CommandDispatcher, DispatchOutcome, FAREWELL};
use crate::voice::{
    AssemblyEvent, AudioIngestor, CaptureControl, FrameSender, SpeechChannel, UtteranceAssembler,
    create_backend, frame_queue,
};
use crate::wake::{ACKNOWLEDGMENT, GateAction, WakeGate};
use crate::{Error, Result};

/// Spoken once when the microphone fails
pub const DEVICE_ERROR_NOTICE: &str = "Audio input error. Check microphone and permissions.";

/// What the consumer did before it exited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    /// Commands handed to the dispatcher
    pub dispatched: usize,
    /// Bare wake words acknowledged
    pub acknowledged: usize,
    /// Command windows that closed with no command
    pub timeouts: usize,
    /// A shutdown command was dispatched
    pub shutdown_requested: bool,
}

/// Handle to the spawned consumer task
pub type ConsumerHandle = JoinHandle<Result<ConsumerReport>>;

/// What joining the consumer task produced
pub type ConsumerJoin = std::result::Result<Result<ConsumerReport>, JoinError>;

/// Why the main task began teardown
#[derive(Debug)]
pub enum StopReason {
    /// The dispatcher handled a shutdown command
    ShutdownCommand,
    /// Ctrl-C
    Signal,
    /// The microphone failed mid-stream
    Device(Error),
    /// The consumer returned on its own
    ConsumerExited,
}

impl StopReason {
    /// Line spoken once the microphone is released
    ///
    /// A shutdown command already said goodbye through the dispatcher.
    #[must_use]
    pub const fn closing_line(&self) -> Option<&'static str> {
        match self {
            Self::Signal => Some(FAREWELL),
            Self::Device(_) => Some(DEVICE_ERROR_NOTICE),
            Self::ShutdownCommand | Self::ConsumerExited => None,
        }
    }
}

/// The voice agent
pub struct Daemon {
    config: Config,
    speech: SpeechChannel,
}

impl Daemon {
    /// Create an agent that speaks through `speech`
    #[must_use]
    pub const fn new(config: Config, speech: SpeechChannel) -> Self {
        Self { config, speech }
    }

    /// Run until a shutdown command, Ctrl-C, or a fatal error
    ///
    /// # Errors
    ///
    /// Returns `Error::AudioDevice` or `Error::BackendInit` on fatal failures,
    /// and `Error::Pipeline` if the consumer task panicked
    #[allow(clippy::future_not_send)]
    pub async fn run(self) -> Result<()> {
        let config = &self.config;

        let backend = create_backend(config)?;
        let dispatcher = CommandDispatcher::from_config(config, self.speech.clone())?;
        let gate = WakeGate::new(&config.wake_word, config.command_timeout);

        // Announce before the microphone opens so the agent does not hear itself
        self.speech.say(&startup_announcement(&config.wake_word)).await;

        let (frames_tx, frames_rx) = frame_queue(config.audio.queue_capacity);
        let (mut ingestor, mut device_errors) =
            match AudioIngestor::start(&config.audio, frames_tx.clone()) {
                Ok(started) => started,
                Err(e) => {
                    tracing::error!(error = %e, "failed to open microphone");
                    self.speech.say(DEVICE_ERROR_NOTICE).await;
                    return Err(e);
                }
            };

        let assembler = UtteranceAssembler::new(frames_rx, backend);
        let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel();
        let mut consumer: ConsumerHandle = tokio::spawn(run_consumer(
            assembler,
            gate,
            dispatcher,
            self.speech.clone(),
            shutdown_tx,
        ));

        tracing::info!(
            wake_word = %config.wake_word,
            device = ingestor.device_name(),
            "listening"
        );

        let (reason, finished) = tokio::select! {
            Some(()) = shutdown_rx.recv() => (StopReason::ShutdownCommand, None),
            Some(err) = device_errors.recv() => (StopReason::Device(err), None),
            _ = tokio::signal::ctrl_c() => (StopReason::Signal, None),
            result = &mut consumer => (StopReason::ConsumerExited, Some(result)),
        };
        tracing::info!(reason = ?reason, "stopping");

        let outcome = teardown(
            &mut ingestor,
            frames_tx,
            consumer,
            finished,
            config.shutdown_grace,
        )
        .await;

        if let Some(line) = reason.closing_line() {
            self.speech.say(line).await;
        }
        if let StopReason::Device(err) = reason {
            return Err(err);
        }

        if let Some(report) = outcome? {
            tracing::info!(
                dispatched = report.dispatched,
                acknowledged = report.acknowledged,
                timeouts = report.timeouts,
                "agent stopped"
            );
        }
        Ok(())
    }
}

/// Ordered shutdown of a running pipeline
///
/// Stops `capture`, queues end of stream and gives the consumer `grace` to
/// drain before aborting it, then releases the device. Pass the consumer's
/// result as `finished` when it has already been joined. The device is
/// released on every path.
///
/// Returns `Ok(None)` when the consumer had to be aborted.
///
/// # Errors
///
/// Returns the consumer's own error, or `Error::Pipeline` if it panicked
#[allow(clippy::future_not_send)]
pub async fn teardown<C: CaptureControl>(
    capture: &mut C,
    frames: FrameSender,
    mut consumer: ConsumerHandle,
    finished: Option<ConsumerJoin>,
    grace: Duration,
) -> Result<Option<ConsumerReport>> {
    capture.stop();

    let mut joined = finished;
    if joined.is_none() {
        if let Err(e) = frames.end_of_stream(grace).await {
            tracing::warn!(error = %e, "could not queue end of stream");
        }
        match tokio::time::timeout(grace, &mut consumer).await {
            Ok(result) => joined = Some(result),
            Err(_) => {
                tracing::warn!(
                    grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
                    "consumer did not drain in time, aborting"
                );
                consumer.abort();
            }
        }
    }
    drop(frames);
    capture.release();

    match joined {
        None => Ok(None),
        Some(Ok(Ok(report))) => Ok(Some(report)),
        Some(Ok(Err(e))) => {
            tracing::error!(error = %e, "consumer failed");
            Err(e)
        }
        Some(Err(e)) => {
            tracing::error!(error = %e, "consumer task panicked");
            Err(Error::Pipeline(e.to_string()))
        }
    }
}

/// Consume utterances until end of stream
///
/// Runs the wake gate and dispatches commands one at a time. After a
/// shutdown command it signals `shutdown` once and keeps draining the
/// queue without dispatching anything further.
///
/// # Errors
///
/// Returns a fatal recognition error
pub async fn run_consumer(
    mut assembler: UtteranceAssembler,
    mut gate: WakeGate,
    dispatcher: CommandDispatcher,
    speech: SpeechChannel,
    shutdown: mpsc::UnboundedSender<()>,
) -> Result<ConsumerReport> {
    let mut report = ConsumerReport::default();

    loop {
        let deadline = if report.shutdown_requested {
            None
        } else {
            gate.deadline()
        };

        let Some(event) = assembler.next_event(deadline).await? else {
            break;
        };

        let utterance = match event {
            AssemblyEvent::DeadlineElapsed => {
                if gate.expire(Instant::now()) {
                    report.timeouts += 1;
                }
                continue;
            }
            AssemblyEvent::Utterance(utterance) => utterance,
        };

        if report.shutdown_requested {
            tracing::debug!(text = %utterance.text, "draining after shutdown");
            continue;
        }

        match gate.handle(&utterance, Instant::now()) {
            GateAction::Ignore => {}
            GateAction::Acknowledge => {
                report.acknowledged += 1;
                speech.say(ACKNOWLEDGMENT).await;
                gate.restart_window(Instant::now());
            }
            GateAction::Dispatch(command) => {
                report.dispatched += 1;
                if dispatcher.dispatch(&command).await == DispatchOutcome::Shutdown {
                    report.shutdown_requested = true;
                    let _ = shutdown.send(());
                }
            }
        }
    }

    tracing::debug!(
        frames = assembler.frames_seen(),
        transient_failures = assembler.transient_failures(),
        "consumer finished"
    );
    Ok(report)
}

/// The line spoken once the agent is ready
#[must_use]
pub fn startup_announcement(wake_word: &str) -> String {
    let mut chars = wake_word.chars();
    let display = chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect::<String>()
    });
    format!("J.A.R.V.I.S. is ready and listening. Say '{display}' before commands.")
}
