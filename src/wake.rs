//! Wake word gate
//!
//! Two states. In `Idle` an utterance must contain the wake word; whatever
//! follows it is the command. A bare wake word moves the gate to
//! `AwaitingCommand`, where the next final utterance is taken as the command
//! verbatim. A deadline on `AwaitingCommand` returns the gate to `Idle`.
//!
//! The gate is plain state with no I/O; the consumer loop owns the single
//! instance and does the speaking and dispatching.

use std::time::Duration;

use tokio::time::Instant;

use crate::voice::Utterance;

/// Spoken when the wake word arrives without a command
pub const ACKNOWLEDGMENT: &str = "Yes?";

/// Characters trimmed from the command after the wake word is removed
const EDGE_PUNCTUATION: &[char] = &[',', '.', '!', '?', ';', ':'];

/// Gate state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeState {
    /// Waiting for the wake word
    Idle,
    /// Wake word heard alone; the next utterance is the command
    AwaitingCommand,
}

/// What the consumer loop should do with an utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateAction {
    /// Not for us
    Ignore,
    /// Speak the acknowledgment and wait for the command
    Acknowledge,
    /// Hand the command to the dispatcher
    Dispatch(String),
}

/// Wake word state machine
#[derive(Debug)]
pub struct WakeGate {
    wake_word: String,
    timeout: Duration,
    state: WakeState,
    deadline: Option<Instant>,
}

impl WakeGate {
    /// Create a gate for `wake_word` with the command-await `timeout`
    #[must_use]
    pub fn new(wake_word: &str, timeout: Duration) -> Self {
        Self {
            wake_word: wake_word.trim().to_lowercase(),
            timeout,
            state: WakeState::Idle,
            deadline: None,
        }
    }

    /// Feed one utterance observed at `now`
    ///
    /// Partial utterances never change state.
    pub fn handle(&mut self, utterance: &Utterance, now: Instant) -> GateAction {
        if !utterance.is_final {
            return GateAction::Ignore;
        }

        // A command that arrives after the window closed is a fresh utterance
        self.expire(now);

        let text = utterance.text.trim().to_lowercase();
        if text.is_empty() {
            return GateAction::Ignore;
        }

        match self.state {
            WakeState::Idle => {
                if !text.contains(&self.wake_word) {
                    tracing::trace!(text = %text, "no wake word");
                    return GateAction::Ignore;
                }

                let remainder = strip_wake_word(&text, &self.wake_word);
                if remainder.is_empty() {
                    self.state = WakeState::AwaitingCommand;
                    self.deadline = Some(now + self.timeout);
                    tracing::info!(timeout_secs = self.timeout.as_secs(), "wake word heard, awaiting command");
                    GateAction::Acknowledge
                } else {
                    tracing::info!(command = %remainder, "wake word with command");
                    GateAction::Dispatch(remainder)
                }
            }
            WakeState::AwaitingCommand => {
                self.reset();
                tracing::info!(command = %text, "command after acknowledgment");
                GateAction::Dispatch(text)
            }
        }
    }

    /// Return to `Idle` if the command window has closed
    ///
    /// Returns `true` when this call expired the window.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                tracing::info!("no command before timeout, back to idle");
                self.reset();
                true
            }
            _ => false,
        }
    }

    /// Restart an open command window from `now`
    ///
    /// Called once the acknowledgment has been spoken, so the window is
    /// measured from when the user was prompted.
    pub fn restart_window(&mut self, now: Instant) {
        if self.state == WakeState::AwaitingCommand {
            self.deadline = Some(now + self.timeout);
        }
    }

    /// When the current command window closes, if one is open
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub const fn state(&self) -> WakeState {
        self.state
    }

    #[must_use]
    pub fn wake_word(&self) -> &str {
        &self.wake_word
    }

    fn reset(&mut self) {
        self.state = WakeState::Idle;
        self.deadline = None;
    }
}

/// Remove every occurrence of the wake word and tidy what is left
#[must_use]
pub fn strip_wake_word(text: &str, wake_word: &str) -> String {
    text.replace(wake_word, " ")
        .split_whitespace()
        .filter(|token| !token.chars().all(|c| EDGE_PUNCTUATION.contains(&c)))
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c.is_whitespace() || EDGE_PUNCTUATION.contains(&c))
        .to_string()
}
