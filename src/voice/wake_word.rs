//! Wake word session control
//!
//! Watches the recognizer's transcript for the activation phrase. Once armed,
//! the next finalized segment is taken as a command.

use crate::session::SessionState;
use crate::{Error, Result};

/// A transcript update from the recognizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptSegment {
    /// Everything recognized so far in the current recognition session
    pub transcript: String,
    /// The recognizer will not revise this segment further
    pub is_final: bool,
}

impl TranscriptSegment {
    #[must_use]
    pub fn interim(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: false,
        }
    }

    #[must_use]
    pub fn finalized(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: true,
        }
    }
}

/// State of the wake word controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Waiting for the activation phrase
    Idle,
    /// Activation phrase heard, waiting for a finalized command
    Armed,
}

/// What the session should do after a transcript update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WakeAction {
    /// Controller armed; greet the user with this text
    Armed { greeting: String },
    /// Command captured; dispatch it as a user utterance
    Command(String),
    /// Armed session ended without a command
    Dismissed,
}

/// Detects the activation phrase and routes the following utterance
#[derive(Debug, Clone)]
pub struct WakeWordController {
    wake_phrase: String,
}

impl WakeWordController {
    /// Create a controller for an activation phrase (e.g. "hey maitri")
    ///
    /// # Errors
    ///
    /// Returns error if the phrase is empty
    pub fn new(wake_phrase: &str) -> Result<Self> {
        let normalized = wake_phrase.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(Error::Config("wake phrase cannot be empty".to_string()));
        }

        tracing::debug!(wake_phrase = %normalized, "wake word controller initialized");

        Ok(Self {
            wake_phrase: normalized,
        })
    }

    /// Get the configured activation phrase
    #[must_use]
    pub fn wake_phrase(&self) -> &str {
        &self.wake_phrase
    }

    /// Current state as recorded in the session
    #[must_use]
    pub const fn state(state: &SessionState) -> ControllerState {
        if state.awaiting_command {
            ControllerState::Armed
        } else {
            ControllerState::Idle
        }
    }

    /// Check if a transcript contains the activation phrase (case-insensitive)
    #[must_use]
    pub fn contains_wake_phrase(&self, transcript: &str) -> bool {
        transcript.to_lowercase().contains(&self.wake_phrase)
    }

    /// Extract the command: text after the last activation phrase, lowercased and trimmed
    ///
    /// Without an activation phrase the whole transcript is the command.
    #[must_use]
    pub fn extract_command(&self, transcript: &str) -> String {
        let lower = transcript.to_lowercase();
        lower
            .rsplit(self.wake_phrase.as_str())
            .next()
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    /// Process one transcript update
    pub fn on_segment(
        &self,
        state: &mut SessionState,
        segment: &TranscriptSegment,
    ) -> Option<WakeAction> {
        match Self::state(state) {
            ControllerState::Idle => {
                if self.contains_wake_phrase(&segment.transcript) {
                    tracing::info!(transcript = %segment.transcript, "wake word detected");
                    Some(Self::arm(state))
                } else {
                    None
                }
            }
            ControllerState::Armed if segment.is_final => {
                state.awaiting_command = false;
                let command = self.extract_command(&segment.transcript);
                if command.is_empty() {
                    tracing::debug!("armed session ended without a command");
                    Some(WakeAction::Dismissed)
                } else {
                    tracing::info!(command = %command, "command received");
                    Some(WakeAction::Command(command))
                }
            }
            ControllerState::Armed => None,
        }
    }

    /// Manually activate (skip the activation phrase), as the mic control does
    ///
    /// Returns `None` if already armed.
    pub fn activate(state: &mut SessionState) -> Option<WakeAction> {
        match Self::state(state) {
            ControllerState::Idle => Some(Self::arm(state)),
            ControllerState::Armed => None,
        }
    }

    /// Reset to idle without producing a command
    pub const fn reset(state: &mut SessionState) {
        state.awaiting_command = false;
    }

    fn arm(state: &mut SessionState) -> WakeAction {
        state.awaiting_command = true;
        WakeAction::Armed {
            greeting: greeting_for(&state.identified_user),
        }
    }
}

/// Greeting spoken when the assistant is armed
#[must_use]
pub fn greeting_for(user: &str) -> String {
    format!("Hey {user}, how can I assist you today?")
}
