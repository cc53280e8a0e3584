//! Session state shared by the assistant components
//!
//! `SessionState` is owned by the assistant loop and handed to trackers and the
//! wake-word controller by `&mut` reference. The dialogue dispatcher only ever
//! sees a [`DialogueContext`] snapshot.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config::DEFAULT_IDENTITY;

/// Expression categories reported by the face capability
///
/// Declaration order is the tie-breaking order for primary emotion selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    #[default]
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
}

impl EmotionLabel {
    /// All labels in tie-breaking order
    pub const ALL: [Self; 7] = [
        Self::Neutral,
        Self::Happy,
        Self::Sad,
        Self::Angry,
        Self::Fearful,
        Self::Disgusted,
        Self::Surprised,
    ];

    /// Wire name (`"neutral"`, `"happy"`, ...)
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Fearful => "fearful",
            Self::Disgusted => "disgusted",
            Self::Surprised => "surprised",
        }
    }

    /// Capitalized name for display
    #[must_use]
    pub fn display_name(self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        chars.next().map_or_else(String::new, |first| {
            first.to_uppercase().chain(chars).collect()
        })
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionLabel {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|label| label.as_str() == lower)
            .ok_or_else(|| crate::Error::Vision(format!("unknown emotion: {s}")))
    }
}

/// Mutable state of one assistant session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// Primary emotion from the most recent sample
    pub active_emotion: EmotionLabel,
    /// Confidence of `active_emotion` in `[0, 1]`
    pub active_confidence: f32,
    /// Name of the recognized user, or the default identity
    pub identified_user: String,
    /// Whether a recognition subscription is live
    pub mic_active: bool,
    /// Armed: the next finalized utterance is a command
    pub awaiting_command: bool,
    /// Whether the last sample contained a face
    pub face_present: bool,
    /// Persistent notice about camera/model failures
    pub notice: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(DEFAULT_IDENTITY)
    }
}

impl SessionState {
    /// Create an idle session with the given default identity
    #[must_use]
    pub fn new(default_identity: &str) -> Self {
        Self {
            active_emotion: EmotionLabel::Neutral,
            active_confidence: 0.0,
            identified_user: default_identity.to_string(),
            mic_active: false,
            awaiting_command: false,
            face_present: false,
            notice: None,
        }
    }

    /// Snapshot the fields the dialogue dispatcher needs
    #[must_use]
    pub fn dialogue_context(&self) -> DialogueContext {
        DialogueContext {
            emotion: self.active_emotion,
            user: self.identified_user.clone(),
        }
    }

    /// Status panel view of the trackers
    #[must_use]
    pub fn tracker_status(&self) -> TrackerStatus {
        if self.face_present {
            TrackerStatus {
                physical_state: "Active",
                emotion: self.active_emotion.display_name(),
                confidence_percent: confidence_percent(self.active_confidence),
            }
        } else {
            TrackerStatus {
                physical_state: "Inactive",
                emotion: "Unknown".to_string(),
                confidence_percent: 0,
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn confidence_percent(confidence: f32) -> u8 {
    (confidence.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Emotion/identity snapshot sent along with a user utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueContext {
    pub emotion: EmotionLabel,
    pub user: String,
}

/// Display form of the tracker fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerStatus {
    pub physical_state: &'static str,
    pub emotion: String,
    pub confidence_percent: u8,
}

impl fmt::Display for TrackerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Emotion: {} | Confidence: {}% | Physical State: {}",
            self.emotion, self.confidence_percent, self.physical_state
        )
    }
}

/// Who produced an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// One chat turn as displayed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    pub sender: Sender,
    pub at: DateTime<Utc>,
}

impl Utterance {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
            at: Utc::now(),
        }
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Assistant,
            at: Utc::now(),
        }
    }
}

/// Append-only ordered transcript
///
/// Cloning yields another handle to the same transcript. Renderers subscribe to
/// receive each utterance as it is appended.
#[derive(Clone)]
pub struct Transcript {
    entries: Arc<Mutex<Vec<Utterance>>>,
    updates: broadcast::Sender<Utterance>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(64);
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            updates,
        }
    }

    /// Append an utterance and notify subscribers
    pub fn push(&self, utterance: Utterance) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(utterance.clone());
        // No subscribers is fine
        let _ = self.updates.send(utterance);
    }

    /// Copy of all utterances so far, oldest first
    #[must_use]
    pub fn entries(&self) -> Vec<Utterance> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receive utterances appended from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Utterance> {
        self.updates.subscribe()
    }
}
