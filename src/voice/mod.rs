//! Voice session
//!
//! Handles wake word detection, recognition supervision, and speech playback.
//! Recognition and synthesis engines are external capabilities behind traits.

mod playback;
mod recognition;
mod wake_word;

pub use playback::{Completion, NoIndicator, PlaybackIndicator, SpeechCoordinator, SpeechEngine};
pub use recognition::{
    RecognitionError, RecognitionEvent, RecognitionSupervisor, SpeechRecognizer, SupervisorEvent,
};
pub use wake_word::{ControllerState, TranscriptSegment, WakeAction, WakeWordController, greeting_for};
