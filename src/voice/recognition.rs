//! Speech recognition subscription and restart policy
//!
//! A recognizer hands out a subscription (an event channel). The channel
//! closing means the recognition session ended. [`RecognitionSupervisor`]
//! restarts ended sessions unless a network failure was reported during the
//! session, in which case it stays stopped until [`RecognitionSupervisor::force_restart`].

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::TranscriptSegment;
use crate::Result;

/// Events produced by one recognition session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Session is live and listening
    Started,
    /// Transcript update (interim or final)
    Segment(TranscriptSegment),
    /// Recognition error; the session usually ends right after
    Error(RecognitionError),
}

/// Recognition failure classes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    /// Recognition service unreachable
    Network,
    /// No speech before the silence timeout
    NoSpeech,
    /// Session aborted by the engine
    Aborted,
    /// Microphone permission denied
    NotAllowed,
    /// Anything else the engine reports
    Other(String),
}

impl RecognitionError {
    /// Network-class failures halt automatic restarts
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network)
    }
}

impl fmt::Display for RecognitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => f.write_str("network"),
            Self::NoSpeech => f.write_str("no-speech"),
            Self::Aborted => f.write_str("aborted"),
            Self::NotAllowed => f.write_str("not-allowed"),
            Self::Other(reason) => f.write_str(reason),
        }
    }
}

/// Speech-to-text capability producing a live transcript
pub trait SpeechRecognizer: Send + Sync {
    /// Begin a recognition session
    ///
    /// Dropping the receiver cancels the session.
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot be started
    fn listen(&self) -> Result<mpsc::Receiver<RecognitionEvent>>;
}

/// What the supervisor observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// A session went live
    Started,
    /// Transcript update
    Segment(TranscriptSegment),
    /// The engine reported an error
    Failed(RecognitionError),
    /// The session ended; `restarted` tells whether a new one was opened
    Ended { restarted: bool },
}

/// Owns the recognition subscription and applies the restart policy
pub struct RecognitionSupervisor {
    recognizer: Arc<dyn SpeechRecognizer>,
    events: Option<mpsc::Receiver<RecognitionEvent>>,
    network_failed: bool,
    sessions: u64,
}

impl RecognitionSupervisor {
    #[must_use]
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        Self {
            recognizer,
            events: None,
            network_failed: false,
            sessions: 0,
        }
    }

    /// Open the first session
    ///
    /// # Errors
    ///
    /// Returns error if the recognizer refuses to start
    pub fn start(&mut self) -> Result<()> {
        if self.events.is_some() {
            return Ok(());
        }
        self.subscribe()
    }

    /// Whether a session is open
    #[must_use]
    pub const fn is_listening(&self) -> bool {
        self.events.is_some()
    }

    /// Whether automatic restarts are halted by a network failure
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.events.is_none() && self.network_failed
    }

    /// Number of sessions opened so far
    #[must_use]
    pub const fn sessions(&self) -> u64 {
        self.sessions
    }

    /// Restart after a manual request
    ///
    /// Returns `true` if a new session was opened, `false` if one was already
    /// running or the recognizer refused.
    pub fn force_restart(&mut self) -> bool {
        if self.events.is_some() {
            tracing::debug!("recognition already running");
            return false;
        }
        self.network_failed = false;
        match self.subscribe() {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "failed to restart recognition");
                false
            }
        }
    }

    /// Wait for the next event
    ///
    /// Never resolves while stopped. Cancel-safe.
    pub async fn next_event(&mut self) -> SupervisorEvent {
        let Some(events) = self.events.as_mut() else {
            return std::future::pending().await;
        };

        match events.recv().await {
            Some(RecognitionEvent::Started) => {
                tracing::info!("voice recognition started, listening for wake word");
                self.network_failed = false;
                SupervisorEvent::Started
            }
            Some(RecognitionEvent::Segment(segment)) => SupervisorEvent::Segment(segment),
            Some(RecognitionEvent::Error(error)) => {
                tracing::warn!(%error, "speech recognition error");
                if error.is_network() {
                    self.network_failed = true;
                }
                SupervisorEvent::Failed(error)
            }
            None => {
                self.events = None;
                tracing::info!("voice recognition stopped");
                if self.network_failed {
                    tracing::warn!("not restarting after network error, use the mic control to retry");
                    return SupervisorEvent::Ended { restarted: false };
                }
                match self.subscribe() {
                    Ok(()) => SupervisorEvent::Ended { restarted: true },
                    Err(e) => {
                        tracing::error!(error = %e, "failed to restart recognition");
                        SupervisorEvent::Ended { restarted: false }
                    }
                }
            }
        }
    }

    /// Cancel the open session without restarting
    pub fn stop(&mut self) {
        self.events = None;
    }

    fn subscribe(&mut self) -> Result<()> {
        let events = self.recognizer.listen()?;
        self.sessions += 1;
        tracing::debug!(session = self.sessions, "recognition session opened");
        self.events = Some(events);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Hands out pre-scripted sessions, one per `listen` call
    struct Scripted {
        sessions: Mutex<Vec<Vec<RecognitionEvent>>>,
    }

    impl SpeechRecognizer for Scripted {
        fn listen(&self) -> Result<mpsc::Receiver<RecognitionEvent>> {
            let script = {
                let mut sessions = self.sessions.lock().unwrap();
                if sessions.is_empty() {
                    Vec::new()
                } else {
                    sessions.remove(0)
                }
            };
            let (tx, rx) = mpsc::channel(script.len().max(1));
            for event in script {
                tx.try_send(event).unwrap();
            }
            Ok(rx)
        }
    }

    fn supervisor(sessions: Vec<Vec<RecognitionEvent>>) -> RecognitionSupervisor {
        RecognitionSupervisor::new(Arc::new(Scripted {
            sessions: Mutex::new(sessions),
        }))
    }

    #[tokio::test]
    async fn restarts_after_plain_termination() {
        let mut sup = supervisor(vec![vec![RecognitionEvent::Started], vec![RecognitionEvent::Started]]);
        sup.start().unwrap();

        assert_eq!(sup.next_event().await, SupervisorEvent::Started);
        assert_eq!(sup.next_event().await, SupervisorEvent::Ended { restarted: true });
        assert!(sup.is_listening());
        assert_eq!(sup.sessions(), 2);
    }

    #[tokio::test]
    async fn network_failure_halts_restarts() {
        let mut sup = supervisor(vec![
            vec![RecognitionEvent::Started, RecognitionEvent::Error(RecognitionError::Network)],
            vec![RecognitionEvent::Started],
        ]);
        sup.start().unwrap();

        assert_eq!(sup.next_event().await, SupervisorEvent::Started);
        assert_eq!(
            sup.next_event().await,
            SupervisorEvent::Failed(RecognitionError::Network)
        );
        assert_eq!(sup.next_event().await, SupervisorEvent::Ended { restarted: false });
        assert!(sup.is_halted());

        // Halted supervisor never yields
        let idle = tokio::time::timeout(std::time::Duration::from_millis(20), sup.next_event()).await;
        assert!(idle.is_err());

        assert!(sup.force_restart());
        assert!(!sup.is_halted());
        assert_eq!(sup.next_event().await, SupervisorEvent::Started);
        assert!(!sup.force_restart());
    }

    #[tokio::test]
    async fn non_network_errors_still_restart() {
        let mut sup = supervisor(vec![
            vec![RecognitionEvent::Error(RecognitionError::NoSpeech)],
            vec![],
        ]);
        sup.start().unwrap();

        assert!(matches!(sup.next_event().await, SupervisorEvent::Failed(_)));
        assert_eq!(sup.next_event().await, SupervisorEvent::Ended { restarted: true });
    }
}
