//! Routes user utterances to the chat backend

use std::sync::Arc;

use crate::providers::{ChatBackend, ChatRequest};
use crate::session::{DialogueContext, Transcript, Utterance};
use crate::voice::SpeechCoordinator;

/// Spoken when the backend cannot be reached
pub const FALLBACK_REPLY: &str = "I'm having trouble connecting to my systems right now.";

/// Sends a message with its context and presents the reply
#[derive(Clone)]
pub struct Dispatcher {
    backend: Arc<dyn ChatBackend>,
    transcript: Transcript,
    speech: SpeechCoordinator,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        transcript: Transcript,
        speech: SpeechCoordinator,
    ) -> Self {
        Self {
            backend,
            transcript,
            speech,
        }
    }

    /// Dispatch one user utterance and return the reply that was presented
    ///
    /// The user utterance and the reply are appended to the transcript, then
    /// the reply is spoken. Backend failures are logged and replaced by
    /// [`FALLBACK_REPLY`].
    pub async fn dispatch(&self, context: &DialogueContext, text: &str) -> String {
        self.transcript.push(Utterance::user(text));

        let request = ChatRequest::new(text, context);
        let reply = match self.backend.reply(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, "chat request failed");
                FALLBACK_REPLY.to_string()
            }
        };

        self.transcript.push(Utterance::assistant(reply.clone()));

        if let Err(e) = self.speech.speak(&reply, None) {
            tracing::warn!(error = %e, "failed to speak reply");
        }

        reply
    }
}
