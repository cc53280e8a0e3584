//! Chat completion backends
//!
//! The gateway talks to OpenRouter directly; the assistant front end talks to
//! the gateway. Both sit behind [`ChatBackend`].

mod gateway;
mod openrouter;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

pub use gateway::GatewayClient;
pub use openrouter::{OpenRouterClient, system_prompt};

use crate::Result;
use crate::config::DEFAULT_IDENTITY;
use crate::session::DialogueContext;

/// One user message with the emotion/identity context it was spoken in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// User message
    #[serde(default, deserialize_with = "message_or_empty")]
    pub message: String,

    /// Detected emotion label (free text on the wire); null or blank means neutral
    #[serde(default = "default_emotion", deserialize_with = "emotion_or_default")]
    pub emotion: String,

    /// Name of the person speaking; null or blank means the default identity
    #[serde(
        default = "default_name",
        deserialize_with = "name_or_default",
        alias = "userName"
    )]
    pub name: String,
}

fn default_emotion() -> String {
    "neutral".to_string()
}

fn default_name() -> String {
    DEFAULT_IDENTITY.to_string()
}

fn non_blank<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.trim().is_empty()))
}

fn message_or_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn emotion_or_default<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(non_blank(deserializer)?.unwrap_or_else(default_emotion))
}

fn name_or_default<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(non_blank(deserializer)?.unwrap_or_else(default_name))
}

impl ChatRequest {
    /// Build a request from a dispatcher context snapshot
    #[must_use]
    pub fn new(message: impl Into<String>, context: &DialogueContext) -> Self {
        Self {
            message: message.into(),
            emotion: context.emotion.as_str().to_string(),
            name: context.user.clone(),
        }
    }
}

/// Something that can answer a chat message
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Get the reply text for a message
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable or answers with a failure
    async fn reply(&self, request: &ChatRequest) -> Result<String>;
}
