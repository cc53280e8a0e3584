//! OpenRouter chat-completions client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ChatBackend, ChatRequest};
use crate::config::UpstreamConfig;
use crate::{Error, Result};

/// Build the system prompt for a speaker and their current emotion
#[must_use]
pub fn system_prompt(name: &str, emotion: &str) -> String {
    format!(
        "You are MAITRI, an AI assistant for astronauts. The user you are speaking to is named \
         '{name}'. Address them by name when it feels natural. The user is currently expressing \
         a '{emotion}' emotion. Tailor your response to be empathetic and relevant to their \
         emotional state."
    )
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for `POST {base}/chat/completions`
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    referer: String,
    title: String,
}

impl OpenRouterClient {
    /// Create a client from upstream configuration
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        if config.api_key.is_none() {
            tracing::warn!("OPENROUTER_API_KEY not set, upstream calls will be rejected");
        }

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            referer: config.referer.clone(),
            title: config.title.clone(),
        })
    }

    /// Model identifier sent upstream
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatBackend for OpenRouterClient {
    async fn reply(&self, request: &ChatRequest) -> Result<String> {
        let system = system_prompt(&request.name, &request.emotion);
        let body = CompletionRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &system,
                },
                Message {
                    role: "user",
                    content: &request.message,
                },
            ],
        };

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!("{status} - {detail}")));
        }

        let completion: CompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::Upstream("completion had no content".to_string()))
    }
}
