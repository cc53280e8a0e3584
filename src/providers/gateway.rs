//! Client for the MAITRI gateway's `/chat` and `/report` endpoints

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ChatBackend, ChatRequest};
use crate::report::ReportSink;
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct ChatReply {
    reply: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReportBody<'a> {
    report: &'a str,
}

#[derive(Debug, Deserialize)]
struct ReportReply {
    message: Option<String>,
}

/// HTTP client used by the assistant front end
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
}

impl GatewayClient {
    /// Create a client for a gateway base URL (e.g. `http://localhost:3000`)
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl ChatBackend for GatewayClient {
    async fn reply(&self, request: &ChatRequest) -> Result<String> {
        let response = self.client.post(self.url("/chat")).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Gateway(format!("chat returned {status}")));
        }

        let body: ChatReply = response.json().await?;
        body.reply
            .ok_or_else(|| Error::Gateway("chat response had no reply".to_string()))
    }
}

#[async_trait]
impl ReportSink for GatewayClient {
    async fn submit(&self, report: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("/report"))
            .json(&ReportBody { report })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response
            .json::<ReportReply>()
            .await
            .ok()
            .and_then(|body| body.message);

        match message {
            Some(message) => Err(Error::Report(message)),
            None => Err(Error::Gateway(format!("report returned {status}"))),
        }
    }
}
