//! Shared test utilities
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::http::HeaderMap;
use maitri::voice::{NoIndicator, SpeechEngine};
use maitri::{ChatBackend, ChatRequest, Error, ReportSink, Result};
use tokio::net::TcpListener;

/// Chat backend that records requests and answers from a fixed outcome
pub struct MockChat {
    reply: Option<String>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockChat {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for MockChat {
    async fn reply(&self, request: &ChatRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.reply
            .clone()
            .ok_or_else(|| Error::Upstream("503 Service Unavailable".to_string()))
    }
}

/// Report sink that records reports, optionally failing
#[derive(Default)]
pub struct RecordingSink {
    fail: bool,
    reports: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            reports: Mutex::new(Vec::new()),
        })
    }

    pub fn reports(&self) -> Vec<String> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportSink for RecordingSink {
    async fn submit(&self, report: &str) -> Result<()> {
        if self.fail {
            return Err(Error::Io(std::io::Error::other("disk full")));
        }
        self.reports.lock().unwrap().push(report.to_string());
        Ok(())
    }
}

/// Speech engine that finishes instantly and records what it was asked to say
#[derive(Default)]
pub struct RecordingSpeech {
    spoken: Mutex<Vec<String>>,
}

impl RecordingSpeech {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

impl SpeechEngine for RecordingSpeech {
    fn speak(&self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn cancel(&self) {}

    fn is_speaking(&self) -> bool {
        false
    }
}

pub fn no_indicator() -> Arc<NoIndicator> {
    Arc::new(NoIndicator)
}

/// Serve a router on an ephemeral local port and return its base URL
pub async fn spawn_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// A request captured by [`fake_upstream`]
#[derive(Debug, Clone)]
pub struct Captured {
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

/// Chat-completions server answering every request with `status` and `body`
pub async fn fake_upstream(
    status: axum::http::StatusCode,
    body: serde_json::Value,
) -> (String, Arc<Mutex<Vec<Captured>>>) {
    use axum::extract::State;
    use axum::routing::post;

    type Shared = (Arc<Mutex<Vec<Captured>>>, axum::http::StatusCode, serde_json::Value);

    async fn completions(
        State((captured, status, body)): State<Shared>,
        headers: HeaderMap,
        axum::Json(request): axum::Json<serde_json::Value>,
    ) -> (axum::http::StatusCode, axum::Json<serde_json::Value>) {
        captured.lock().unwrap().push(Captured {
            headers,
            body: request,
        });
        (status, axum::Json(body))
    }

    let captured = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new()
        .route("/chat/completions", post(completions))
        .with_state((captured.clone(), status, body));

    (spawn_server(router).await, captured)
}
