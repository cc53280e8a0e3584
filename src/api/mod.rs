//! HTTP API server for the MAITRI gateway

pub mod chat;
pub mod health;
pub mod rate_limit;
pub mod report;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::providers::ChatBackend;
use crate::report::{ReportSink, TracingReportLog};

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Completion backend answering `/chat`
    pub chat: Arc<dyn ChatBackend>,
    /// Destination for `/report`
    pub reports: Arc<dyn ReportSink>,
    pub rate_limiter: Option<rate_limit::SharedLimiter>,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    chat: Arc<dyn ChatBackend>,
    reports: Arc<dyn ReportSink>,
    port: u16,
    rate_limit_rpm: Option<u32>,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(chat: Arc<dyn ChatBackend>, port: u16) -> Self {
        Self {
            chat,
            reports: Arc::new(TracingReportLog),
            port,
            rate_limit_rpm: None,
        }
    }

    /// Set the report sink (defaults to the log)
    #[must_use]
    pub fn reports(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.reports = sink;
        self
    }

    /// Enable global rate limiting
    #[must_use]
    pub const fn rate_limit(mut self, requests_per_minute: Option<u32>) -> Self {
        self.rate_limit_rpm = requests_per_minute;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let rate_limiter = self.rate_limit_rpm.map(rate_limit::create_limiter);

        let state = Arc::new(ApiState {
            chat: self.chat,
            reports: self.reports,
            rate_limiter,
        });

        ApiServer {
            state,
            port: self.port,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let router = Router::new()
            .merge(chat::router(self.state.clone()))
            .merge(report::router(self.state.clone()))
            .merge(health::router());

        // Rate limiting (only when configured)
        let router = router.layer(axum::middleware::from_fn_with_state(
            self.state.clone(),
            rate_limit::rate_limit_middleware,
        ));

        // CORS layer for cross-origin requests from the front end
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        if self.state.rate_limiter.is_some() {
            tracing::info!("rate limiting active");
        }

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "MAITRI server running on http://localhost:{}", self.port);

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
