//! `POST /report`: accept a free-text crew report

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};

use super::ApiState;

#[derive(Debug, Deserialize)]
struct ReportRequest {
    #[serde(default)]
    report: Option<String>,
}

/// Body of every `/report` response
#[derive(Debug, Serialize, Deserialize)]
pub struct ReportResponse {
    pub message: String,
}

/// Outcome of a report submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Received,
    Empty,
    Failed,
}

impl ReportOutcome {
    const fn status(self) -> StatusCode {
        match self {
            Self::Received => StatusCode::OK,
            Self::Empty => StatusCode::BAD_REQUEST,
            Self::Failed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Received => "Report received successfully!",
            Self::Empty => "Report content cannot be empty.",
            Self::Failed => "Failed to save the report on the server.",
        }
    }
}

impl IntoResponse for ReportOutcome {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(ReportResponse {
                message: self.message().to_string(),
            }),
        )
            .into_response()
    }
}

/// Build report router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/report", post(report))
        .with_state(state)
}

async fn report(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<ReportRequest>, JsonRejection>,
) -> ReportOutcome {
    // A missing or unreadable body carries no report
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "unreadable report body");
            return ReportOutcome::Empty;
        }
    };

    let Some(report) = request.report.filter(|r| !r.trim().is_empty()) else {
        return ReportOutcome::Empty;
    };

    match state.reports.submit(&report).await {
        Ok(()) => ReportOutcome::Received,
        Err(e) => {
            tracing::error!(error = %e, "failed to record report");
            ReportOutcome::Failed
        }
    }
}
