//! `POST /chat`: emotion-aware chat completion

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::providers::ChatRequest;

/// Returned instead of upstream error details
pub const UPSTREAM_APOLOGY: &str =
    "I'm sorry, I had an issue connecting to the OpenRouter service.";

/// Body of every `/chat` response
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

/// Build chat router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new().route("/chat", post(chat)).with_state(state)
}

async fn chat(State(state): State<Arc<ApiState>>, Json(request): Json<ChatRequest>) -> Response {
    tracing::debug!(
        emotion = %request.emotion,
        name = %request.name,
        chars = request.message.len(),
        "chat request"
    );

    match state.chat.reply(&request).await {
        Ok(reply) => Json(ChatResponse { reply }).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "error calling OpenRouter API");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ChatResponse {
                    reply: UPSTREAM_APOLOGY.to_string(),
                }),
            )
                .into_response()
        }
    }
}
