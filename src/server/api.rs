use std::sync::Arc;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::StreamExt;
use log::{error, info, warn};
use serde_json::json;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};

use crate::llm::ChatProvider;
use crate::models::chat::ChatRequest;

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn ChatProvider>,
    /// Shared-secret gate. `None` disables the check entirely. This is an
    /// illustrative mechanism, not an authentication system.
    pub access_password: Option<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Invalid or missing password")]
    Unauthorized,
    #[error("Failed to get response from Gemini")]
    Upstream { details: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::InvalidRequest(_) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": self.to_string() })),
            )
                .into_response(),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": self.to_string() })),
            )
                .into_response(),
            ApiError::Upstream { details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": self.to_string(), "details": details })),
            )
                .into_response(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .layer(cors)
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// Relay one chat turn: validate, split history from the current turn, open
/// the provider stream, and re-stream text deltas as they arrive.
async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    if let Some(expected) = &state.access_password {
        if request.password.as_deref() != Some(expected.as_str()) {
            warn!("Rejected chat request with bad or missing password");
            return Err(ApiError::Unauthorized);
        }
    }

    // The last message is the current prompt; everything before it is history.
    let mut messages = request.messages;
    let turn = messages
        .pop()
        .ok_or_else(|| ApiError::InvalidRequest("No messages provided".to_string()))?;
    let history = messages;

    info!(
        "Chat turn with {} prior messages (image attached: {})",
        history.len(),
        turn.image.is_some()
    );

    let tokens = state
        .provider
        .stream_reply(&history, &turn)
        .await
        .map_err(|e| {
            error!("Provider call failed before streaming: {}", e);
            ApiError::Upstream { details: e.to_string() }
        })?;

    // From here the 200 status is committed; a failing chunk can only be
    // logged and dropped, observable downstream as a truncated stream.
    let body = Body::from_stream(tokens.filter_map(|delta| async move {
        match delta {
            Ok(text) if text.is_empty() => None,
            Ok(text) => Some(Ok::<_, std::convert::Infallible>(Bytes::from(text))),
            Err(e) => {
                error!("Dropping failed stream chunk: {}", e);
                None
            }
        }
    }));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .body(body)
        .map_err(|e| ApiError::Upstream { details: e.to_string() })
}
