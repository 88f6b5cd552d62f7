use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use skyquery_core::ProgressEvent;
use skyquery_pipeline::ChatReply;

use crate::{ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChatRequest {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SessionRequest {
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ProgressItem {
    #[serde(rename = "type")]
    kind: &'static str,
    data: ProgressData,
}

#[derive(Debug, Serialize)]
struct ProgressData {
    message: String,
}

impl From<&ProgressEvent> for ProgressItem {
    fn from(event: &ProgressEvent) -> Self {
        Self {
            kind: event.kind(),
            data: ProgressData {
                message: event.message(),
            },
        }
    }
}

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat))
        .route("/clear-session", post(clear_session))
        .route("/progress", get(progress))
        .route("/health", get(health))
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let session_id = request.session_id.filter(|id| !id.trim().is_empty());
    let query = request.query.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(ApiError::BadRequest {
            message: "No query provided".to_string(),
            session_id,
        });
    }

    let reply = state.assistant.ask(&query, session_id.as_deref()).await?;
    Ok(Json(reply))
}

async fn clear_session(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<Value>, ApiError> {
    let session_id = request
        .session_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("No session ID provided"))?;

    state
        .assistant
        .clear_session(&session_id)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    state.progress.drain(&session_id);
    Ok(Json(json!({ "status": "success" })))
}

async fn progress(
    State(state): State<AppState>,
    Query(params): Query<SessionRequest>,
) -> Result<Json<Value>, ApiError> {
    let session_id = params
        .session_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("No session ID provided"))?;

    let events: Vec<ProgressItem> = state
        .progress
        .drain(&session_id)
        .iter()
        .map(ProgressItem::from)
        .collect();
    Ok(Json(json!({ "events": events })))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}
