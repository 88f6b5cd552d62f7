use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use skyquery_pipeline::{PipelineError, PipelineFailure};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest {
        message: String,
        session_id: Option<String>,
    },
    #[error(transparent)]
    Pipeline(#[from] PipelineFailure),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            session_id: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Pipeline(failure) if failure.error == PipelineError::EmptyQuery => {
                StatusCode::BAD_REQUEST
            }
            Self::Pipeline(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        match self {
            Self::BadRequest {
                message,
                session_id: Some(session_id),
            } => json!({ "error": message, "session_id": session_id }),
            Self::BadRequest { message, .. } => json!({ "error": message }),
            Self::Pipeline(failure) => {
                let mut body = json!({
                    "error": failure.error.to_string(),
                    "session_id": failure.session_id,
                });
                if let Some(sql) = &failure.sql_query {
                    body["sql_query"] = json!(sql);
                }
                body
            }
            Self::Internal(message) => json!({ "error": message }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(self.body())).into_response()
    }
}
