use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SkyqueryError {
    #[error("LLM provider failed: {0}")]
    LlmProvider(String),
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("Session store failed: {0}")]
    SessionStore(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Serialization/deserialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
