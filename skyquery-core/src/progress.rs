//! Progress notifications emitted while a question is answered.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ProgressEvent {
    Start,
    SqlGeneration,
    SqlExecution,
    SqlRegeneration,
    SqlExecutionRetry,
    Finishing,
    Complete,
    Error { message: String },
}

impl ProgressEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::Start => "start",
            ProgressEvent::SqlGeneration => "sql_generation",
            ProgressEvent::SqlExecution => "sql_execution",
            ProgressEvent::SqlRegeneration => "sql_regeneration",
            ProgressEvent::SqlExecutionRetry => "sql_execution_retry",
            ProgressEvent::Finishing => "finishing",
            ProgressEvent::Complete => "complete",
            ProgressEvent::Error { .. } => "error",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ProgressEvent::Start => "Processing your query...".to_string(),
            ProgressEvent::SqlGeneration => "Generating SQL query...".to_string(),
            ProgressEvent::SqlExecution => "Executing SQL query...".to_string(),
            ProgressEvent::SqlRegeneration => "Fixing SQL query based on error...".to_string(),
            ProgressEvent::SqlExecutionRetry => "Executing fixed SQL query...".to_string(),
            ProgressEvent::Finishing => "Preparing results...".to_string(),
            ProgressEvent::Complete => "Query processed successfully".to_string(),
            ProgressEvent::Error { message } => format!("Error: {message}"),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Complete | ProgressEvent::Error { .. })
    }
}

/// Receives progress events. Handlers must not fail the run they observe.
#[async_trait]
pub trait ProgressHandler: Send + Sync {
    async fn on_event(&self, session_id: &str, event: &ProgressEvent);
}

#[derive(Clone, Default)]
pub struct ProgressManager {
    handlers: Vec<Arc<dyn ProgressHandler>>,
}

impl std::fmt::Debug for ProgressManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressManager")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl ProgressManager {
    pub fn new(handlers: Vec<Arc<dyn ProgressHandler>>) -> Self {
        Self { handlers }
    }

    pub fn noop() -> Self {
        Self { handlers: vec![] }
    }

    pub fn is_noop(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn with_handler(mut self, handler: Arc<dyn ProgressHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub async fn emit(&self, session_id: &str, event: ProgressEvent) {
        for handler in &self.handlers {
            handler.on_event(session_id, &event).await;
        }
    }
}

/// Writes every event to the `tracing` subscriber.
#[derive(Clone, Debug, Default)]
pub struct TracingProgressHandler;

#[async_trait]
impl ProgressHandler for TracingProgressHandler {
    async fn on_event(&self, session_id: &str, event: &ProgressEvent) {
        match event {
            ProgressEvent::Error { message } => {
                tracing::warn!(session_id, kind = event.kind(), %message, "query failed")
            }
            _ => tracing::debug!(session_id, kind = event.kind(), "{}", event.message()),
        }
    }
}
