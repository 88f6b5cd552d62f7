//! The query-repair loop: generate, execute, and on an execution failure
//! regenerate once with the database error before giving up.

use std::sync::Arc;

use serde::Serialize;
use skyquery_core::{ConversationTurn, ProgressEvent, ProgressManager, SkyqueryError};
use skyquery_memory::{SessionStore, WindowedSessionStore};
use skyquery_sql::{ColumnInfo, ExecutionError, ExecutionResult, Row, SqlExecutor, DEFAULT_ROW_CAP};
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::generator::{SqlGenerationRequest, SqlGenerator};

/// Regenerations allowed after a failed execution.
pub const MAX_REPAIR_ATTEMPTS: usize = 1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("No query provided")]
    EmptyQuery,
    #[error("Failed to generate SQL: {0}")]
    Generation(String),
    #[error("{0}")]
    Execution(String),
    #[error("Failed to regenerate SQL: {0}")]
    Regeneration(String),
    #[error("Session store failed: {0}")]
    SessionStore(String),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PipelineOutput {
    pub sql_query: String,
    pub rows: Vec<Row>,
    pub column_names: Vec<String>,
    pub columns: Vec<ColumnInfo>,
    pub row_count: usize,
    pub session_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{error}")]
pub struct PipelineFailure {
    pub error: PipelineError,
    /// The last SQL attempted, when one was generated.
    pub sql_query: Option<String>,
    pub session_id: String,
}

#[derive(Clone)]
pub struct QueryPipeline {
    generator: Arc<dyn SqlGenerator>,
    executor: Arc<dyn SqlExecutor>,
    sessions: Arc<dyn SessionStore>,
    progress: ProgressManager,
    row_cap: usize,
}

impl std::fmt::Debug for QueryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPipeline")
            .field("progress", &self.progress)
            .field("row_cap", &self.row_cap)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct QueryPipelineBuilder {
    generator: Option<Arc<dyn SqlGenerator>>,
    executor: Option<Arc<dyn SqlExecutor>>,
    sessions: Option<Arc<dyn SessionStore>>,
    progress: ProgressManager,
    row_cap: Option<usize>,
}

impl QueryPipelineBuilder {
    pub fn generator(mut self, generator: Arc<dyn SqlGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn SqlExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Defaults to an in-memory [`WindowedSessionStore`].
    pub fn sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn progress(mut self, progress: ProgressManager) -> Self {
        self.progress = progress;
        self
    }

    pub fn row_cap(mut self, row_cap: usize) -> Self {
        self.row_cap = Some(row_cap);
        self
    }

    pub fn build(self) -> Result<QueryPipeline, SkyqueryError> {
        let generator = self
            .generator
            .ok_or_else(|| SkyqueryError::InvalidConfig("generator is required".to_string()))?;
        let executor = self
            .executor
            .ok_or_else(|| SkyqueryError::InvalidConfig("executor is required".to_string()))?;
        let row_cap = self.row_cap.unwrap_or(DEFAULT_ROW_CAP);
        if row_cap == 0 {
            return Err(SkyqueryError::InvalidConfig(
                "row_cap must be greater than 0".to_string(),
            ));
        }

        Ok(QueryPipeline {
            generator,
            executor,
            sessions: self
                .sessions
                .unwrap_or_else(|| Arc::new(WindowedSessionStore::default())),
            progress: self.progress,
            row_cap,
        })
    }
}

impl QueryPipeline {
    pub fn builder() -> QueryPipelineBuilder {
        QueryPipelineBuilder::default()
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Answers `user_query` within a session. A missing session id gets a
    /// fresh UUID; an unknown one is adopted as given.
    pub async fn run_query(
        &self,
        user_query: &str,
        session_id: Option<&str>,
    ) -> Result<PipelineOutput, PipelineFailure> {
        let session_id = session_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let span = tracing::info_span!("run_query", session_id = %session_id);
        self.run_in_session(user_query.trim(), session_id)
            .instrument(span)
            .await
    }

    async fn run_in_session(
        &self,
        query: &str,
        session_id: String,
    ) -> Result<PipelineOutput, PipelineFailure> {
        if query.is_empty() {
            return Err(PipelineFailure {
                error: PipelineError::EmptyQuery,
                sql_query: None,
                session_id,
            });
        }

        self.progress.emit(&session_id, ProgressEvent::Start).await;
        let history = match self.sessions.get(&session_id).await {
            Ok(history) => history,
            Err(err) => {
                return Err(self
                    .fail(session_id, PipelineError::SessionStore(err.to_string()), None)
                    .await)
            }
        };

        self.progress.emit(&session_id, ProgressEvent::SqlGeneration).await;
        let request = SqlGenerationRequest::new(query, &history);
        let mut sql = match self.generator.generate(request).await {
            Ok(sql) => sql,
            Err(err) => {
                tracing::warn!(error = %err, "SQL generation failed");
                return Err(self
                    .fail(session_id, PipelineError::Generation(err.0), None)
                    .await);
            }
        };

        let mut first_error: Option<ExecutionError> = None;
        let mut repairs = 0;
        let execution = loop {
            let event = if repairs == 0 {
                ProgressEvent::SqlExecution
            } else {
                ProgressEvent::SqlExecutionRetry
            };
            self.progress.emit(&session_id, event).await;

            let err = match self.executor.execute(&sql, self.row_cap).await {
                Ok(result) => break result,
                Err(err) => err,
            };
            tracing::warn!(error = %err, attempt = repairs + 1, sql = %sql, "SQL execution failed");

            if repairs >= MAX_REPAIR_ATTEMPTS {
                let message = match &first_error {
                    Some(first) => format!(
                        "Failed to execute SQL after regeneration: {err} (first attempt: {first})"
                    ),
                    None => err.to_string(),
                };
                return Err(self
                    .fail(session_id, PipelineError::Execution(message), Some(sql))
                    .await);
            }
            repairs += 1;

            self.progress.emit(&session_id, ProgressEvent::SqlRegeneration).await;
            let prior_error = err.to_string();
            let request = SqlGenerationRequest::new(query, &history).with_prior_error(&prior_error);
            sql = match self.generator.generate(request).await {
                Ok(regenerated) => regenerated,
                Err(regen_err) => {
                    tracing::warn!(error = %regen_err, "SQL regeneration failed");
                    return Err(self
                        .fail(session_id, PipelineError::Regeneration(regen_err.0), Some(sql))
                        .await);
                }
            };
            first_error = Some(err);
        };

        self.progress.emit(&session_id, ProgressEvent::Finishing).await;
        let turns = vec![
            ConversationTurn::user(query),
            ConversationTurn::assistant(sql.clone()),
        ];
        if let Err(err) = self.sessions.append(&session_id, turns).await {
            return Err(self
                .fail(session_id, PipelineError::SessionStore(err.to_string()), Some(sql))
                .await);
        }
        self.progress.emit(&session_id, ProgressEvent::Complete).await;

        let ExecutionResult {
            rows,
            column_names,
            columns,
            row_count,
        } = execution;
        tracing::info!(row_count, repaired = repairs > 0, "query answered");
        Ok(PipelineOutput {
            sql_query: sql,
            rows,
            column_names,
            columns,
            row_count,
            session_id,
        })
    }

    async fn fail(
        &self,
        session_id: String,
        error: PipelineError,
        sql_query: Option<String>,
    ) -> PipelineFailure {
        self.progress
            .emit(
                &session_id,
                ProgressEvent::Error {
                    message: error.to_string(),
                },
            )
            .await;
        PipelineFailure {
            error,
            sql_query,
            session_id,
        }
    }
}
