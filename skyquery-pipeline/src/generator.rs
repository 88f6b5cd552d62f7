use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use skyquery_core::{schema_context, ConversationTurn, Llm, LlmRequest, TurnRole};
use thiserror::Error;

use crate::cleanup::clean_sql;
use crate::prompt::{PromptTemplate, SQL_ERROR_BLOCK, SQL_PROMPT, SQL_SYSTEM_PROMPT};

const SQL_MAX_TOKENS: u32 = 1000;
const SQL_TEMPERATURE: f32 = 0.0;

/// The model (or the transport to it) failed. Carries the underlying message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct GenerationError(pub String);

/// Input for one generation call. Built per call and never stored.
#[derive(Clone, Copy, Debug)]
pub struct SqlGenerationRequest<'a> {
    pub query: &'a str,
    pub history: &'a [ConversationTurn],
    /// Error from executing the previously generated SQL, when repairing.
    pub prior_error: Option<&'a str>,
}

impl<'a> SqlGenerationRequest<'a> {
    pub fn new(query: &'a str, history: &'a [ConversationTurn]) -> Self {
        Self {
            query,
            history,
            prior_error: None,
        }
    }

    pub fn with_prior_error(mut self, error: &'a str) -> Self {
        self.prior_error = Some(error);
        self
    }
}

#[async_trait]
pub trait SqlGenerator: Send + Sync {
    /// Returns cleaned SQL text, which may be empty.
    async fn generate(&self, request: SqlGenerationRequest<'_>) -> Result<String, GenerationError>;
}

/// Generates SQL by prompting an [`Llm`] with the flight schema.
#[derive(Clone)]
pub struct LlmSqlGenerator {
    llm: Arc<dyn Llm>,
    model: String,
    schema: String,
    template: PromptTemplate,
}

impl std::fmt::Debug for LlmSqlGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSqlGenerator")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl LlmSqlGenerator {
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self {
            llm,
            model: String::new(),
            schema: schema_context(),
            template: PromptTemplate::new(SQL_PROMPT),
        }
    }

    /// Overrides the client's default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn build_prompt(&self, request: &SqlGenerationRequest<'_>) -> Result<String, GenerationError> {
        let error = match request.prior_error {
            Some(prior) => PromptTemplate::new(SQL_ERROR_BLOCK)
                .render(&HashMap::from([("error", prior.to_string())]))
                .map_err(|err| GenerationError(err.to_string()))?,
            None => String::new(),
        };
        let vars = HashMap::from([
            ("schema", self.schema.clone()),
            ("history", render_history(request.history)),
            ("error", error),
            ("query", request.query.to_string()),
        ]);
        self.template
            .render(&vars)
            .map_err(|err| GenerationError(err.to_string()))
    }
}

fn render_history(history: &[ConversationTurn]) -> String {
    if history.is_empty() {
        return String::new();
    }
    let mut out = String::from("Previous conversation:\n");
    for turn in history {
        let label = match turn.role {
            TurnRole::User => "User",
            TurnRole::Assistant => "SQL generated",
        };
        out.push_str(label);
        out.push_str(": ");
        out.push_str(&turn.content);
        out.push('\n');
    }
    out.push('\n');
    out
}

#[async_trait]
impl SqlGenerator for LlmSqlGenerator {
    async fn generate(&self, request: SqlGenerationRequest<'_>) -> Result<String, GenerationError> {
        let prompt = self.build_prompt(&request)?;
        let mut llm_request = LlmRequest::prompt(SQL_SYSTEM_PROMPT, prompt)
            .with_max_tokens(SQL_MAX_TOKENS)
            .with_temperature(SQL_TEMPERATURE);
        llm_request.model = self.model.clone();

        let response = self
            .llm
            .invoke(llm_request)
            .await
            .map_err(|err| GenerationError(err.to_string()))?;
        let sql = clean_sql(&response.content);
        tracing::debug!(sql = %sql, repair = request.prior_error.is_some(), "generated SQL");
        Ok(sql)
    }
}
