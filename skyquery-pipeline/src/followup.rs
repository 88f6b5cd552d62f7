//! Suggests three follow-up questions after a successful query.

use std::collections::HashMap;
use std::sync::Arc;

use skyquery_core::{ConversationTurn, Llm, LlmRequest, TurnRole};
use skyquery_sql::ExecutionResult;

use crate::prompt::{PromptTemplate, FOLLOW_UP_PROMPT, FOLLOW_UP_SYSTEM_PROMPT};

const QUESTION_COUNT: usize = 3;
const SAMPLE_ROWS: usize = 5;
const HISTORY_TURNS: usize = 6;
const ASSISTANT_TRUNCATE_CHARS: usize = 300;
const FOLLOW_UP_MAX_TOKENS: u32 = 500;
const FOLLOW_UP_TEMPERATURE: f32 = 0.7;

const NO_RESULTS_QUESTIONS: [&str; 3] = [
    "What other aspects of NYC flights would you like to explore?",
    "Would you like to see flight delays by carrier?",
    "Would you like to learn about the busiest airports in NYC?",
];

const FALLBACK_QUESTIONS: [&str; 3] = [
    "What other aspects of NYC flights would you like to explore?",
    "Can you show me trends in flight delays by month?",
    "How do flight patterns vary between different airlines?",
];

#[derive(Clone)]
pub struct FollowUpGenerator {
    llm: Arc<dyn Llm>,
    model: String,
}

impl std::fmt::Debug for FollowUpGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FollowUpGenerator")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl FollowUpGenerator {
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self {
            llm,
            model: String::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Always returns exactly three questions, each ending in `?`. Falls back
    /// to a generic list when the model fails or answers with something unusable.
    pub async fn generate(
        &self,
        query: &str,
        execution: &ExecutionResult,
        history: &[ConversationTurn],
    ) -> Vec<String> {
        if execution.rows.is_empty() {
            return to_owned(&NO_RESULTS_QUESTIONS);
        }

        let prompt = match build_prompt(query, execution, history) {
            Ok(prompt) => prompt,
            Err(err) => {
                tracing::warn!(error = %err, "failed to render follow-up prompt");
                return to_owned(&FALLBACK_QUESTIONS);
            }
        };
        let mut request = LlmRequest::prompt(FOLLOW_UP_SYSTEM_PROMPT, prompt)
            .with_max_tokens(FOLLOW_UP_MAX_TOKENS)
            .with_temperature(FOLLOW_UP_TEMPERATURE);
        request.model = self.model.clone();

        match self.llm.invoke(request).await {
            Ok(response) => {
                let pad_subject = execution
                    .column_names
                    .first()
                    .map(String::as_str)
                    .unwrap_or("flights");
                parse_questions(&response.content, pad_subject).unwrap_or_else(|| {
                    tracing::warn!("follow-up response was not a JSON array of questions");
                    to_owned(&FALLBACK_QUESTIONS)
                })
            }
            Err(err) => {
                tracing::warn!(error = %err, "follow-up generation failed");
                to_owned(&FALLBACK_QUESTIONS)
            }
        }
    }
}

fn to_owned(questions: &[&str]) -> Vec<String> {
    questions.iter().map(|q| q.to_string()).collect()
}

fn build_prompt(
    query: &str,
    execution: &ExecutionResult,
    history: &[ConversationTurn],
) -> Result<String, skyquery_core::SkyqueryError> {
    let sample = &execution.rows[..execution.rows.len().min(SAMPLE_ROWS)];
    let vars = HashMap::from([
        ("query", query.to_string()),
        ("columns", serde_json::to_string(&execution.column_names)?),
        ("sample_size", SAMPLE_ROWS.to_string()),
        ("sample", serde_json::to_string(sample)?),
        ("history", render_history(history)),
    ]);
    PromptTemplate::new(FOLLOW_UP_PROMPT).render(&vars)
}

fn render_history(history: &[ConversationTurn]) -> String {
    if history.is_empty() {
        return String::new();
    }
    let recent = &history[history.len().saturating_sub(HISTORY_TURNS)..];
    let mut out = String::from("Previous conversation (up to 3 most recent exchanges):\n");
    for turn in recent {
        match turn.role {
            TurnRole::User => {
                out.push_str(&format!("User: {}\n", turn.content));
            }
            TurnRole::Assistant => {
                let content = truncate_chars(&turn.content, ASSISTANT_TRUNCATE_CHARS);
                out.push_str(&format!("Assistant: {content}\n"));
            }
        }
    }
    out.push('\n');
    out
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Parses the model's answer. `None` means fall back to the generic list.
fn parse_questions(raw: &str, pad_subject: &str) -> Option<Vec<String>> {
    let text = raw.replace("```json", "").replace("```", "");
    let text = text.trim();

    let questions = match serde_json::from_str::<Vec<String>>(text) {
        Ok(questions) => questions,
        Err(_) => {
            let start = text.find('[')?;
            let end = text.rfind(']')?;
            if end < start {
                return None;
            }
            let questions = serde_json::from_str::<Vec<String>>(&text[start..=end]).ok()?;
            if questions.is_empty() {
                return None;
            }
            questions
        }
    };

    let mut questions = questions;
    while questions.len() < QUESTION_COUNT {
        questions.push(format!("Would you like to explore more data about {pad_subject}?"));
    }
    questions.truncate(QUESTION_COUNT);
    Some(
        questions
            .into_iter()
            .map(|q| if q.ends_with('?') { q } else { format!("{q}?") })
            .collect(),
    )
}
