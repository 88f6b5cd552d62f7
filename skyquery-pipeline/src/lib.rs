//! Turns a natural-language question into executed SQL, repairing a failed
//! query once, and decorates the result with a chart and follow-up questions.

pub mod assistant;
pub mod chart;
pub mod cleanup;
pub mod followup;
pub mod generator;
pub mod pipeline;
pub mod prompt;

pub use assistant::{Assistant, ChatReply};
pub use chart::{suggest_chart, ChartKind, ChartSpec};
pub use cleanup::{clean_sql, rewrite_banned_functions};
pub use followup::FollowUpGenerator;
pub use generator::{GenerationError, LlmSqlGenerator, SqlGenerationRequest, SqlGenerator};
pub use pipeline::{
    PipelineError, PipelineFailure, PipelineOutput, QueryPipeline, QueryPipelineBuilder,
    MAX_REPAIR_ATTEMPTS,
};
pub use prompt::PromptTemplate;
