use serde::Serialize;
use skyquery_core::SkyqueryError;
use skyquery_sql::{ColumnInfo, ExecutionResult, Row};

use crate::chart::{suggest_chart, ChartSpec};
use crate::followup::FollowUpGenerator;
use crate::pipeline::{PipelineFailure, PipelineOutput, QueryPipeline};

/// Everything returned for one answered chat message.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatReply {
    pub sql_query: String,
    #[serde(rename = "data")]
    pub rows: Vec<Row>,
    pub column_names: Vec<String>,
    pub columns: Vec<ColumnInfo>,
    pub row_count: usize,
    pub session_id: String,
    pub chart: Option<ChartSpec>,
    pub follow_up_questions: Vec<String>,
}

/// One chat turn: the repair pipeline, then chart and follow-up suggestions.
#[derive(Clone, Debug)]
pub struct Assistant {
    pipeline: QueryPipeline,
    follow_ups: Option<FollowUpGenerator>,
}

impl Assistant {
    pub fn new(pipeline: QueryPipeline) -> Self {
        Self {
            pipeline,
            follow_ups: None,
        }
    }

    pub fn with_follow_ups(mut self, follow_ups: FollowUpGenerator) -> Self {
        self.follow_ups = Some(follow_ups);
        self
    }

    pub fn pipeline(&self) -> &QueryPipeline {
        &self.pipeline
    }

    pub async fn ask(
        &self,
        query: &str,
        session_id: Option<&str>,
    ) -> Result<ChatReply, PipelineFailure> {
        let PipelineOutput {
            sql_query,
            rows,
            column_names,
            columns,
            row_count,
            session_id,
        } = self.pipeline.run_query(query, session_id).await?;
        let execution = ExecutionResult {
            rows,
            column_names,
            columns,
            row_count,
        };

        let chart = suggest_chart(query, &execution.columns, &execution.rows);
        let follow_up_questions = match &self.follow_ups {
            Some(generator) => {
                let history = self
                    .pipeline
                    .sessions()
                    .get(&session_id)
                    .await
                    .unwrap_or_else(|err| {
                        tracing::warn!(error = %err, "history unavailable for follow-ups");
                        Vec::new()
                    });
                generator.generate(query.trim(), &execution, &history).await
            }
            None => Vec::new(),
        };

        Ok(ChatReply {
            sql_query,
            rows: execution.rows,
            column_names: execution.column_names,
            columns: execution.columns,
            row_count,
            session_id,
            chart,
            follow_up_questions,
        })
    }

    pub async fn clear_session(&self, session_id: &str) -> Result<(), SkyqueryError> {
        self.pipeline.sessions().clear(session_id).await
    }
}
