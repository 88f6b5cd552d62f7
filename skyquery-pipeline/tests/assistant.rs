use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use skyquery_core::{ConversationTurn, Llm, LlmRequest, LlmResponse, SkyqueryError};
use skyquery_pipeline::{
    Assistant, ChartKind, FollowUpGenerator, LlmSqlGenerator, QueryPipeline,
    SqlGenerationRequest, SqlGenerator,
};
use skyquery_sql::SqliteExecutor;

/// Answers SQL prompts from a script and follow-up prompts with a fixed array.
struct ScriptedLlm {
    sql_replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    fn new(sql_replies: &[&str]) -> Self {
        Self {
            sql_replies: Mutex::new(sql_replies.iter().map(|s| s.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.messages[0].content.clone())
            .collect()
    }
}

#[async_trait]
impl Llm for ScriptedLlm {
    async fn invoke(&self, request: LlmRequest) -> Result<LlmResponse, SkyqueryError> {
        let is_sql = request
            .system
            .as_deref()
            .is_some_and(|system| system.starts_with("You are a SQL expert"));
        self.requests.lock().unwrap().push(request);

        if !is_sql {
            return Ok(LlmResponse {
                content: r#"["Which carrier flies the longest routes?", "How does this change by month"]"#
                    .to_string(),
            });
        }
        self.sql_replies
            .lock()
            .unwrap()
            .pop_front()
            .map(|content| LlmResponse { content })
            .ok_or_else(|| SkyqueryError::LlmProvider("script exhausted".to_string()))
    }
}

async fn flights_db() -> SqliteExecutor {
    let executor = SqliteExecutor::builder("sqlite::memory:")
        .max_connections(1)
        .build()
        .expect("sqlite executor should build");
    sqlx::query("CREATE TABLE flights (carrier TEXT, distance BIGINT)")
        .execute(executor.pool())
        .await
        .expect("create table");
    for (carrier, distance) in [("UA", 1400), ("UA", 1000), ("AA", 700), ("B6", 300)] {
        sqlx::query("INSERT INTO flights VALUES ($1, $2)")
            .bind(carrier)
            .bind(distance)
            .execute(executor.pool())
            .await
            .expect("insert row");
    }
    executor
}

fn assistant(llm: Arc<ScriptedLlm>, executor: SqliteExecutor) -> Assistant {
    let pipeline = QueryPipeline::builder()
        .generator(Arc::new(LlmSqlGenerator::new(llm.clone())))
        .executor(Arc::new(executor))
        .build()
        .expect("pipeline should build");
    Assistant::new(pipeline).with_follow_ups(FollowUpGenerator::new(llm))
}

#[tokio::test]
async fn fenced_model_output_is_cleaned_and_answered() {
    let llm = Arc::new(ScriptedLlm::new(&[
        "```sql\nSELECT carrier, COUNT(*) AS flights FROM flights GROUP BY carrier ORDER BY carrier LIMIT 5;\n```",
    ]));
    let assistant = assistant(llm.clone(), flights_db().await);

    let reply = assistant
        .ask("Flights per carrier", Some("s1"))
        .await
        .expect("query should succeed");

    assert_eq!(
        reply.sql_query,
        "SELECT carrier, COUNT(*) AS flights FROM flights GROUP BY carrier ORDER BY carrier LIMIT 5;"
    );
    assert_eq!(reply.column_names, vec!["carrier", "flights"]);
    assert_eq!(reply.row_count, 3);
    assert_eq!(reply.rows[0]["carrier"], "AA");
    assert_eq!(reply.chart.as_ref().map(|c| c.kind), Some(ChartKind::Bar));
    assert_eq!(
        reply.follow_up_questions,
        vec![
            "Which carrier flies the longest routes?",
            "How does this change by month?",
            "Would you like to explore more data about carrier?",
        ]
    );

    let requests = llm.requests.lock().unwrap();
    assert_eq!(requests[0].max_tokens, Some(1000));
    assert_eq!(requests[0].temperature, Some(0.0));
    assert_eq!(requests[1].temperature, Some(0.7));
}

#[tokio::test]
async fn database_error_is_fed_back_into_the_second_prompt() {
    let llm = Arc::new(ScriptedLlm::new(&[
        "SELECT foo FROM flights",
        "SELECT SUM(distance) AS total FROM flights",
    ]));
    let assistant = assistant(llm.clone(), flights_db().await);

    let reply = assistant.ask("Total distance", Some("s1")).await.unwrap();

    assert_eq!(reply.sql_query, "SELECT SUM(distance) AS total FROM flights");
    assert_eq!(reply.rows[0]["total"], 3400);
    let prompts = llm.prompts();
    assert!(!prompts[0].contains("The previous SQL query failed"));
    assert!(prompts[1].contains("The previous SQL query failed with the following error:"));
    assert!(prompts[1].contains("no such column: foo"));
}

#[tokio::test]
async fn later_prompts_carry_the_conversation() {
    let llm = Arc::new(ScriptedLlm::new(&[
        "SELECT COUNT(*) AS n FROM flights",
        "SELECT COUNT(*) AS n FROM flights WHERE carrier = 'UA'",
    ]));
    let assistant = assistant(llm.clone(), flights_db().await);

    assistant.ask("How many flights?", Some("s1")).await.unwrap();
    assistant.ask("Only United", Some("s1")).await.unwrap();

    let sql_prompts: Vec<_> = llm
        .prompts()
        .into_iter()
        .filter(|prompt| prompt.starts_with("Given the following database schema"))
        .collect();
    assert_eq!(sql_prompts.len(), 2);
    assert!(!sql_prompts[0].contains("Previous conversation:"));
    assert!(sql_prompts[1].contains(
        "Previous conversation:\nUser: How many flights?\nSQL generated: SELECT COUNT(*) AS n FROM flights\n"
    ));
}

#[tokio::test]
async fn empty_result_skips_the_follow_up_model_call() {
    let llm = Arc::new(ScriptedLlm::new(&[
        "SELECT carrier FROM flights WHERE distance > 99999",
    ]));
    let assistant = assistant(llm.clone(), flights_db().await);

    let reply = assistant.ask("Very long flights", None).await.unwrap();

    assert_eq!(reply.row_count, 0);
    assert!(reply.rows.is_empty());
    assert_eq!(reply.column_names, vec!["carrier"]);
    assert_eq!(reply.follow_up_questions.len(), 3);
    assert_eq!(llm.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn clearing_a_session_forgets_its_history() {
    let llm = Arc::new(ScriptedLlm::new(&["SELECT 1 AS one"]));
    let assistant = assistant(llm, flights_db().await);

    assistant.ask("one", Some("s1")).await.unwrap();
    assistant.clear_session("s1").await.unwrap();

    assert!(assistant.pipeline().sessions().get("s1").await.unwrap().is_empty());
}

#[test]
fn generator_prompt_lists_schema_history_and_rules() {
    let generator = LlmSqlGenerator::new(Arc::new(ScriptedLlm::new(&[])));
    let history = vec![
        ConversationTurn::user("Busiest airport?"),
        ConversationTurn::assistant("SELECT origin FROM flights"),
    ];
    let request = SqlGenerationRequest::new("And in July?", &history)
        .with_prior_error("column \"mnth\" does not exist");

    let prompt = generator.build_prompt(&request).unwrap();

    assert!(prompt.contains("1. airlines"));
    assert!(prompt.contains("   - time_hour (timestamp):"));
    assert!(prompt.contains("User: Busiest airport?\nSQL generated: SELECT origin FROM flights\n"));
    assert!(prompt.contains("column \"mnth\" does not exist"));
    assert!(prompt.contains("User request: And in July?"));
    assert!(prompt.contains("3. Never use EXTRACT() function, use date_part() instead"));
}

#[tokio::test]
async fn provider_failure_surfaces_as_generation_error() {
    let generator = LlmSqlGenerator::new(Arc::new(ScriptedLlm::new(&[])));

    let err = generator
        .generate(SqlGenerationRequest::new("anything", &[]))
        .await
        .unwrap_err();

    assert!(err.0.contains("script exhausted"));
}
