use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use skyquery_core::{ConversationTurn, ProgressEvent, ProgressHandler, ProgressManager};
use skyquery_memory::{SessionStore, WindowedSessionStore};
use skyquery_pipeline::{
    GenerationError, PipelineError, QueryPipeline, SqlGenerationRequest, SqlGenerator,
};
use skyquery_sql::{ExecutionError, ExecutionResult, SqlExecutor};

struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    prior_errors: Mutex<Vec<Option<String>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedGenerator {
    fn new(replies: Vec<Result<&str, &str>>) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|reply| {
                        reply
                            .map(str::to_string)
                            .map_err(|err| GenerationError(err.to_string()))
                    })
                    .collect(),
            ),
            prior_errors: Mutex::new(Vec::new()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn calls_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl SqlGenerator for ScriptedGenerator {
    async fn generate(&self, request: SqlGenerationRequest<'_>) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prior_errors
            .lock()
            .unwrap()
            .push(request.prior_error.map(str::to_string));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError("script exhausted".to_string())))
    }
}

/// Fails every SQL text listed in `failures` with the paired message.
struct ScriptedExecutor {
    failures: Vec<(&'static str, &'static str)>,
    calls: Arc<AtomicUsize>,
    seen_caps: Mutex<Vec<usize>>,
}

impl ScriptedExecutor {
    fn new(failures: Vec<(&'static str, &'static str)>) -> Self {
        Self {
            failures,
            calls: Arc::new(AtomicUsize::new(0)),
            seen_caps: Mutex::new(Vec::new()),
        }
    }

    fn calls_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl SqlExecutor for ScriptedExecutor {
    async fn execute(&self, sql: &str, row_cap: usize) -> Result<ExecutionResult, ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_caps.lock().unwrap().push(row_cap);
        if let Some((_, message)) = self.failures.iter().find(|(bad, _)| *bad == sql) {
            return Err(ExecutionError::Database(message.to_string()));
        }
        let row = serde_json::json!({"n": 42}).as_object().cloned().unwrap();
        Ok(ExecutionResult {
            rows: vec![row],
            column_names: vec!["n".to_string()],
            columns: Vec::new(),
            row_count: 1,
        })
    }
}

#[derive(Default)]
struct EventLog {
    kinds: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl ProgressHandler for EventLog {
    async fn on_event(&self, _session_id: &str, event: &ProgressEvent) {
        self.kinds.lock().unwrap().push(event.kind());
    }
}

struct Harness {
    pipeline: QueryPipeline,
    generator: Arc<ScriptedGenerator>,
    executor: Arc<ScriptedExecutor>,
    sessions: Arc<WindowedSessionStore>,
    events: Arc<EventLog>,
}

fn harness(generator: ScriptedGenerator, executor: ScriptedExecutor) -> Harness {
    let generator = Arc::new(generator);
    let executor = Arc::new(executor);
    let sessions = Arc::new(WindowedSessionStore::new(10));
    let events = Arc::new(EventLog::default());
    let pipeline = QueryPipeline::builder()
        .generator(generator.clone())
        .executor(executor.clone())
        .sessions(sessions.clone())
        .progress(ProgressManager::new(vec![events.clone() as Arc<dyn ProgressHandler>]))
        .row_cap(25)
        .build()
        .expect("pipeline should build");
    Harness {
        pipeline,
        generator,
        executor,
        sessions,
        events,
    }
}

#[tokio::test]
async fn first_attempt_success_records_exchange() {
    let h = harness(
        ScriptedGenerator::new(vec![Ok("SELECT COUNT(*) AS n FROM flights")]),
        ScriptedExecutor::new(vec![]),
    );

    let output = h
        .pipeline
        .run_query("How many flights?", Some("s1"))
        .await
        .expect("query should succeed");

    assert_eq!(output.sql_query, "SELECT COUNT(*) AS n FROM flights");
    assert_eq!(output.session_id, "s1");
    assert!(output.row_count >= output.rows.len());
    assert_eq!(h.generator.calls_counter().load(Ordering::SeqCst), 1);
    assert_eq!(h.executor.calls_counter().load(Ordering::SeqCst), 1);
    assert_eq!(*h.executor.seen_caps.lock().unwrap(), vec![25]);
    assert_eq!(
        h.sessions.get("s1").await.unwrap(),
        vec![
            ConversationTurn::user("How many flights?"),
            ConversationTurn::assistant("SELECT COUNT(*) AS n FROM flights"),
        ]
    );
    assert_eq!(
        *h.events.kinds.lock().unwrap(),
        vec!["start", "sql_generation", "sql_execution", "finishing", "complete"]
    );
}

#[tokio::test]
async fn failed_execution_is_repaired_once_with_the_error() {
    let h = harness(
        ScriptedGenerator::new(vec![
            Ok("SELECT foo FROM flights"),
            Ok("SELECT dep_delay FROM flights"),
        ]),
        ScriptedExecutor::new(vec![("SELECT foo FROM flights", "column \"foo\" does not exist")]),
    );

    let output = h
        .pipeline
        .run_query("show delays", Some("s1"))
        .await
        .expect("repair should succeed");

    assert_eq!(output.sql_query, "SELECT dep_delay FROM flights");
    assert_eq!(
        *h.generator.prior_errors.lock().unwrap(),
        vec![None, Some("column \"foo\" does not exist".to_string())]
    );
    let history = h.sessions.get("s1").await.unwrap();
    assert_eq!(history[1].content, "SELECT dep_delay FROM flights");
    assert_eq!(
        *h.events.kinds.lock().unwrap(),
        vec![
            "start",
            "sql_generation",
            "sql_execution",
            "sql_regeneration",
            "sql_execution_retry",
            "finishing",
            "complete"
        ]
    );
}

#[tokio::test]
async fn second_failure_reports_both_errors_and_keeps_history() {
    let h = harness(
        ScriptedGenerator::new(vec![Ok("SELECT a FROM flights"), Ok("SELECT b FROM flights")]),
        ScriptedExecutor::new(vec![
            ("SELECT a FROM flights", "column \"a\" does not exist"),
            ("SELECT b FROM flights", "column \"b\" does not exist"),
        ]),
    );
    let before = vec![
        ConversationTurn::user("earlier question"),
        ConversationTurn::assistant("SELECT 1"),
    ];
    h.sessions.append("s1", before.clone()).await.unwrap();

    let failure = h
        .pipeline
        .run_query("show a", Some("s1"))
        .await
        .unwrap_err();

    let PipelineError::Execution(message) = &failure.error else {
        panic!("expected execution failure, got {:?}", failure.error);
    };
    assert!(message.contains("column \"a\" does not exist"));
    assert!(message.contains("column \"b\" does not exist"));
    assert_eq!(failure.sql_query.as_deref(), Some("SELECT b FROM flights"));
    assert_eq!(failure.session_id, "s1");
    assert_eq!(h.generator.calls_counter().load(Ordering::SeqCst), 2);
    assert_eq!(h.executor.calls_counter().load(Ordering::SeqCst), 2);
    assert_eq!(h.sessions.get("s1").await.unwrap(), before);
    assert_eq!(h.events.kinds.lock().unwrap().last(), Some(&"error"));
}

#[tokio::test]
async fn generation_failure_is_not_retried() {
    let h = harness(
        ScriptedGenerator::new(vec![Err("rate limited")]),
        ScriptedExecutor::new(vec![]),
    );

    let failure = h.pipeline.run_query("anything", None).await.unwrap_err();

    assert_eq!(failure.error, PipelineError::Generation("rate limited".to_string()));
    assert_eq!(failure.sql_query, None);
    assert_eq!(h.generator.calls_counter().load(Ordering::SeqCst), 1);
    assert_eq!(h.executor.calls_counter().load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn regeneration_failure_is_reported_instead_of_execution_error() {
    let h = harness(
        ScriptedGenerator::new(vec![Ok("SELECT nope"), Err("overloaded")]),
        ScriptedExecutor::new(vec![("SELECT nope", "no such column: nope")]),
    );

    let failure = h.pipeline.run_query("q", Some("s1")).await.unwrap_err();

    assert_eq!(failure.error, PipelineError::Regeneration("overloaded".to_string()));
    assert_eq!(failure.sql_query.as_deref(), Some("SELECT nope"));
    assert_eq!(h.executor.calls_counter().load(Ordering::SeqCst), 1);
    assert!(h.sessions.get("s1").await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_query_touches_nothing() {
    let h = harness(ScriptedGenerator::new(vec![]), ScriptedExecutor::new(vec![]));

    let failure = h.pipeline.run_query("   ", Some("s1")).await.unwrap_err();

    assert_eq!(failure.error, PipelineError::EmptyQuery);
    assert_eq!(failure.error.to_string(), "No query provided");
    assert_eq!(h.generator.calls_counter().load(Ordering::SeqCst), 0);
    assert_eq!(h.executor.calls_counter().load(Ordering::SeqCst), 0);
    assert!(h.events.kinds.lock().unwrap().is_empty());
    assert_eq!(h.sessions.session_count(), 0);
}

#[tokio::test]
async fn missing_session_id_gets_a_fresh_uuid() {
    let h = harness(
        ScriptedGenerator::new(vec![Ok("SELECT 1"), Ok("SELECT 2")]),
        ScriptedExecutor::new(vec![]),
    );

    let first = h.pipeline.run_query("q1", None).await.unwrap();
    let second = h.pipeline.run_query("q2", Some("  ")).await.unwrap();

    assert!(uuid::Uuid::parse_str(&first.session_id).is_ok());
    assert_ne!(first.session_id, second.session_id);
    assert_eq!(h.sessions.get(&first.session_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn history_from_earlier_turns_reaches_the_generator() {
    struct HistoryProbe {
        seen: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl SqlGenerator for HistoryProbe {
        async fn generate(
            &self,
            request: SqlGenerationRequest<'_>,
        ) -> Result<String, GenerationError> {
            self.seen.lock().unwrap().push(request.history.len());
            Ok("SELECT 1".to_string())
        }
    }

    let probe = Arc::new(HistoryProbe {
        seen: Mutex::new(Vec::new()),
    });
    let pipeline = QueryPipeline::builder()
        .generator(probe.clone())
        .executor(Arc::new(ScriptedExecutor::new(vec![])))
        .sessions(Arc::new(WindowedSessionStore::new(4)))
        .build()
        .unwrap();

    for question in ["a", "b", "c"] {
        pipeline.run_query(question, Some("s")).await.unwrap();
    }

    assert_eq!(*probe.seen.lock().unwrap(), vec![0, 2, 4]);
}

#[test]
fn builder_requires_generator_and_executor() {
    assert!(QueryPipeline::builder().build().is_err());
    assert!(QueryPipeline::builder()
        .generator(Arc::new(ScriptedGenerator::new(vec![])))
        .build()
        .is_err());
}
