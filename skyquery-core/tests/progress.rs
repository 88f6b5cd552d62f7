use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use skyquery_core::{ProgressEvent, ProgressHandler, ProgressManager};

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ProgressHandler for Recorder {
    async fn on_event(&self, session_id: &str, event: &ProgressEvent) {
        self.seen
            .lock()
            .unwrap()
            .push((session_id.to_string(), event.kind().to_string()));
    }
}

#[test]
fn progress_manager_noop_has_no_handlers() {
    assert!(ProgressManager::noop().is_noop());
}

#[tokio::test]
async fn progress_manager_fans_out_to_every_handler() {
    let first = Arc::new(Recorder::default());
    let second = Arc::new(Recorder::default());
    let manager = ProgressManager::new(vec![first.clone()]).with_handler(second.clone());

    manager.emit("s1", ProgressEvent::Start).await;
    manager.emit("s1", ProgressEvent::SqlGeneration).await;

    for recorder in [first, second] {
        let seen = recorder.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                ("s1".to_string(), "start".to_string()),
                ("s1".to_string(), "sql_generation".to_string()),
            ]
        );
    }
}

#[test]
fn error_event_message_carries_reason() {
    let event = ProgressEvent::Error {
        message: "no such table: flight".to_string(),
    };
    assert_eq!(event.kind(), "error");
    assert_eq!(event.message(), "Error: no such table: flight");
    assert!(event.is_terminal());
    assert!(!ProgressEvent::SqlExecutionRetry.is_terminal());
}
