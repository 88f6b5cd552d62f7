use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use skyquery_core::{ProgressEvent, ProgressHandler};

/// Events buffered per session between two `/progress` polls.
pub const PROGRESS_LOG_CAPACITY: usize = 50;

/// How long a finished run's events wait for a poll before being discarded.
pub const FINISHED_RUN_RETENTION: Duration = Duration::from_secs(300);

#[derive(Debug, Default)]
struct SessionEvents {
    events: VecDeque<ProgressEvent>,
    finished_at: Option<Instant>,
}

/// Per-session event buffer that clients poll. Oldest events are dropped once
/// a session holds [`PROGRESS_LOG_CAPACITY`] undrained events, and a buffer
/// whose run ended is dropped once it has gone unpolled for the retention
/// period.
#[derive(Clone, Debug)]
pub struct ProgressLog {
    sessions: Arc<Mutex<HashMap<String, SessionEvents>>>,
    retention: Duration,
}

impl Default for ProgressLog {
    fn default() -> Self {
        Self::with_retention(FINISHED_RUN_RETENTION)
    }
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            retention,
        }
    }

    pub fn push(&self, session_id: &str, event: ProgressEvent) {
        let Ok(mut sessions) = self.sessions.lock() else {
            tracing::warn!("progress log lock poisoned; dropping event");
            return;
        };
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|_, session| match session.finished_at {
            Some(finished) => now.duration_since(finished) < self.retention,
            None => true,
        });
        if sessions.len() < before {
            tracing::debug!(dropped = before - sessions.len(), "discarded unpolled progress");
        }

        let session = sessions.entry(session_id.to_string()).or_default();
        if session.events.len() == PROGRESS_LOG_CAPACITY {
            session.events.pop_front();
        }
        session.finished_at = match event {
            ProgressEvent::Complete | ProgressEvent::Error { .. } => Some(now),
            _ => None,
        };
        session.events.push_back(event);
    }

    /// Removes and returns everything buffered for `session_id`.
    pub fn drain(&self, session_id: &str) -> Vec<ProgressEvent> {
        match self.sessions.lock() {
            Ok(mut sessions) => sessions
                .remove(session_id)
                .map(|session| Vec::from(session.events))
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|guard| guard.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ProgressHandler for ProgressLog {
    async fn on_event(&self, session_id: &str, event: &ProgressEvent) {
        self.push(session_id, event.clone());
    }
}
