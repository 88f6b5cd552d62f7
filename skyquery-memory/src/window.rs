use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use skyquery_core::{ConversationTurn, SkyqueryError};

use crate::SessionStore;

pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// In-process store keeping the most recent `window_size` turns per session.
///
/// Sessions live until cleared or until the process exits.
#[derive(Clone, Debug)]
pub struct WindowedSessionStore {
    sessions: Arc<RwLock<HashMap<String, Vec<ConversationTurn>>>>,
    window_size: usize, // Number of turns to keep
}

impl Default for WindowedSessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

impl WindowedSessionStore {
    pub fn new(window_size: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            window_size,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().map(|guard| guard.len()).unwrap_or(0)
    }
}

fn poisoned() -> SkyqueryError {
    SkyqueryError::SessionStore("session lock poisoned".to_string())
}

#[async_trait]
impl SessionStore for WindowedSessionStore {
    async fn get(&self, session_id: &str) -> Result<Vec<ConversationTurn>, SkyqueryError> {
        let guard = self.sessions.read().map_err(|_| poisoned())?;
        Ok(guard.get(session_id).cloned().unwrap_or_default())
    }

    async fn append(
        &self,
        session_id: &str,
        turns: Vec<ConversationTurn>,
    ) -> Result<(), SkyqueryError> {
        let mut guard = self.sessions.write().map_err(|_| poisoned())?;
        let history = guard.entry(session_id.to_string()).or_default();
        history.extend(turns);

        if history.len() > self.window_size {
            let start = history.len() - self.window_size;
            history.drain(..start);
        }
        tracing::trace!(session_id, turns = history.len(), "session history updated");
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<(), SkyqueryError> {
        let mut guard = self.sessions.write().map_err(|_| poisoned())?;
        guard.remove(session_id);
        Ok(())
    }
}
