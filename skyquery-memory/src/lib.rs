use async_trait::async_trait;
use skyquery_core::{ConversationTurn, SkyqueryError};

pub mod window;

pub use window::{WindowedSessionStore, DEFAULT_HISTORY_WINDOW};

/// Per-session conversation history.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Turns for the session, oldest first. Unknown sessions have no turns.
    async fn get(&self, session_id: &str) -> Result<Vec<ConversationTurn>, SkyqueryError>;

    /// Appends all `turns` at once, then evicts the oldest turns beyond the
    /// retention window.
    async fn append(
        &self,
        session_id: &str,
        turns: Vec<ConversationTurn>,
    ) -> Result<(), SkyqueryError>;

    /// Forgets the session entirely.
    async fn clear(&self, session_id: &str) -> Result<(), SkyqueryError>;
}
