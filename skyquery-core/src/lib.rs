//! Shared types for the skyquery workspace: the error type, LLM request and
//! response shapes, conversation turns, the flight schema and progress events.

mod conversation;
mod error;
mod llm;
pub mod progress;
pub mod schema;

pub use conversation::{ConversationTurn, TurnRole};
pub use error::SkyqueryError;
pub use llm::{Llm, LlmRequest, LlmResponse, Message, Role};
pub use progress::{ProgressEvent, ProgressHandler, ProgressManager, TracingProgressHandler};
pub use schema::{schema_context, Column, ColumnType, Table, FLIGHT_SCHEMA};
