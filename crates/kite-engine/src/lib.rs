//! Streaming conversation orchestration: the round loop that turns one user
//! message into one fully assembled assistant message, dispatching MCP and
//! app-developer tool calls along the way.
//!
//! The engine is generic over its collaborators (chat client, MCP client,
//! store) so tests drive it entirely with scripted in-process fakes.

pub mod background;
pub mod budget;
pub mod orchestrator;
pub mod prompts;
pub mod tags;
pub mod transcript;
pub mod turn;

pub use budget::{RoundBudget, ToolMode, ToolPreference};
pub use orchestrator::{ChatEngine, EngineConfig, TurnOutcome, TurnRequest};
pub use tags::{looks_like_api_error, truncate_for_summary, RESULT_SUMMARY_MAX};
pub use transcript::{insert_markers, marker_for, segment, strip_markers, Segment};
pub use turn::{NullSink, TagAnchor, TranscriptSink, TurnState};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] kite_store::StoreError),

    #[error(transparent)]
    Provider(#[from] kite_provider::ProviderError),
}
