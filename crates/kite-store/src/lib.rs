//! Repository contracts for conversations, messages and saved apps, plus an
//! in-memory implementation.
//!
//! All operations are snapshot reads or single writes; no multi-step
//! transactional guarantee is assumed. The engine re-reads fresh snapshots
//! at each decision point instead of caching.

pub mod memory;

use kite_types::{Message, SavedApp};

pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("message not found: {0}")]
    MessageNotFound(String),

    #[error("storage failure: {0}")]
    Backend(String),
}

#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    async fn append_message(
        &self,
        conversation_id: &str,
        message: Message,
    ) -> Result<(), StoreError>;

    /// Replace a persisted message wholesale, keyed by `message.id`. Used
    /// for post-turn tag updates (memory notes, final app-dev payloads).
    async fn update_message(
        &self,
        conversation_id: &str,
        message: Message,
    ) -> Result<(), StoreError>;

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError>;

    async fn title(&self, conversation_id: &str) -> Result<Option<String>, StoreError>;

    async fn set_title(&self, conversation_id: &str, title: &str) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
pub trait AppStore: Send + Sync {
    async fn list_apps(&self) -> Result<Vec<SavedApp>, StoreError>;

    async fn get_app(&self, id: &str) -> Result<Option<SavedApp>, StoreError>;

    /// Insert or replace by `app.id`.
    async fn save_app(&self, app: SavedApp) -> Result<(), StoreError>;
}
