use std::collections::HashMap;

use kite_types::{Message, SavedApp};
use tokio::sync::RwLock;

use crate::{AppStore, ConversationStore, StoreError};

#[derive(Default)]
struct Conversation {
    title: Option<String>,
    messages: Vec<Message>,
}

/// In-memory repository. Conversations are created implicitly on first
/// append, matching the platform store's behavior.
#[derive(Default)]
pub struct MemoryStore {
    conversations: RwLock<HashMap<String, Conversation>>,
    apps: RwLock<HashMap<String, SavedApp>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ConversationStore for MemoryStore {
    async fn append_message(
        &self,
        conversation_id: &str,
        message: Message,
    ) -> Result<(), StoreError> {
        let mut guard = self.conversations.write().await;
        guard
            .entry(conversation_id.to_string())
            .or_default()
            .messages
            .push(message);
        Ok(())
    }

    async fn update_message(
        &self,
        conversation_id: &str,
        message: Message,
    ) -> Result<(), StoreError> {
        let mut guard = self.conversations.write().await;
        let conversation = guard
            .get_mut(conversation_id)
            .ok_or_else(|| StoreError::ConversationNotFound(conversation_id.to_string()))?;
        let slot = conversation
            .messages
            .iter_mut()
            .find(|m| m.id == message.id)
            .ok_or_else(|| StoreError::MessageNotFound(message.id.clone()))?;
        *slot = message;
        Ok(())
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError> {
        let guard = self.conversations.read().await;
        Ok(guard
            .get(conversation_id)
            .map(|c| c.messages.clone())
            .unwrap_or_default())
    }

    async fn title(&self, conversation_id: &str) -> Result<Option<String>, StoreError> {
        let guard = self.conversations.read().await;
        Ok(guard.get(conversation_id).and_then(|c| c.title.clone()))
    }

    async fn set_title(&self, conversation_id: &str, title: &str) -> Result<(), StoreError> {
        let mut guard = self.conversations.write().await;
        guard
            .entry(conversation_id.to_string())
            .or_default()
            .title = Some(title.to_string());
        Ok(())
    }
}

#[async_trait::async_trait]
impl AppStore for MemoryStore {
    async fn list_apps(&self) -> Result<Vec<SavedApp>, StoreError> {
        let guard = self.apps.read().await;
        let mut apps: Vec<SavedApp> = guard.values().cloned().collect();
        apps.sort_by_key(|a| a.updated_at);
        Ok(apps)
    }

    async fn get_app(&self, id: &str) -> Result<Option<SavedApp>, StoreError> {
        let guard = self.apps.read().await;
        Ok(guard.get(id).cloned())
    }

    async fn save_app(&self, app: SavedApp) -> Result<(), StoreError> {
        let mut guard = self.apps.write().await;
        guard.insert(app.id.clone(), app);
        Ok(())
    }
}
