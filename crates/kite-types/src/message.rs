use serde::{Deserialize, Serialize};

use crate::tag::MessageTag;
use crate::{new_id, now_millis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Reference to an image attached to a user message. Encoding and upload are
/// handled by the platform layer; the engine only carries the reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
}

/// One turn in a conversation.
///
/// While a turn is streaming, the owning engine mutates `content`,
/// `reasoning` and `tags` in place; once persisted the message is only
/// changed through explicit edit/delete operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<MessageTag>,
    pub created_at: i64,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role,
            content: content.into(),
            reasoning: None,
            attachments: Vec::new(),
            tags: Vec::new(),
            created_at: now_millis(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Find a tag by id, mutably. Tags are append-only during a turn, so the
    /// id is stable once the tag has been pushed.
    pub fn tag_mut(&mut self, tag_id: &str) -> Option<&mut MessageTag> {
        self.tags.iter_mut().find(|t| t.id == tag_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_roundtrips_through_json() {
        let mut msg = Message::assistant("hello");
        msg.reasoning = Some("thought about it".to_string());

        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();

        assert_eq!(back.id, msg.id);
        assert_eq!(back.content, "hello");
        assert_eq!(back.reasoning.as_deref(), Some("thought about it"));
        assert!(back.tags.is_empty());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }
}
