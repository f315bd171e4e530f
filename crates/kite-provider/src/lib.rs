//! Chat stream client contract and an OpenAI-compatible SSE implementation.
//!
//! The engine only depends on [`ChatStreamClient`]; tests drive it with
//! scripted streams instead of the network.

pub mod sse;

use std::collections::HashMap;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub use kite_types::Role;
pub use sse::SseChatClient;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider '{0}' has no API credentials configured")]
    MissingCredentials(String),

    #[error("model '{0}' not found on provider '{1}'")]
    ModelNotFound(String, String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("cancelled")]
    Cancelled,
}

/// One streamed delta from the model. Either side may be absent; reasoning
/// arrives separately on providers that expose a dedicated channel, while
/// others interleave `<think>` tags into `content`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatDelta {
    pub content: Option<String>,
    pub reasoning: Option<String>,
}

impl ChatDelta {
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            reasoning: None,
        }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            content: None,
            reasoning: Some(text.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Connection settings for one provider endpoint.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub id: String,
    pub name: String,
    /// Base URL up to but not including `/chat/completions`.
    pub base_url: String,
    pub api_key: Option<String>,
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u64>,
    /// Forwarded verbatim for providers that support it.
    pub reasoning_effort: Option<String>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            reasoning_effort: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_reasoning_effort(mut self, effort: impl Into<String>) -> Self {
        self.reasoning_effort = Some(effort.into());
        self
    }
}

pub type ChatDeltaStream = BoxStream<'static, Result<ChatDelta, ProviderError>>;

/// Delta-based streaming chat completion. The sequence ends naturally on
/// completion; the consumer cancels by dropping the stream.
#[async_trait::async_trait]
pub trait ChatStreamClient: Send + Sync {
    async fn stream_completions(
        &self,
        provider: &ProviderConfig,
        request: ChatRequest,
    ) -> Result<ChatDeltaStream, ProviderError>;
}
