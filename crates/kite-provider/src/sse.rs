//! OpenAI-compatible `/chat/completions` SSE client.

use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;

use crate::{ChatDelta, ChatDeltaStream, ChatRequest, ChatStreamClient, ProviderConfig, ProviderError};

pub struct SseChatClient {
    http: reqwest::Client,
}

impl Default for SseChatClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SseChatClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamFrame {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: FrameDelta,
}

#[derive(Debug, Default, Deserialize)]
struct FrameDelta {
    content: Option<String>,
    /// DeepSeek-style dedicated reasoning channel; some gateways use
    /// `reasoning` instead.
    reasoning_content: Option<String>,
    reasoning: Option<String>,
}

/// Parse one SSE `data:` payload into a delta. `[DONE]` and unrecognized
/// frames yield `None`.
pub(crate) fn parse_sse_data(data: &str) -> Option<ChatDelta> {
    if data.trim() == "[DONE]" {
        return None;
    }
    let frame: StreamFrame = serde_json::from_str(data).ok()?;
    let choice = frame.choices.into_iter().next()?;
    let reasoning = choice.delta.reasoning_content.or(choice.delta.reasoning);
    let delta = ChatDelta {
        content: choice.delta.content,
        reasoning,
    };
    if delta.content.is_none() && delta.reasoning.is_none() {
        return None;
    }
    Some(delta)
}

#[async_trait::async_trait]
impl ChatStreamClient for SseChatClient {
    async fn stream_completions(
        &self,
        provider: &ProviderConfig,
        request: ChatRequest,
    ) -> Result<ChatDeltaStream, ProviderError> {
        let api_key = provider
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::MissingCredentials(provider.name.clone()))?;

        let url = format!("{}/chat/completions", provider.base_url.trim_end_matches('/'));
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "stream": true,
        });
        if let Some(t) = request.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        if let Some(m) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(m);
        }
        if let Some(effort) = &request.reasoning_effort {
            body["reasoning_effort"] = serde_json::json!(effort);
        }

        let mut builder = self.http.post(&url).bearer_auth(api_key).json(&body);
        for (name, value) in &provider.headers {
            builder = builder.header(name, value);
        }

        let mut source = EventSource::new(builder)
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let provider_id = provider.id.clone();
        let (tx, rx) = tokio::sync::mpsc::channel(100);
        tokio::spawn(async move {
            while let Some(event) = source.next().await {
                match event {
                    Ok(Event::Open) => {}
                    Ok(Event::Message(msg)) => {
                        if msg.data.trim() == "[DONE]" {
                            break;
                        }
                        if let Some(delta) = parse_sse_data(&msg.data) {
                            if tx.send(Ok(delta)).await.is_err() {
                                // Consumer dropped the stream: cancellation.
                                break;
                            }
                        }
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => break,
                    Err(e) => {
                        tracing::warn!(provider_id = %provider_id, error = %e, "SSE stream error");
                        let _ = tx.send(Err(ProviderError::Stream(e.to_string()))).await;
                        break;
                    }
                }
            }
            source.close();
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_delta() {
        let delta = parse_sse_data(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#).unwrap();
        assert_eq!(delta.content.as_deref(), Some("Hi"));
        assert_eq!(delta.reasoning, None);
    }

    #[test]
    fn parses_reasoning_channels() {
        let a = parse_sse_data(r#"{"choices":[{"delta":{"reasoning_content":"hmm"}}]}"#).unwrap();
        assert_eq!(a.reasoning.as_deref(), Some("hmm"));

        let b = parse_sse_data(r#"{"choices":[{"delta":{"reasoning":"hm2"}}]}"#).unwrap();
        assert_eq!(b.reasoning.as_deref(), Some("hm2"));
    }

    #[test]
    fn done_and_empty_frames_yield_none() {
        assert!(parse_sse_data("[DONE]").is_none());
        assert!(parse_sse_data(r#"{"choices":[{"delta":{}}]}"#).is_none());
        assert!(parse_sse_data("not json").is_none());
    }
}
