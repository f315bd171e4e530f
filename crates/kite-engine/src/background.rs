//! Detached follow-up tasks that run after a turn is persisted: conversation
//! titling and memory extraction. Both are best-effort; failures are logged
//! and dropped, never surfaced to the turn.

use std::sync::Arc;

use futures::StreamExt;

use kite_provider::{ChatMessage, ChatRequest, ChatStreamClient, ProviderConfig};
use kite_store::ConversationStore;
use kite_types::{MessageTag, TagKind, TagStatus};

use crate::prompts;

pub struct FollowupInput {
    pub conversation_id: String,
    pub user_text: String,
    pub answer_text: String,
    pub assistant_message_id: String,
}

pub fn spawn_followups<C, S>(
    client: Arc<C>,
    store: Arc<S>,
    provider: ProviderConfig,
    model_id: String,
    input: FollowupInput,
) where
    C: ChatStreamClient + 'static,
    S: ConversationStore + 'static,
{
    tokio::spawn(async move {
        maybe_set_title(&*client, &*store, &provider, &model_id, &input).await;
        maybe_record_memory(&*client, &*store, &provider, &model_id, &input).await;
    });
}

async fn maybe_set_title(
    client: &dyn ChatStreamClient,
    store: &dyn ConversationStore,
    provider: &ProviderConfig,
    model_id: &str,
    input: &FollowupInput,
) {
    match store.title(&input.conversation_id).await {
        Ok(None) => {}
        Ok(Some(_)) => return,
        Err(err) => {
            tracing::debug!(error = %err, "title lookup failed");
            return;
        }
    }
    let prompt = prompts::title_prompt(&input.user_text, &input.answer_text);
    let Some(raw) = collect_completion(client, provider, model_id, prompt).await else {
        return;
    };
    let title = sanitize_title(&raw);
    if title.is_empty() {
        return;
    }
    if let Err(err) = store.set_title(&input.conversation_id, &title).await {
        tracing::debug!(error = %err, "saving title failed");
    }
}

async fn maybe_record_memory(
    client: &dyn ChatStreamClient,
    store: &dyn ConversationStore,
    provider: &ProviderConfig,
    model_id: &str,
    input: &FollowupInput,
) {
    let prompt = prompts::memory_prompt(&input.user_text, &input.answer_text);
    let Some(fact) = collect_completion(client, provider, model_id, prompt).await else {
        return;
    };
    if fact.eq_ignore_ascii_case("none") {
        return;
    }

    let messages = match store.messages(&input.conversation_id).await {
        Ok(messages) => messages,
        Err(err) => {
            tracing::debug!(error = %err, "loading messages for memory tag failed");
            return;
        }
    };
    let Some(mut message) = messages
        .into_iter()
        .find(|m| m.id == input.assistant_message_id)
    else {
        return;
    };
    let mut tag = MessageTag::running(TagKind::Memory, "Memory", "");
    tag.finish(TagStatus::Success, fact);
    message.tags.push(tag);
    if let Err(err) = store.update_message(&input.conversation_id, message).await {
        tracing::debug!(error = %err, "attaching memory tag failed");
    }
}

/// Run a one-shot completion and concatenate its content deltas.
async fn collect_completion(
    client: &dyn ChatStreamClient,
    provider: &ProviderConfig,
    model_id: &str,
    prompt: String,
) -> Option<String> {
    let request =
        ChatRequest::new(model_id, vec![ChatMessage::user(prompt)]).with_max_tokens(200);
    let mut stream = match client.stream_completions(provider, request).await {
        Ok(stream) => stream,
        Err(err) => {
            tracing::debug!(error = %err, "follow-up completion failed to start");
            return None;
        }
    };
    let mut text = String::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(delta) => {
                if let Some(content) = delta.content {
                    text.push_str(&content);
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, "follow-up completion stream failed");
                return None;
            }
        }
    }
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// First line, quotes stripped, capped at six words.
fn sanitize_title(raw: &str) -> String {
    let line = raw
        .lines()
        .next()
        .unwrap_or("")
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '“' || c == '”')
        .trim();
    line.split_whitespace()
        .take(6)
        .collect::<Vec<_>>()
        .join(" ")
}
