//! The round orchestrator: drives a full user turn through streaming,
//! extraction, parsing, dispatch and persistence.
//!
//! A turn is at most `max_rounds` model streams. Each round's visible text
//! accumulates into one assistant message; tool calls become tags anchored
//! inline, and their results are fed back as system context for the next
//! round.

use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use kite_appdev::resolve::resolve_target;
use kite_appdev::{AppDevEngine, AppDevError, AppDevSink};
use kite_mcp::{McpClient, McpServerConfig, ToolCallRequest, ToolDescriptor};
use kite_parser::PlannedToolCall;
use kite_provider::{
    ChatMessage, ChatRequest, ChatStreamClient, ProviderConfig, ProviderError, Role,
};
use kite_store::{AppStore, ConversationStore};
use kite_stream::{CallExtractor, ThinkSplitter};
use kite_types::{
    now_millis, AppDevMode, AppDevTagPayload, AppDevToolSpec, McpTagDetail, Message, MessageTag,
    SavedApp, TagKind, TagStatus,
};

use crate::background::{self, FollowupInput};
use crate::budget::{RoundBudget, ToolMode, ToolPreference};
use crate::prompts;
use crate::tags::{looks_like_api_error, truncate_for_summary};
use crate::transcript;
use crate::turn::{TranscriptSink, TurnState};
use crate::EngineError;

/// Minimum interval between content pushes to the sink, unless a chunk burst
/// exceeds the char threshold first.
const CONTENT_THROTTLE_MS: i64 = 33;
const CONTENT_THROTTLE_CHARS: usize = 120;

/// Spellings models use for the built-in app-developer tool.
const APP_DEV_TOOL_NAMES: [&str; 4] =
    ["app_developer", "app-developer", "appdeveloper", "app_builder"];

fn is_app_dev_call(tool_name: &str) -> bool {
    APP_DEV_TOOL_NAMES
        .iter()
        .any(|n| n.eq_ignore_ascii_case(tool_name.trim()))
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub provider: ProviderConfig,
    pub model_id: String,
    /// Cheaper model for detached follow-ups (titles, memory). Falls back to
    /// the main model when absent.
    pub small_model_id: Option<String>,
    pub reasoning_effort: Option<String>,
}

/// Everything the engine needs to run one user turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub conversation_id: String,
    pub user_message: Message,
    pub preference: ToolPreference,
    pub servers: Vec<McpServerConfig>,
    pub app_dev_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Persisted assistant message, if any output survived.
    pub message_id: Option<String>,
    pub rounds_used: u32,
    pub cancelled: bool,
}

/// What one model stream produced after splitting and extraction.
#[derive(Debug, Default)]
struct RoundOutput {
    visible: String,
    thinking: String,
    blocks: Vec<String>,
    cancelled: bool,
}

pub struct ChatEngine<C, M, S> {
    client: Arc<C>,
    mcp: Arc<M>,
    store: Arc<S>,
    config: EngineConfig,
}

impl<C, M, S> ChatEngine<C, M, S>
where
    C: ChatStreamClient + 'static,
    M: McpClient + 'static,
    S: ConversationStore + AppStore + 'static,
{
    pub fn new(client: Arc<C>, mcp: Arc<M>, store: Arc<S>, config: EngineConfig) -> Self {
        Self {
            client,
            mcp,
            store,
            config,
        }
    }

    /// Run one full user turn. The user message is persisted up front; the
    /// assistant message is persisted once, at the end, fully assembled.
    pub async fn run_turn(
        &self,
        request: TurnRequest,
        sink: &dyn TranscriptSink,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, EngineError> {
        self.store
            .append_message(&request.conversation_id, request.user_message.clone())
            .await?;

        if self.config.model_id.trim().is_empty() {
            return self
                .finish_with_notice(
                    &request.conversation_id,
                    sink,
                    "No model is configured. Pick a model in settings and send the message again.",
                )
                .await;
        }

        let servers: Vec<McpServerConfig> = request
            .servers
            .iter()
            .filter(|s| s.enabled)
            .cloned()
            .collect();
        let mode = ToolMode::derive(request.preference, !servers.is_empty(), request.app_dev_enabled);
        let budget = RoundBudget::for_mode(mode);
        let allow_calls = budget.max_calls_per_round > 0;
        let app_dev_allowed = request.app_dev_enabled && allow_calls;

        tracing::debug!(
            conversation_id = %request.conversation_id,
            ?mode,
            max_rounds = budget.max_rounds,
            "starting turn"
        );

        let mut state = TurnState::new();
        let mut round_notes: Vec<ChatMessage> = Vec::new();
        let mut corrective_sent = false;
        let mut cancelled = false;

        'rounds: for round in 1..=budget.max_rounds {
            state.round = round;

            // Tool lists are fetched fresh every round; servers can come and
            // go between calls.
            let mut toolsets: Vec<(McpServerConfig, Vec<ToolDescriptor>)> = Vec::new();
            if allow_calls {
                for server in &servers {
                    match self.mcp.fetch_tools(server).await {
                        Ok(tools) => toolsets.push((server.clone(), tools)),
                        Err(err) => {
                            tracing::warn!(server_id = %server.id, error = %err, "tool listing failed")
                        }
                    }
                }
            }

            let messages = self
                .build_context(
                    &request.conversation_id,
                    app_dev_allowed,
                    &toolsets,
                    &state,
                    &round_notes,
                )
                .await?;
            let mut chat = ChatRequest::new(self.config.model_id.clone(), messages);
            if let Some(effort) = &self.config.reasoning_effort {
                chat = chat.with_reasoning_effort(effort.clone());
            }

            let round_out = match self.run_round(chat, allow_calls, &state, sink, &cancel).await {
                Ok(out) => out,
                Err(err) if state.has_output() => {
                    tracing::warn!(round, error = %err, "stream failed after partial output");
                    break 'rounds;
                }
                Err(ProviderError::MissingCredentials(provider)) => {
                    return self
                        .finish_with_notice(
                            &request.conversation_id,
                            sink,
                            &format!(
                                "The provider '{provider}' has no API key configured. Add one in settings and try again."
                            ),
                        )
                        .await;
                }
                Err(err) => {
                    return self
                        .finish_with_notice(
                            &request.conversation_id,
                            sink,
                            &format!("The model request failed: {err}"),
                        )
                        .await;
                }
            };

            state.merge_round_text(&round_out.visible, &round_out.thinking);
            sink.on_content_update(&state.visible, &state.thinking);
            if round_out.cancelled {
                cancelled = true;
                break 'rounds;
            }
            if !allow_calls {
                break;
            }

            let mut calls: Vec<PlannedToolCall> = Vec::new();
            state.raw_blocks.clear();
            for block in &round_out.blocks {
                let parsed = kite_parser::parse(block);
                if parsed.is_empty() {
                    state.raw_blocks.push(block.clone());
                } else {
                    calls.extend(parsed);
                }
            }
            let mut calls = kite_parser::dedup_by_signature(calls, &mut state.seen_signatures);
            calls.truncate(budget.max_calls_per_round);

            if calls.is_empty() {
                if !state.raw_blocks.is_empty() && !corrective_sent && round < budget.max_rounds {
                    corrective_sent = true;
                    round_notes.push(ChatMessage::system(prompts::corrective_message(
                        &state.raw_blocks[0],
                    )));
                    continue;
                }
                break;
            }

            let mut summaries = Vec::new();
            for call in &calls {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break 'rounds;
                }
                let summary = if app_dev_allowed && is_app_dev_call(&call.tool_name) {
                    self.dispatch_app_dev(call, &mut state, sink, &cancel).await
                } else {
                    self.dispatch_mcp(call, round, &toolsets, &mut state, sink)
                        .await
                };
                summaries.push(summary);
            }

            // A stop can also land while the round's last call is running;
            // catch it before paying for another stream.
            if cancel.is_cancelled() {
                cancelled = true;
                break 'rounds;
            }

            if round == budget.max_rounds {
                break;
            }
            round_notes.push(ChatMessage::system(format!(
                "Tool results:\n{}\n\nUse these results to answer the user. Call another tool only if something is still missing.",
                summaries.join("\n")
            )));
        }

        if !state.has_output() {
            return Ok(TurnOutcome {
                message_id: None,
                rounds_used: state.round,
                cancelled,
            });
        }

        let content = transcript::insert_markers(&state.visible, &state.anchors);
        let mut message = Message::assistant(content);
        if !state.thinking.trim().is_empty() {
            message.reasoning = Some(state.thinking.trim().to_string());
        }
        message.tags = state.tags.clone();
        self.store
            .append_message(&request.conversation_id, message.clone())
            .await?;
        sink.on_content_update(&state.visible, &state.thinking);

        if !cancelled {
            background::spawn_followups(
                self.client.clone(),
                self.store.clone(),
                self.config.provider.clone(),
                self.config
                    .small_model_id
                    .clone()
                    .unwrap_or_else(|| self.config.model_id.clone()),
                FollowupInput {
                    conversation_id: request.conversation_id.clone(),
                    user_text: request.user_message.content.clone(),
                    answer_text: state.visible.clone(),
                    assistant_message_id: message.id.clone(),
                },
            );
        }

        Ok(TurnOutcome {
            message_id: Some(message.id),
            rounds_used: state.round,
            cancelled,
        })
    }

    /// Persist a single explanatory assistant message in place of a turn
    /// that cannot run (missing model or credentials).
    async fn finish_with_notice(
        &self,
        conversation_id: &str,
        sink: &dyn TranscriptSink,
        text: &str,
    ) -> Result<TurnOutcome, EngineError> {
        let message = Message::assistant(text);
        self.store
            .append_message(conversation_id, message.clone())
            .await?;
        sink.on_content_update(text, "");
        Ok(TurnOutcome {
            message_id: Some(message.id),
            rounds_used: 0,
            cancelled: false,
        })
    }

    async fn build_context(
        &self,
        conversation_id: &str,
        app_dev_allowed: bool,
        toolsets: &[(McpServerConfig, Vec<ToolDescriptor>)],
        state: &TurnState,
        round_notes: &[ChatMessage],
    ) -> Result<Vec<ChatMessage>, EngineError> {
        let mut messages = Vec::new();
        if app_dev_allowed {
            messages.push(ChatMessage::system(prompts::APP_DEV_INSTRUCTION));
        }
        if let Some(instruction) = prompts::mcp_instruction(toolsets) {
            messages.push(ChatMessage::system(instruction));
        }
        for stored in self.store.messages(conversation_id).await? {
            let content = match stored.role {
                Role::Assistant => transcript::strip_markers(&stored.content),
                _ => stored.content,
            };
            if content.trim().is_empty() {
                continue;
            }
            messages.push(ChatMessage::new(stored.role, content));
        }
        if !state.visible.trim().is_empty() {
            messages.push(ChatMessage::assistant(state.visible.clone()));
        }
        messages.extend(round_notes.iter().cloned());
        Ok(messages)
    }

    /// Drive one model stream to completion (or early stop), classifying
    /// deltas into visible text, reasoning, and raw call blocks.
    async fn run_round(
        &self,
        request: ChatRequest,
        allow_calls: bool,
        state: &TurnState,
        sink: &dyn TranscriptSink,
        cancel: &CancellationToken,
    ) -> Result<RoundOutput, ProviderError> {
        let mut stream = self
            .client
            .stream_completions(&self.config.provider, request)
            .await?;

        let mut splitter = ThinkSplitter::new();
        // Call blocks can appear on either channel; each gets its own
        // extractor so held tails never mix.
        let mut visible_extractor = CallExtractor::new();
        let mut thinking_extractor = CallExtractor::new();
        let mut out = RoundOutput::default();
        let mut last_push = 0i64;
        let mut pending_chars = 0usize;

        while let Some(item) = stream.next().await {
            if cancel.is_cancelled() {
                out.cancelled = true;
                break;
            }
            let delta = match item {
                Ok(delta) => delta,
                Err(err) => {
                    tracing::warn!(error = %err, "stream error mid-round, keeping partial output");
                    break;
                }
            };

            if let Some(text) = delta.reasoning {
                pending_chars += text.chars().count();
                let extracted = thinking_extractor.push(&text);
                out.thinking.push_str(&extracted.passthrough);
                out.blocks.extend(extracted.blocks);
            }
            if let Some(text) = delta.content {
                pending_chars += text.chars().count();
                let split = splitter.push(&text);
                if !split.visible.is_empty() {
                    let extracted = visible_extractor.push(&split.visible);
                    out.visible.push_str(&extracted.passthrough);
                    out.blocks.extend(extracted.blocks);
                }
                if !split.thinking.is_empty() {
                    let extracted = thinking_extractor.push(&split.thinking);
                    out.thinking.push_str(&extracted.passthrough);
                    out.blocks.extend(extracted.blocks);
                }
            }

            let now = now_millis();
            if pending_chars >= CONTENT_THROTTLE_CHARS || now - last_push >= CONTENT_THROTTLE_MS {
                sink.on_content_update(
                    &join_text(&state.visible, &out.visible),
                    &join_text(&state.thinking, &out.thinking),
                );
                last_push = now;
                pending_chars = 0;
            }

            // Early stop: a complete, parseable call block with no further
            // open tag pending means the rest of the stream is noise.
            if allow_calls
                && !out.blocks.is_empty()
                && !visible_extractor.has_pending_open_tag()
                && !thinking_extractor.has_pending_open_tag()
                && out.blocks.iter().any(|b| !kite_parser::parse(b).is_empty())
            {
                break;
            }
        }

        let tail = splitter.finish();
        if !tail.visible.is_empty() {
            let extracted = visible_extractor.push(&tail.visible);
            out.visible.push_str(&extracted.passthrough);
            out.blocks.extend(extracted.blocks);
        }
        if !tail.thinking.is_empty() {
            let extracted = thinking_extractor.push(&tail.thinking);
            out.thinking.push_str(&extracted.passthrough);
            out.blocks.extend(extracted.blocks);
        }
        let flushed = visible_extractor.finish();
        out.visible.push_str(&flushed.passthrough);
        out.blocks.extend(flushed.blocks);
        let flushed = thinking_extractor.finish();
        out.thinking.push_str(&flushed.passthrough);
        out.blocks.extend(flushed.blocks);

        Ok(out)
    }

    /// Execute one MCP call: resolve the server, run the tool, record a tag,
    /// and return a one-line summary for the next round's context.
    async fn dispatch_mcp(
        &self,
        call: &PlannedToolCall,
        round: u32,
        toolsets: &[(McpServerConfig, Vec<ToolDescriptor>)],
        state: &mut TurnState,
        sink: &dyn TranscriptSink,
    ) -> String {
        let started = now_millis();
        let resolved = resolve_server(&call.server_id, &call.tool_name, toolsets);
        let mut detail = McpTagDetail {
            round,
            status: TagStatus::Running,
            server: resolved
                .as_ref()
                .map(|s| s.id.clone())
                .unwrap_or_else(|| call.server_id.clone()),
            tool: call.tool_name.clone(),
            attempts: 1,
            elapsed_ms: 0,
            arguments: Value::Object(call.arguments.clone()),
            result: None,
            error: None,
        };
        let tag = MessageTag::running(TagKind::Mcp, &call.tool_name, detail.format());
        let tag_id = tag.id.clone();
        sink.on_tag_appended(&tag);
        state.push_tag(tag);

        let Some(server) = resolved else {
            tracing::warn!(
                server_id = %call.server_id,
                tool_name = %call.tool_name,
                "no enabled server resolves this call"
            );
            detail.status = TagStatus::Error;
            detail.error = Some(format!(
                "no enabled server provides '{}'",
                call.tool_name
            ));
            finish_tag(state, sink, &tag_id, TagStatus::Error, detail.format());
            return format!("- {}: server unavailable", call.tool_name);
        };

        let outcome = self
            .mcp
            .call_tool(
                &server,
                ToolCallRequest {
                    tool_name: call.tool_name.clone(),
                    arguments: call.arguments.clone(),
                },
            )
            .await;
        detail.elapsed_ms = (now_millis() - started).max(0) as u64;

        match outcome {
            Ok(result) if result.success => {
                detail.status = TagStatus::Success;
                detail.result = Some(result.content.clone());
                finish_tag(state, sink, &tag_id, TagStatus::Success, detail.format());
                format!(
                    "- {} via {}: {}",
                    call.tool_name,
                    server.id,
                    truncate_for_summary(&result.content)
                )
            }
            Ok(result) => {
                let error = result
                    .error
                    .unwrap_or_else(|| "tool reported failure".to_string());
                detail.status = TagStatus::Error;
                detail.error = Some(error.clone());
                finish_tag(state, sink, &tag_id, TagStatus::Error, detail.format());
                // Ambiguous internal failures stay in the tag; only explicit
                // API errors are worth quoting back to the model.
                if looks_like_api_error(&error) {
                    format!(
                        "- {} via {} failed: {}",
                        call.tool_name,
                        server.id,
                        truncate_for_summary(&error)
                    )
                } else {
                    format!("- {} via {} failed", call.tool_name, server.id)
                }
            }
            Err(err) => {
                let error = err.to_string();
                detail.status = TagStatus::Error;
                detail.error = Some(error.clone());
                finish_tag(state, sink, &tag_id, TagStatus::Error, detail.format());
                format!("- {} via {} failed", call.tool_name, server.id)
            }
        }
    }

    /// Execute one app-developer call through the sub-engine, streaming live
    /// payload updates into the tag.
    async fn dispatch_app_dev(
        &self,
        call: &PlannedToolCall,
        state: &mut TurnState,
        sink: &dyn TranscriptSink,
        cancel: &CancellationToken,
    ) -> String {
        // Malformed arguments collapse to an empty spec; validation inside
        // the sub-engine then reports the concrete missing field.
        let mut spec: AppDevToolSpec =
            serde_json::from_value(Value::Object(call.arguments.clone())).unwrap_or_default();
        let title = if spec.name.trim().is_empty() {
            "App".to_string()
        } else {
            spec.name.clone()
        };

        let payload = AppDevTagPayload::started(&spec);
        let tag = MessageTag::running(TagKind::AppDev, &title, payload.to_json());
        let tag_id = tag.id.clone();
        sink.on_tag_appended(&tag);
        state.push_tag(tag.clone());

        let mut target: Option<SavedApp> = None;
        if spec.mode == AppDevMode::Edit {
            match self.store.list_apps().await {
                Ok(apps) => target = resolve_target(&spec, &apps),
                Err(err) => tracing::warn!(error = %err, "listing saved apps failed"),
            }
            match &target {
                // Resolution may land on the lone saved app even when the
                // call named no target; backfill the id so validation sees
                // a concrete target.
                Some(app) => spec.target_app_id = Some(app.id.clone()),
                None => {
                    let mut payload = payload;
                    payload.status = TagStatus::Error;
                    payload.progress = 0;
                    payload.error = Some("no saved app matches the edit target".to_string());
                    finish_tag(state, sink, &tag_id, TagStatus::Error, payload.to_json());
                    return format!("- {title}: no saved app matches the edit target");
                }
            }
        }

        let engine = AppDevEngine::new(
            self.client.clone(),
            self.config.provider.clone(),
            self.config.model_id.clone(),
        );
        let bridge = TagProgressBridge {
            base: tag,
            payload: std::sync::Mutex::new(payload),
            sink,
        };
        let result = match &target {
            Some(app) => engine.revise(&app.html, &spec, &bridge, cancel).await,
            None => engine.generate(&spec, &bridge, cancel).await,
        };
        let mut payload = bridge
            .payload
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match result {
            Ok(html) => {
                let app = match target {
                    Some(mut app) => {
                        app.html = html.clone();
                        app.updated_at = now_millis();
                        if !spec.description.trim().is_empty() {
                            app.description = spec.description.clone();
                        }
                        app
                    }
                    None => SavedApp::new(&title, &spec.description, &html),
                };
                payload.html = html;
                // Progress only reaches 100 once the app is actually saved.
                if let Err(err) = self.store.save_app(app.clone()).await {
                    tracing::warn!(app_id = %app.id, error = %err, "saving app failed");
                    payload.status = TagStatus::Error;
                    payload.error = Some(format!("saving app failed: {err}"));
                    finish_tag(state, sink, &tag_id, TagStatus::Error, payload.to_json());
                    return format!("- app '{}' generated but could not be saved", app.name);
                }
                payload.progress = 100;
                payload.status = TagStatus::Success;
                payload.source_app_id = Some(app.id.clone());
                finish_tag(state, sink, &tag_id, TagStatus::Success, payload.to_json());
                match spec.mode {
                    AppDevMode::Create => format!("- app '{}' created and saved", app.name),
                    AppDevMode::Edit => format!("- app '{}' updated", app.name),
                }
            }
            Err(AppDevError::Cancelled) => {
                payload.status = TagStatus::Error;
                payload.progress = 0;
                payload.error = Some("cancelled".to_string());
                finish_tag(state, sink, &tag_id, TagStatus::Error, payload.to_json());
                format!("- app '{title}' cancelled")
            }
            Err(err) => {
                payload.status = TagStatus::Error;
                payload.progress = 0;
                payload.error = Some(err.to_string());
                finish_tag(state, sink, &tag_id, TagStatus::Error, payload.to_json());
                format!("- app '{title}' failed: {err}")
            }
        }
    }
}

fn join_text(prefix: &str, current: &str) -> String {
    if prefix.is_empty() {
        current.to_string()
    } else if current.trim().is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}\n\n{}", current.trim_start())
    }
}

fn finish_tag(
    state: &mut TurnState,
    sink: &dyn TranscriptSink,
    tag_id: &str,
    status: TagStatus,
    content: String,
) {
    if let Some(tag) = state.tags.iter_mut().find(|t| t.id == tag_id) {
        tag.finish(status, content);
        sink.on_tag_updated(tag);
    }
}

/// Resolve the server a call targets: exact id, then name, then the unique
/// server advertising the tool.
fn resolve_server(
    server_id: &str,
    tool_name: &str,
    toolsets: &[(McpServerConfig, Vec<ToolDescriptor>)],
) -> Option<McpServerConfig> {
    let wanted = server_id.trim();
    if !wanted.is_empty() {
        if let Some((server, _)) = toolsets
            .iter()
            .find(|(s, _)| s.id.eq_ignore_ascii_case(wanted))
        {
            return Some(server.clone());
        }
        if let Some((server, _)) = toolsets
            .iter()
            .find(|(s, _)| s.name.eq_ignore_ascii_case(wanted))
        {
            return Some(server.clone());
        }
    }
    let mut providers = toolsets
        .iter()
        .filter(|(_, tools)| tools.iter().any(|t| t.name.eq_ignore_ascii_case(tool_name)));
    match (providers.next(), providers.next()) {
        (Some((server, _)), None) => Some(server.clone()),
        _ => None,
    }
}

/// Bridges the app-dev sub-engine's progress/draft callbacks into live tag
/// updates on the transcript sink.
struct TagProgressBridge<'a> {
    base: MessageTag,
    payload: std::sync::Mutex<AppDevTagPayload>,
    sink: &'a dyn TranscriptSink,
}

impl TagProgressBridge<'_> {
    fn emit(&self, payload: &AppDevTagPayload) {
        let mut tag = self.base.clone();
        tag.content = payload.to_json();
        self.sink.on_tag_updated(&tag);
    }
}

impl AppDevSink for TagProgressBridge<'_> {
    fn on_progress(&self, progress: u8) {
        let mut payload = self
            .payload
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        payload.progress = progress;
        self.emit(&payload);
    }

    fn on_draft(&self, html: &str) {
        let mut payload = self
            .payload
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        payload.html = html.to_string();
        self.emit(&payload);
    }
}
