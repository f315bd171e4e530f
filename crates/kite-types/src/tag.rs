use serde::{Deserialize, Serialize};

use crate::{new_id, now_millis};

// ---------------------------------------------------------------------------
// MessageTag — structured side-channel annotation on an assistant message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    Mcp,
    AppDev,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagStatus {
    Running,
    Success,
    Error,
}

impl TagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagStatus::Running => "running",
            TagStatus::Success => "success",
            TagStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "running" => Some(TagStatus::Running),
            "success" => Some(TagStatus::Success),
            "error" => Some(TagStatus::Error),
            _ => None,
        }
    }
}

/// One tool invocation (or memory event) attached to an assistant message.
///
/// Exactly one tag exists per tool call attempt. Tags are append-only during
/// a turn; only `status` and `content` are updated afterwards, keyed by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTag {
    pub id: String,
    pub kind: TagKind,
    pub title: String,
    /// Kind-specific serialized detail: a labeled text block for `mcp`
    /// (see [`McpTagDetail`]), JSON for `app_dev` ([`AppDevTagPayload`]).
    pub content: String,
    pub status: TagStatus,
    pub created_at: i64,
}

impl MessageTag {
    pub fn running(kind: TagKind, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            kind,
            title: title.into(),
            content: content.into(),
            status: TagStatus::Running,
            created_at: now_millis(),
        }
    }

    pub fn finish(&mut self, status: TagStatus, content: impl Into<String>) {
        self.status = status;
        self.content = content.into();
    }
}

// ---------------------------------------------------------------------------
// McpTagDetail — the labeled-field wire format inside `mcp` tag content
// ---------------------------------------------------------------------------

/// Detail block stored in an `mcp` tag's content.
///
/// Rendered as labeled lines with a fenced JSON `Arguments:` block and
/// optional trailing `Result:` / `Error:` sections. `format` and `parse`
/// round-trip losslessly for blocks produced by `format`: `Result:` runs
/// until an `Error:` line or the end of the block, `Error:` to the end.
/// A literal `Error:` line inside a result body ends it early.
#[derive(Debug, Clone, PartialEq)]
pub struct McpTagDetail {
    pub round: u32,
    pub status: TagStatus,
    pub server: String,
    pub tool: String,
    pub attempts: u32,
    pub elapsed_ms: u64,
    pub arguments: serde_json::Value,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl McpTagDetail {
    pub fn format(&self) -> String {
        let args = serde_json::to_string_pretty(&self.arguments)
            .unwrap_or_else(|_| "{}".to_string());
        let mut out = format!(
            "Round: {}\nStatus: {}\nServer: {}\nTool: {}\nAttempts: {}\nElapsed: {}ms\nArguments:\n```json\n{}\n```",
            self.round,
            self.status.as_str(),
            self.server,
            self.tool,
            self.attempts,
            self.elapsed_ms,
            args
        );
        if let Some(result) = &self.result {
            out.push_str("\nResult:\n");
            out.push_str(result);
        }
        if let Some(error) = &self.error {
            out.push_str("\nError:\n");
            out.push_str(error);
        }
        out
    }

    pub fn parse(text: &str) -> Option<Self> {
        fn labeled<'a>(line: &'a str, label: &str) -> Option<&'a str> {
            line.strip_prefix(label).map(str::trim)
        }

        let mut round = None;
        let mut status = None;
        let mut server = None;
        let mut tool = None;
        let mut attempts = None;
        let mut elapsed_ms = None;
        let mut arguments = serde_json::Value::Null;
        let mut result = None;
        let mut error = None;

        let mut lines = text.lines().peekable();
        while let Some(line) = lines.next() {
            if let Some(v) = labeled(line, "Round:") {
                round = v.parse().ok();
            } else if let Some(v) = labeled(line, "Status:") {
                status = TagStatus::parse(v);
            } else if let Some(v) = labeled(line, "Server:") {
                server = Some(v.to_string());
            } else if let Some(v) = labeled(line, "Tool:") {
                tool = Some(v.to_string());
            } else if let Some(v) = labeled(line, "Attempts:") {
                attempts = v.parse().ok();
            } else if let Some(v) = labeled(line, "Elapsed:") {
                elapsed_ms = v.trim_end_matches("ms").parse().ok();
            } else if line.trim() == "Arguments:" {
                // Fenced JSON block follows.
                if lines.peek().map(|l| l.trim().starts_with("```")) == Some(true) {
                    lines.next();
                    let mut body = Vec::new();
                    for inner in lines.by_ref() {
                        if inner.trim() == "```" {
                            break;
                        }
                        body.push(inner);
                    }
                    arguments = serde_json::from_str(&body.join("\n"))
                        .unwrap_or(serde_json::Value::Null);
                }
            } else if line.trim() == "Result:" {
                let mut body = Vec::new();
                while lines.peek().is_some_and(|l| l.trim() != "Error:") {
                    if let Some(inner) = lines.next() {
                        body.push(inner);
                    }
                }
                result = Some(body.join("\n"));
            } else if line.trim() == "Error:" {
                let rest: Vec<&str> = lines.by_ref().collect();
                error = Some(rest.join("\n"));
            }
        }

        Some(Self {
            round: round?,
            status: status?,
            server: server?,
            tool: tool?,
            attempts: attempts.unwrap_or(1),
            elapsed_ms: elapsed_ms.unwrap_or(0),
            arguments,
            result,
            error,
        })
    }
}

// ---------------------------------------------------------------------------
// AppDevTagPayload — JSON content of `app_dev` tags
// ---------------------------------------------------------------------------

/// Live/final state of an app-developer tool call, stored as JSON in the
/// tag's content and re-rendered by the UI on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDevTagPayload {
    pub name: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub features: Vec<String>,
    pub progress: u8,
    pub status: TagStatus,
    #[serde(default)]
    pub html: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_app_id: Option<String>,
    pub mode: crate::app::AppDevMode,
}

impl AppDevTagPayload {
    /// Initial payload for a freshly dispatched app-dev call.
    pub fn started(spec: &crate::app::AppDevToolSpec) -> Self {
        Self {
            name: spec.name.clone(),
            subtitle: String::new(),
            description: spec.description.clone(),
            style: spec.style.clone(),
            features: spec.features.clone(),
            progress: 8,
            status: TagStatus::Running,
            html: String::new(),
            error: None,
            source_app_id: spec.target_app_id.clone(),
            mode: spec.mode,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}
