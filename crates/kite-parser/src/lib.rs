//! Tool-call payload parsing.
//!
//! Raw text extracted from `<mcp_call>`/`<tool_call>` blocks arrives in many
//! shapes: a single call object, an object wrapping calls under a key, an
//! array, arguments nested under several key spellings (possibly themselves
//! JSON-encoded strings), and frequently malformed JSON. Parsing is a
//! two-tier strategy: [`strict_json_parse`] over the first JSON span, then
//! [`loose::loose_field_extraction`] for regex-based recovery.

pub mod loose;

use serde_json::{Map, Value};
use std::collections::HashSet;

const WRAPPER_KEYS: [&str; 6] = ["calls", "mcp_call", "tool_call", "call", "toolCall", "mcpCall"];
const NAME_KEYS: [&str; 4] = ["toolName", "tool_name", "tool", "name"];
const SERVER_KEYS: [&str; 6] = ["serverId", "server_id", "server", "mcpId", "mcp_id", "id"];
const ARG_KEYS: [&str; 5] = ["arguments", "args", "input", "params", "parameters"];

/// Parsed, normalized representation of one tool invocation request.
/// Ephemeral: constructed per round, never persisted directly.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedToolCall {
    /// May be empty; resolved against enabled servers at dispatch time.
    pub server_id: String,
    /// Always non-empty after filtering.
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

impl PlannedToolCall {
    /// Normalized dedup key: lowercased `serverId|toolName|sorted k=v pairs`,
    /// case-insensitive on both keys and values.
    pub fn signature(&self) -> String {
        let mut pairs: Vec<String> = self
            .arguments
            .iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                format!("{}={}", k.to_lowercase(), v.to_lowercase())
            })
            .collect();
        pairs.sort();
        format!(
            "{}|{}|{}",
            self.server_id.to_lowercase(),
            self.tool_name.to_lowercase(),
            pairs.join(",")
        )
    }

    /// Canonical JSON form, used when echoing a call back into context.
    pub fn to_json_value(&self) -> Value {
        serde_json::json!({
            "serverId": self.server_id,
            "toolName": self.tool_name,
            "arguments": Value::Object(self.arguments.clone()),
        })
    }
}

/// Serialize a call list in the array-wrapped wire form.
pub fn serialize_calls(calls: &[PlannedToolCall]) -> String {
    let items: Vec<Value> = calls.iter().map(PlannedToolCall::to_json_value).collect();
    serde_json::to_string(&Value::Array(items)).unwrap_or_else(|_| "[]".to_string())
}

/// Parse raw extracted text into planned calls.
///
/// The strict tier parses the first `{...}`/`[...]` span; when it yields no
/// valid call (or no span parses), the loose tier attempts a best-effort
/// single-call recovery. Blank tool names are dropped and all string fields
/// trimmed; calls are returned in encounter order.
pub fn parse(raw: &str) -> Vec<PlannedToolCall> {
    let calls = strict_json_parse(raw);
    if !calls.is_empty() {
        return calls;
    }
    loose::loose_field_extraction(raw).into_iter().collect()
}

/// Drop calls whose signature was already seen, recording new ones.
pub fn dedup_by_signature(
    calls: Vec<PlannedToolCall>,
    seen: &mut HashSet<String>,
) -> Vec<PlannedToolCall> {
    calls
        .into_iter()
        .filter(|call| seen.insert(call.signature()))
        .collect()
}

// ---------------------------------------------------------------------------
// Strict tier
// ---------------------------------------------------------------------------

/// Attempt a full JSON parse of the first object/array span in the text.
pub fn strict_json_parse(raw: &str) -> Vec<PlannedToolCall> {
    let Some((start, end)) = find_json_span(raw) else {
        return Vec::new();
    };
    let Ok(value) = serde_json::from_str::<Value>(&raw[start..end]) else {
        return Vec::new();
    };
    collect_calls(&value)
}

fn collect_calls(value: &Value) -> Vec<PlannedToolCall> {
    match value {
        Value::Array(items) => items.iter().filter_map(call_from_value).collect(),
        Value::Object(map) => {
            for key in WRAPPER_KEYS {
                if let Some(inner) = map.get(key) {
                    if inner.is_object() || inner.is_array() {
                        let calls = collect_calls(inner);
                        if !calls.is_empty() {
                            return calls;
                        }
                    }
                }
            }
            call_from_value(value).into_iter().collect()
        }
        _ => Vec::new(),
    }
}

fn call_from_value(value: &Value) -> Option<PlannedToolCall> {
    let map = value.as_object()?;

    let tool_name = NAME_KEYS
        .iter()
        .filter_map(|k| map.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())?
        .to_string();

    let server_id = SERVER_KEYS
        .iter()
        .filter_map(|k| map.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or("")
        .to_string();

    let arguments = ARG_KEYS
        .iter()
        .filter_map(|k| map.get(*k))
        .find_map(arguments_from_value)
        .unwrap_or_default();

    Some(PlannedToolCall {
        server_id,
        tool_name,
        arguments: trim_string_values(arguments),
    })
}

/// Arguments may be a plain object, a JSON-encoded string, or a bare scalar.
fn arguments_from_value(value: &Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map.clone()),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
                Some(map)
            } else if trimmed.is_empty() {
                Some(Map::new())
            } else {
                let mut map = Map::new();
                map.insert("value".to_string(), Value::String(trimmed.to_string()));
                Some(map)
            }
        }
        Value::Null => Some(Map::new()),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other.clone());
            Some(map)
        }
    }
}

fn trim_string_values(mut map: Map<String, Value>) -> Map<String, Value> {
    for value in map.values_mut() {
        if let Value::String(s) = value {
            *value = Value::String(s.trim().to_string());
        }
    }
    map
}

/// Locate the first balanced `{...}` or `[...]` span, respecting string
/// literals and backslash escapes.
pub fn find_json_span(text: &str) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(|&b| b == b'{' || b == b'[')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some((start, i + 1));
                }
            }
            _ => {}
        }
    }
    None
}
