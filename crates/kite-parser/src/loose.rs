//! Loose recovery tier: regex-based field extraction for payloads that are
//! not valid JSON (unquoted keys, single quotes, bare values). Best-effort,
//! recovers at most one call.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::{find_json_span, PlannedToolCall};

// Quoted (double or single) or bare value after a `key:` / `key=` separator.
const VALUE_PAT: &str = r#"(?:"([^"]*)"|'([^']*)'|([A-Za-z0-9_\-./]+))"#;

static TOOL_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"(?i)["']?(?:tool_?name|tool)["']?\s*[:=]\s*{VALUE_PAT}"#
    ))
    .unwrap()
});

// Bare `name` fallback, only consulted when no tool-prefixed key matched.
static NAME_FALLBACK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r#"(?i)["']?name["']?\s*[:=]\s*{VALUE_PAT}"#)).unwrap()
});

static SERVER_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"(?i)["']?(?:server_?id|server|mcp_?id)["']?\s*[:=]\s*{VALUE_PAT}"#
    ))
    .unwrap()
});

static ARGS_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)["']?(?:arguments|args|input|params|parameters)["']?\s*[:=]\s*"#).unwrap()
});

static VALUE_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r#"(?i)["']?value["']?\s*[:=]\s*{VALUE_PAT}"#)).unwrap()
});

// One `key: value` pair inside a loose object body.
static LOOSE_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["']?([A-Za-z0-9_\-]+)["']?\s*[:=]\s*(?:"((?:[^"\\]|\\.)*)"|'([^']*)'|([^,{}\n]+))"#)
        .unwrap()
});

fn captured_value(caps: &regex::Captures<'_>) -> Option<String> {
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().trim().to_string())
}

/// Best-effort single-call recovery from malformed payload text.
pub fn loose_field_extraction(raw: &str) -> Option<PlannedToolCall> {
    let tool_name = TOOL_NAME
        .captures(raw)
        .or_else(|| NAME_FALLBACK.captures(raw))
        .and_then(|caps| captured_value(&caps))
        .filter(|name| !name.is_empty())?;

    let server_id = SERVER_ID
        .captures(raw)
        .and_then(|caps| captured_value(&caps))
        .unwrap_or_default();

    let arguments = extract_arguments(raw).unwrap_or_default();

    Some(PlannedToolCall {
        server_id,
        tool_name,
        arguments,
    })
}

/// Recover the arguments object: brace-match after an arguments key, parse
/// strictly if possible, else field-by-field; with no arguments object at
/// all, fall back to a single `value` field.
fn extract_arguments(raw: &str) -> Option<Map<String, Value>> {
    if let Some(m) = ARGS_KEY.find(raw) {
        let rest = &raw[m.end()..];
        if rest.trim_start().starts_with('{') {
            if let Some((start, end)) = find_json_span(rest) {
                let span = &rest[start..end];
                if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(span) {
                    return Some(map);
                }
                return Some(loose_object_fields(span));
            }
        }
    }

    VALUE_FIELD.captures(raw).and_then(|caps| {
        captured_value(&caps).map(|v| {
            let mut map = Map::new();
            map.insert("value".to_string(), coerce_scalar(&v));
            map
        })
    })
}

/// Field-by-field extraction inside a brace span that failed strict parsing.
fn loose_object_fields(span: &str) -> Map<String, Value> {
    let body = span
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}');

    let mut map = Map::new();
    for caps in LOOSE_PAIR.captures_iter(body) {
        let key = caps.get(1).map(|m| m.as_str().to_string());
        // Double-quoted bodies may carry backslash escapes; bare and
        // single-quoted bodies are taken literally.
        let value = match (caps.get(2), caps.get(3), caps.get(4)) {
            (Some(m), _, _) => Some(Value::String(unescape(m.as_str()))),
            (_, Some(m), _) => Some(Value::String(m.as_str().to_string())),
            (_, _, Some(m)) => Some(coerce_scalar(m.as_str().trim())),
            _ => None,
        };
        if let (Some(key), Some(value)) = (key, value) {
            map.insert(key, value);
        }
    }
    map
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Bare values keep their JSON type where obvious.
fn coerce_scalar(text: &str) -> Value {
    match text {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    if let Ok(n) = text.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(f) = text.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unquoted_keys_and_bare_value() {
        // The canonical loose-recovery case.
        let call = loose_field_extraction(r#"{toolName: search, arguments: {q: "cats"}}"#)
            .expect("recovered");
        assert_eq!(call.tool_name, "search");
        assert_eq!(call.arguments.get("q"), Some(&json!("cats")));
    }

    #[test]
    fn reachable_through_public_parse() {
        let calls = crate::parse(r#"{toolName: search, arguments: {q: "cats"}}"#);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool_name, "search");
    }

    #[test]
    fn single_quoted_values() {
        let call = loose_field_extraction("{tool: 'read_file', server: 'fs'}").unwrap();
        assert_eq!(call.tool_name, "read_file");
        assert_eq!(call.server_id, "fs");
    }

    #[test]
    fn name_fallback_only_without_tool_key() {
        let call = loose_field_extraction("{name: lookup}").unwrap();
        assert_eq!(call.tool_name, "lookup");
    }

    #[test]
    fn nested_arguments_with_escaped_quotes() {
        let call =
            loose_field_extraction(r#"toolName: t, arguments: {"msg": "say \"hi\"", n: 2}"#)
                .unwrap();
        assert_eq!(call.arguments.get("msg"), Some(&json!("say \"hi\"")));
        assert_eq!(call.arguments.get("n"), Some(&json!(2)));
    }

    #[test]
    fn value_field_fallback() {
        let call = loose_field_extraction("tool: echo, value: hello").unwrap();
        assert_eq!(call.arguments.get("value"), Some(&json!("hello")));
    }

    #[test]
    fn scalar_coercion_in_loose_objects() {
        let map = loose_object_fields("{a: 1, b: true, c: 2.5, d: plain}");
        assert_eq!(map.get("a"), Some(&json!(1)));
        assert_eq!(map.get("b"), Some(&json!(true)));
        assert_eq!(map.get("c"), Some(&json!(2.5)));
        assert_eq!(map.get("d"), Some(&json!("plain")));
    }

    #[test]
    fn nothing_recoverable_yields_none() {
        assert!(loose_field_extraction("just prose, no fields").is_none());
    }
}
