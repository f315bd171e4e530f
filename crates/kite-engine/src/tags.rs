//! Tool-result summarization policy: what reaches the running context as
//! message text versus what stays in tag detail.

use once_cell::sync::Lazy;
use regex::Regex;

/// Character budget for a tool result quoted in a round-summary message.
/// The full text always lives in the tag detail.
pub const RESULT_SUMMARY_MAX: usize = 600;

pub fn truncate_for_summary(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= RESULT_SUMMARY_MAX {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(RESULT_SUMMARY_MAX).collect();
    format!("{cut}…")
}

static API_ERROR_SIGNALS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)
        \bhttp\s*/?\s*[1-5]\d\d\b |
        \bstatus\s*(code)?\s*[:=]?\s*[1-5]\d\d\b |
        \brate.?limit | \bunauthorized\b | \bforbidden\b |
        \binvalid\s+api\s+key | \bquota\b | \btimed?\s*out\b",
    )
    .unwrap()
});

/// Default policy for deciding whether an error string is an explicit API
/// error (safe and useful to quote in the transcript summary) rather than an
/// ambiguous internal failure (kept to tag detail only).
///
/// Heuristic by nature: structured `{"error": …}` payloads and
/// HTTP-status-like signals qualify, bare exception text does not.
pub fn looks_like_api_error(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if value.get("error").is_some() || value.get("error_code").is_some() {
            return true;
        }
    }
    API_ERROR_SIGNALS.is_match(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_appends_ellipsis() {
        let long = "x".repeat(RESULT_SUMMARY_MAX + 50);
        let out = truncate_for_summary(&long);
        assert_eq!(out.chars().count(), RESULT_SUMMARY_MAX + 1);
        assert!(out.ends_with('…'));

        assert_eq!(truncate_for_summary("  short  "), "short");
    }

    #[test]
    fn structured_error_payloads_qualify() {
        assert!(looks_like_api_error(r#"{"error": {"message": "boom"}}"#));
        assert!(looks_like_api_error("HTTP 503 Service Unavailable"));
        assert!(looks_like_api_error("status code 429"));
        assert!(looks_like_api_error("rate limit exceeded"));
    }

    #[test]
    fn bare_failures_do_not_qualify() {
        assert!(!looks_like_api_error("NullPointerException at line 3"));
        assert!(!looks_like_api_error("connection reset by peer"));
        assert!(!looks_like_api_error(""));
    }
}
