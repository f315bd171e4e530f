//! Output normalization for streamed HTML.

/// Strip markdown code fences (```html … ``` or bare ``` … ```), keeping the
/// inner text. Fences may be incomplete while a draft is still streaming.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the info string (e.g. "html") up to the first newline.
    let body = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => return String::new(),
    };
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim().to_string()
}

pub fn looks_like_document(html: &str) -> bool {
    let head: String = html
        .trim_start()
        .chars()
        .take(200)
        .collect::<String>()
        .to_lowercase();
    head.starts_with("<!doctype html") || head.contains("<html")
}

/// Wrap a fragment in minimal boilerplate unless it is already a full
/// document.
pub fn ensure_full_document(html: &str, title: &str) -> String {
    if looks_like_document(html) {
        return html.to_string();
    }
    format!(
        "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n<title>{title}</title>\n</head>\n<body>\n{html}\n</body>\n</html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fenced_html() {
        let out = strip_code_fences("```html\n<div>x</div>\n```");
        assert_eq!(out, "<div>x</div>");
    }

    #[test]
    fn strips_bare_fence_without_close() {
        // Mid-stream draft: the closing fence has not arrived yet.
        let out = strip_code_fences("```html\n<div>partial");
        assert_eq!(out, "<div>partial");
    }

    #[test]
    fn unfenced_text_passes_through() {
        assert_eq!(strip_code_fences("  <p>hi</p> "), "<p>hi</p>");
    }

    #[test]
    fn wraps_fragments_only() {
        let wrapped = ensure_full_document("<div>x</div>", "Timer");
        assert!(wrapped.starts_with("<!doctype html>"));
        assert!(wrapped.contains("<title>Timer</title>"));

        let full = "<!DOCTYPE HTML><html><body></body></html>";
        assert_eq!(ensure_full_document(full, "t"), full);
    }
}
