//! Prompt construction for HTML generation and revision.
//!
//! Skill selection is a deterministic content rule: iOS-flavored keyword
//! signals in the spec pick the HIG instruction set, everything else gets
//! the general set. The model never chooses.

use kite_types::AppDevToolSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skill {
    GeneralHtml,
    IosHig,
}

const IOS_SIGNALS: [&str; 7] = [
    "ios", "cupertino", "apple", "iphone", "ipad", "hig", "sf symbols",
];

pub const GENERAL_HTML_SKILL: &str = "\
You are an expert front-end developer producing a single self-contained HTML file.
Rules:
- Emit exactly one complete HTML document: inline <style> and <script>, no external resources.
- Mobile-first layout, touch-friendly hit targets, responsive down to 320px width.
- No frameworks, no build steps, no network calls; everything must work offline in a WebView.
- Persist small amounts of state with localStorage where it improves the app.
- Output only the HTML document, with no commentary before or after.";

pub const IOS_HIG_SKILL: &str = "\
You are an expert front-end developer producing a single self-contained HTML file styled after the iOS 18 Human Interface Guidelines.
Rules:
- Emit exactly one complete HTML document: inline <style> and <script>, no external resources.
- Use the iOS visual language: SF-style system font stack, large titles, grouped inset lists, pill buttons, translucent bars, 12pt corner radii.
- Respect safe areas and support both light and dark color schemes via prefers-color-scheme.
- No frameworks, no build steps, no network calls; everything must work offline in a WebView.
- Output only the HTML document, with no commentary before or after.";

/// Pick the instruction set from keyword signals in the spec text.
pub fn select_skill(spec: &AppDevToolSpec) -> Skill {
    let mut haystack = format!(
        "{} {} {} {}",
        spec.style,
        spec.description,
        spec.features.join(" "),
        spec.edit_request.as_deref().unwrap_or(""),
    );
    haystack.make_ascii_lowercase();

    if IOS_SIGNALS.iter().any(|s| haystack.contains(s)) {
        Skill::IosHig
    } else {
        Skill::GeneralHtml
    }
}

pub fn skill_instructions(skill: Skill) -> &'static str {
    match skill {
        Skill::GeneralHtml => GENERAL_HTML_SKILL,
        Skill::IosHig => IOS_HIG_SKILL,
    }
}

/// User prompt for create mode.
pub fn build_create_prompt(spec: &AppDevToolSpec) -> String {
    let features = spec
        .features
        .iter()
        .map(|f| format!("- {f}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Build a mini-app.\nName: {}\nDescription: {}\nStyle: {}\nFeatures:\n{}",
        spec.name, spec.description, spec.style, features
    )
}

/// User prompt for edit mode: current document plus the requested change.
pub fn build_edit_prompt(current_html: &str, spec: &AppDevToolSpec) -> String {
    format!(
        "Revise the following mini-app. Apply this change and keep everything else working:\n{}\n\nCurrent document:\n{}",
        spec.edit_request.as_deref().unwrap_or(""),
        current_html
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use kite_types::AppDevMode;

    fn spec(style: &str, description: &str) -> AppDevToolSpec {
        AppDevToolSpec {
            mode: AppDevMode::Create,
            name: "Timer".to_string(),
            description: description.to_string(),
            style: style.to_string(),
            features: vec!["countdown".to_string()],
            target_app_id: None,
            target_app_name: None,
            edit_request: None,
        }
    }

    #[test]
    fn ios_keywords_pick_hig_skill() {
        assert_eq!(select_skill(&spec("Cupertino look", "")), Skill::IosHig);
        assert_eq!(select_skill(&spec("", "like an iPhone app")), Skill::IosHig);
        assert_eq!(select_skill(&spec("minimal", "a timer")), Skill::GeneralHtml);
    }

    #[test]
    fn edit_request_contributes_signals() {
        let mut s = spec("plain", "plain");
        s.edit_request = Some("restyle to match iOS 18".to_string());
        assert_eq!(select_skill(&s), Skill::IosHig);
    }

    #[test]
    fn create_prompt_lists_features() {
        let text = build_create_prompt(&spec("minimal", "counts down"));
        assert!(text.contains("Name: Timer"));
        assert!(text.contains("- countdown"));
    }
}
