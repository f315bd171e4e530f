//! Edit-mode target resolution against the saved-app list.

use kite_types::{AppDevToolSpec, SavedApp};

/// Resolve the app an edit-mode call refers to.
///
/// Order: exact id (with `latest`/`last` sentinels meaning the most recently
/// updated app), exact name, unique case-insensitive substring of the name,
/// then a single-app fallback. Returns `None` when nothing matches or a
/// substring match is ambiguous.
pub fn resolve_target(spec: &AppDevToolSpec, apps: &[SavedApp]) -> Option<SavedApp> {
    if apps.is_empty() {
        return None;
    }

    if let Some(id) = spec.target_app_id.as_deref().map(str::trim) {
        if !id.is_empty() {
            if id.eq_ignore_ascii_case("latest") || id.eq_ignore_ascii_case("last") {
                return apps.iter().max_by_key(|a| a.updated_at).cloned();
            }
            if let Some(app) = apps.iter().find(|a| a.id == id) {
                return Some(app.clone());
            }
        }
    }

    if let Some(name) = spec.target_app_name.as_deref().map(str::trim) {
        if !name.is_empty() {
            if let Some(app) = apps.iter().find(|a| a.name == name) {
                return Some(app.clone());
            }

            let needle = name.to_lowercase();
            let mut matches = apps
                .iter()
                .filter(|a| a.name.to_lowercase().contains(&needle));
            if let (Some(app), None) = (matches.next(), matches.next()) {
                return Some(app.clone());
            }
        }
    }

    if apps.len() == 1 {
        return Some(apps[0].clone());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use kite_types::AppDevMode;

    fn app(id: &str, name: &str, updated_at: i64) -> SavedApp {
        let mut app = SavedApp::new(name, "", "<html></html>");
        app.id = id.to_string();
        app.updated_at = updated_at;
        app
    }

    fn edit_spec(id: Option<&str>, name: Option<&str>) -> AppDevToolSpec {
        AppDevToolSpec {
            mode: AppDevMode::Edit,
            name: String::new(),
            description: String::new(),
            style: String::new(),
            features: vec![],
            target_app_id: id.map(str::to_string),
            target_app_name: name.map(str::to_string),
            edit_request: Some("change it".to_string()),
        }
    }

    #[test]
    fn latest_sentinel_picks_most_recent() {
        // Scenario E.
        let apps = vec![app("a", "One", 1), app("b", "Two", 5)];
        let hit = resolve_target(&edit_spec(Some("latest"), None), &apps).unwrap();
        assert_eq!(hit.id, "b");
    }

    #[test]
    fn exact_id_beats_name() {
        let apps = vec![app("a", "Timer", 1), app("b", "Notes", 2)];
        let hit = resolve_target(&edit_spec(Some("a"), Some("Notes")), &apps).unwrap();
        assert_eq!(hit.id, "a");
    }

    #[test]
    fn unique_substring_matches_case_insensitively() {
        let apps = vec![app("a", "Pomodoro Timer", 1), app("b", "Notes", 2)];
        let hit = resolve_target(&edit_spec(None, Some("timer")), &apps).unwrap();
        assert_eq!(hit.id, "a");
    }

    #[test]
    fn ambiguous_substring_is_unresolved() {
        let apps = vec![app("a", "Timer A", 1), app("b", "Timer B", 2)];
        assert!(resolve_target(&edit_spec(None, Some("timer")), &apps).is_none());
    }

    #[test]
    fn single_app_fallback() {
        let apps = vec![app("a", "Only", 1)];
        let hit = resolve_target(&edit_spec(None, Some("unrelated")), &apps).unwrap();
        assert_eq!(hit.id, "a");
    }

    #[test]
    fn empty_list_is_unresolved() {
        assert!(resolve_target(&edit_spec(Some("latest"), None), &[]).is_none());
    }
}
