use serde::{Deserialize, Serialize};

use crate::{new_id, now_millis};

/// A persisted mini-app produced by the app-developer tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedApp {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub html: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SavedApp {
    pub fn new(name: impl Into<String>, description: impl Into<String>, html: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: new_id(),
            name: name.into(),
            description: description.into(),
            html: html.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppDevMode {
    #[default]
    Create,
    Edit,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SpecValidationError {
    #[error("create mode requires a name")]
    MissingName,

    #[error("create mode requires a description")]
    MissingDescription,

    #[error("create mode requires a style")]
    MissingStyle,

    #[error("create mode requires at least one feature")]
    MissingFeatures,

    #[error("edit mode requires a non-blank edit request")]
    MissingEditRequest,

    #[error("edit mode requires a target app id or name")]
    MissingEditTarget,
}

/// Validated specification for one app-developer tool call, parsed out of
/// the model's tool-call arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppDevToolSpec {
    #[serde(default)]
    pub mode: AppDevMode,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub features: Vec<String>,
    // Aliases accept the camelCase spellings models tend to emit.
    #[serde(default, alias = "targetAppId", skip_serializing_if = "Option::is_none")]
    pub target_app_id: Option<String>,
    #[serde(default, alias = "targetAppName", skip_serializing_if = "Option::is_none")]
    pub target_app_name: Option<String>,
    #[serde(default, alias = "editRequest", skip_serializing_if = "Option::is_none")]
    pub edit_request: Option<String>,
}

impl AppDevToolSpec {
    pub fn validate(&self) -> Result<(), SpecValidationError> {
        match self.mode {
            AppDevMode::Create => {
                if self.name.trim().is_empty() {
                    return Err(SpecValidationError::MissingName);
                }
                if self.description.trim().is_empty() {
                    return Err(SpecValidationError::MissingDescription);
                }
                if self.style.trim().is_empty() {
                    return Err(SpecValidationError::MissingStyle);
                }
                if self.features.iter().all(|f| f.trim().is_empty()) {
                    return Err(SpecValidationError::MissingFeatures);
                }
            }
            AppDevMode::Edit => {
                if self
                    .edit_request
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or("")
                    .is_empty()
                {
                    return Err(SpecValidationError::MissingEditRequest);
                }
                let has_target = self
                    .target_app_id
                    .as_deref()
                    .map(str::trim)
                    .is_some_and(|t| !t.is_empty())
                    || self
                        .target_app_name
                        .as_deref()
                        .map(str::trim)
                        .is_some_and(|t| !t.is_empty());
                if !has_target {
                    return Err(SpecValidationError::MissingEditTarget);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_spec() -> AppDevToolSpec {
        AppDevToolSpec {
            mode: AppDevMode::Create,
            name: "Timer".to_string(),
            description: "A countdown timer".to_string(),
            style: "minimal".to_string(),
            features: vec!["start/stop".to_string()],
            target_app_id: None,
            target_app_name: None,
            edit_request: None,
        }
    }

    #[test]
    fn create_spec_validates() {
        assert_eq!(create_spec().validate(), Ok(()));
    }

    #[test]
    fn create_spec_requires_features() {
        let mut spec = create_spec();
        spec.features = vec!["  ".to_string()];
        assert_eq!(spec.validate(), Err(SpecValidationError::MissingFeatures));
    }

    #[test]
    fn edit_spec_requires_request_and_target() {
        let spec = AppDevToolSpec {
            mode: AppDevMode::Edit,
            name: String::new(),
            description: String::new(),
            style: String::new(),
            features: vec![],
            target_app_id: None,
            target_app_name: None,
            edit_request: Some("  ".to_string()),
        };
        assert_eq!(spec.validate(), Err(SpecValidationError::MissingEditRequest));

        let spec = AppDevToolSpec {
            edit_request: Some("make it blue".to_string()),
            ..spec
        };
        assert_eq!(spec.validate(), Err(SpecValidationError::MissingEditTarget));

        let spec = AppDevToolSpec {
            target_app_name: Some("Timer".to_string()),
            ..spec
        };
        assert_eq!(spec.validate(), Ok(()));
    }
}
