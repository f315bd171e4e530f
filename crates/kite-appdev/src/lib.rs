//! App-developer sub-engine: streams HTML generation or revision for
//! mini-apps, with live progress estimation and throttled draft emission.

pub mod html;
pub mod progress;
pub mod prompts;
pub mod resolve;

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use kite_provider::{ChatMessage, ChatRequest, ChatStreamClient, ProviderConfig, ProviderError};
use kite_types::{AppDevToolSpec, SpecValidationError};

use html::{ensure_full_document, strip_code_fences};
use progress::ProgressEstimator;
use prompts::{build_create_prompt, build_edit_prompt, select_skill, skill_instructions};

/// Minimum interval between draft pushes. Tuning value; keeps the WebView
/// preview from re-rendering on every token.
const DRAFT_INTERVAL_MS: i64 = 170;

#[derive(Debug, thiserror::Error)]
pub enum AppDevError {
    #[error("invalid app spec: {0}")]
    Validation(#[from] SpecValidationError),

    #[error("edit mode requires the current app HTML")]
    MissingCurrentHtml,

    #[error("model produced no HTML output")]
    EmptyResult,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("cancelled")]
    Cancelled,
}

/// Live observer of one generation. Progress values are monotone in `[8,94]`
/// until completion; drafts arrive with code fences already stripped.
pub trait AppDevSink: Send + Sync {
    fn on_progress(&self, progress: u8);
    fn on_draft(&self, html: &str);
}

pub struct AppDevEngine<C> {
    client: Arc<C>,
    provider: ProviderConfig,
    model_id: String,
}

impl<C: ChatStreamClient> AppDevEngine<C> {
    pub fn new(client: Arc<C>, provider: ProviderConfig, model_id: impl Into<String>) -> Self {
        Self {
            client,
            provider,
            model_id: model_id.into(),
        }
    }

    /// Create-mode generation. Validates the spec, then streams a fresh
    /// document.
    pub async fn generate(
        &self,
        spec: &AppDevToolSpec,
        sink: &dyn AppDevSink,
        cancel: &CancellationToken,
    ) -> Result<String, AppDevError> {
        spec.validate()?;
        let system = skill_instructions(select_skill(spec));
        let prompt = build_create_prompt(spec);
        self.run_stream(system, prompt, &spec.name, sink, cancel)
            .await
    }

    /// Edit-mode revision of an existing document.
    pub async fn revise(
        &self,
        current_html: &str,
        spec: &AppDevToolSpec,
        sink: &dyn AppDevSink,
        cancel: &CancellationToken,
    ) -> Result<String, AppDevError> {
        spec.validate()?;
        if current_html.trim().is_empty() {
            return Err(AppDevError::MissingCurrentHtml);
        }
        let system = skill_instructions(select_skill(spec));
        let prompt = build_edit_prompt(current_html, spec);
        self.run_stream(system, prompt, &spec.name, sink, cancel)
            .await
    }

    async fn run_stream(
        &self,
        system: &str,
        prompt: String,
        title: &str,
        sink: &dyn AppDevSink,
        cancel: &CancellationToken,
    ) -> Result<String, AppDevError> {
        let request = ChatRequest::new(
            self.model_id.clone(),
            vec![ChatMessage::system(system), ChatMessage::user(prompt)],
        );
        let mut stream = self.client.stream_completions(&self.provider, request).await?;

        let mut estimator = ProgressEstimator::start();
        sink.on_progress(estimator.estimate());

        let mut text = String::new();
        let mut last_draft_at = 0i64;

        while let Some(item) = stream.next().await {
            if cancel.is_cancelled() {
                return Err(AppDevError::Cancelled);
            }
            let delta = item?;
            if let Some(chunk) = delta.content {
                estimator.record_chunk(chunk.chars().count());
                text.push_str(&chunk);
            }
            sink.on_progress(estimator.estimate());

            let now = chrono::Utc::now().timestamp_millis();
            if now - last_draft_at >= DRAFT_INTERVAL_MS && !text.is_empty() {
                sink.on_draft(&strip_code_fences(&text));
                last_draft_at = now;
            }
        }
        if cancel.is_cancelled() {
            return Err(AppDevError::Cancelled);
        }

        sink.on_progress(estimator.complete());

        let html = strip_code_fences(&text);
        if html.is_empty() {
            tracing::warn!(model_id = %self.model_id, "app-dev stream produced no output");
            return Err(AppDevError::EmptyResult);
        }
        let html = ensure_full_document(&html, title);
        sink.on_draft(&html);
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kite_provider::{ChatDelta, ChatDeltaStream};
    use kite_types::AppDevMode;
    use std::sync::Mutex;

    struct ScriptedClient {
        deltas: Vec<ChatDelta>,
    }

    #[async_trait::async_trait]
    impl ChatStreamClient for ScriptedClient {
        async fn stream_completions(
            &self,
            _provider: &ProviderConfig,
            _request: ChatRequest,
        ) -> Result<ChatDeltaStream, ProviderError> {
            let items: Vec<Result<ChatDelta, ProviderError>> =
                self.deltas.iter().cloned().map(Ok).collect();
            Ok(futures::stream::iter(items).boxed())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        progress: Mutex<Vec<u8>>,
        drafts: Mutex<Vec<String>>,
    }

    impl AppDevSink for RecordingSink {
        fn on_progress(&self, progress: u8) {
            self.progress.lock().unwrap().push(progress);
        }
        fn on_draft(&self, html: &str) {
            self.drafts.lock().unwrap().push(html.to_string());
        }
    }

    fn create_spec() -> AppDevToolSpec {
        AppDevToolSpec {
            mode: AppDevMode::Create,
            name: "Timer".to_string(),
            description: "counts down".to_string(),
            style: "minimal".to_string(),
            features: vec!["start".to_string()],
            target_app_id: None,
            target_app_name: None,
            edit_request: None,
        }
    }

    fn engine(deltas: Vec<ChatDelta>) -> AppDevEngine<ScriptedClient> {
        AppDevEngine::new(
            Arc::new(ScriptedClient { deltas }),
            ProviderConfig::default(),
            "test-model",
        )
    }

    #[tokio::test]
    async fn generate_produces_wrapped_document_and_monotone_progress() {
        let deltas = vec![
            ChatDelta::content("```html\n<div>"),
            ChatDelta::content("timer"),
            ChatDelta::content("</div>\n```"),
        ];
        let sink = RecordingSink::default();
        let html = engine(deltas)
            .generate(&create_spec(), &sink, &CancellationToken::new())
            .await
            .unwrap();

        assert!(html.starts_with("<!doctype html>"));
        assert!(html.contains("<div>timer</div>"));

        let progress = sink.progress.lock().unwrap().clone();
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*progress.first().unwrap(), progress::PROGRESS_FLOOR);
        assert_eq!(*progress.last().unwrap(), progress::PRE_COMPLETION_CAP);
    }

    #[tokio::test]
    async fn empty_stream_is_a_hard_failure() {
        let sink = RecordingSink::default();
        let err = engine(vec![])
            .generate(&create_spec(), &sink, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppDevError::EmptyResult));
    }

    #[tokio::test]
    async fn revise_requires_current_html() {
        let spec = AppDevToolSpec {
            mode: AppDevMode::Edit,
            edit_request: Some("make it blue".to_string()),
            target_app_id: Some("a".to_string()),
            ..create_spec()
        };
        let sink = RecordingSink::default();
        let err = engine(vec![ChatDelta::content("<p>x</p>")])
            .revise("   ", &spec, &sink, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppDevError::MissingCurrentHtml));
    }

    #[tokio::test]
    async fn cancellation_aborts_generation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let sink = RecordingSink::default();
        let err = engine(vec![ChatDelta::content("<p>x</p>")])
            .generate(&create_spec(), &sink, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AppDevError::Cancelled));
    }

    #[tokio::test]
    async fn full_document_output_is_not_rewrapped() {
        let deltas = vec![ChatDelta::content(
            "<!doctype html>\n<html><body>app</body></html>",
        )];
        let sink = RecordingSink::default();
        let html = engine(deltas)
            .generate(&create_spec(), &sink, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!html[1..].contains("<!doctype"));
    }
}
