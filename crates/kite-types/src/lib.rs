//! Shared data model for the kite conversation engine: messages, tags and
//! their wire formats, saved mini-apps, and the app-developer tool spec.

pub mod app;
pub mod message;
pub mod tag;

pub use app::{AppDevMode, AppDevToolSpec, SavedApp, SpecValidationError};
pub use message::{Attachment, Message, Role};
pub use tag::{AppDevTagPayload, McpTagDetail, MessageTag, TagKind, TagStatus};

/// Create a fresh v4 id string, used for messages, tags and saved apps.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
