//! Display projection of a session log
//!
//! Rows are rebuilt from the whole log on every render; nothing is patched in
//! place. The system prompt is never projected.

use crate::llm::{LlmMessage, MessageRole};
use crate::state_machine::SessionLog;
use serde::Serialize;

pub const ASSISTANT_BACKGROUND: &str = "#71E883BD";
pub const USER_BACKGROUND: &str = "#94dce6b3";

/// One rendered transcript entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptRow {
    pub role: MessageRole,
    /// "Assistant" or "User"
    pub role_label: &'static str,
    /// Raw text; the page shows it with `white-space: pre-wrap`
    pub text: String,
    pub background: &'static str,
}

impl TranscriptRow {
    pub fn from_message(message: &LlmMessage) -> Self {
        let background = match message.role {
            MessageRole::Assistant => ASSISTANT_BACKGROUND,
            MessageRole::User | MessageRole::System => USER_BACKGROUND,
        };
        Self {
            role: message.role,
            role_label: message.role.label(),
            text: message.text.clone(),
            background,
        }
    }
}

/// Rows for every entry after the system prompt, in log order
pub fn project(log: &SessionLog) -> Vec<TranscriptRow> {
    log.turns().iter().map(TranscriptRow::from_message).collect()
}
