//! The session log: the single source of truth of a conversation
//!
//! Index 0 is the system prompt, fixed at construction. Every later entry is a
//! user or assistant turn. The log only grows, except for
//! [`SessionLog::truncate_to_system`], which restores the constructed state.

use crate::llm::{LlmMessage, MessageRole};
use thiserror::Error;

/// Appends the log refuses
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogError {
    #[error("the system prompt is fixed at construction")]
    SystemRole,
    #[error("empty user turns are never logged")]
    EmptyUserTurn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLog {
    messages: Vec<LlmMessage>,
}

impl SessionLog {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![LlmMessage::system(system_prompt)],
        }
    }

    /// Append a user or assistant turn
    pub fn push(&mut self, message: LlmMessage) -> Result<(), LogError> {
        match message.role {
            MessageRole::System => return Err(LogError::SystemRole),
            MessageRole::User if message.text.trim().is_empty() => {
                return Err(LogError::EmptyUserTurn)
            }
            MessageRole::User | MessageRole::Assistant => {}
        }
        self.messages.push(message);
        Ok(())
    }

    pub fn truncate_to_system(&mut self) {
        self.messages.truncate(1);
    }

    #[cfg(test)]
    pub fn system(&self) -> &LlmMessage {
        &self.messages[0]
    }

    /// Every entry, system prompt first
    pub fn messages(&self) -> &[LlmMessage] {
        &self.messages
    }

    /// Entries after the system prompt, i.e. what the transcript shows
    pub fn turns(&self) -> &[LlmMessage] {
        &self.messages[1..]
    }

    /// Owned copy handed to the completion client
    pub fn snapshot(&self) -> Vec<LlmMessage> {
        self.messages().to_vec()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}
