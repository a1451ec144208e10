//! Effects produced by state transitions

use crate::llm::LlmMessage;
use crate::system_prompt::GREETING;

/// Effects to be executed, in order, after a state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append one entry to the session log
    Append { message: LlmMessage },

    /// Drop every entry after the system prompt
    TruncateToSystem,

    /// Hand the full current transcript to the renderer
    Render,

    /// Send the full current log to the completion client (spawns a task)
    RequestCompletion,

    /// Tell connected clients the state changed
    NotifyState,
}

impl Effect {
    pub fn append_user(text: impl Into<String>) -> Self {
        Effect::Append {
            message: LlmMessage::user(text),
        }
    }

    pub fn append_assistant(text: impl Into<String>) -> Self {
        Effect::Append {
            message: LlmMessage::assistant(text),
        }
    }

    /// Greeting bootstrap: run at construction and at the end of every reset
    pub fn greeting() -> Vec<Self> {
        vec![Effect::append_assistant(GREETING), Effect::Render]
    }
}
