//! Session state types

use serde::{Deserialize, Serialize};

/// Session state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvState {
    /// Waiting for input, no completion call in flight
    #[default]
    Idle,

    /// A completion call is in flight; submissions and resets are refused
    Processing,
}

impl ConvState {
    /// Check if a completion call is in flight
    pub fn is_working(self) -> bool {
        matches!(self, ConvState::Processing)
    }

    pub fn name(self) -> &'static str {
        match self {
            ConvState::Idle => "idle",
            ConvState::Processing => "processing",
        }
    }
}

/// Identity of one session (immutable configuration)
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub model_id: String,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            model_id: model_id.into(),
        }
    }
}
