//! API request and response types

use crate::runtime::SessionView;
use crate::state_machine::ConvState;
use crate::transcript::TranscriptRow;
use serde::{Deserialize, Serialize};

/// Request to send a chat message
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Raw input box contents; blank text is answered with a notice
    #[serde(default)]
    pub text: String,
}

/// Response for chat action
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub queued: bool,
}

/// Response for reset and delete
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// A session and what it currently displays
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub state: ConvState,
    pub rows: Vec<TranscriptRow>,
}

impl SessionResponse {
    pub fn new(session_id: String, view: SessionView) -> Self {
        Self {
            session_id,
            state: view.state,
            rows: view.rows,
        }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
