//! HTTP API for the chat dashboard
//!
//! The page, session lifecycle, chat submission and the SSE stream that
//! carries every transcript render.

mod assets;
mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::llm::LlmService;
use crate::runtime::SessionManager;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(llm_client: Arc<dyn LlmService>) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(llm_client)),
        }
    }

    pub fn model_id(&self) -> &str {
        self.sessions.model_id()
    }
}
