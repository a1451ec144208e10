//! Runtime for executing sessions
//!
//! One actor task per browser session. Each owns its own log; nothing is
//! shared between sessions except the completion client.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;
pub use traits::*;

use crate::llm::LlmService;
use crate::state_machine::{ConvState, Event, SessionContext, TransitionError};
use crate::system_prompt::SYSTEM_PROMPT;
use crate::transcript::TranscriptRow;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch, RwLock};
use tokio_util::sync::CancellationToken;

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime = SessionRuntime<dyn LlmService, BroadcastRenderer>;

/// Latest observable state of a session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionView {
    pub state: ConvState,
    pub rows: Vec<TranscriptRow>,
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    Init { view: SessionView },
    Transcript { rows: Vec<TranscriptRow> },
    StateChange { state: ConvState },
    Error { message: String },
}

/// Errors from session lookup and event delivery
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("Session {0} is no longer running")]
    Closed(String),
    #[error(transparent)]
    Rejected(#[from] TransitionError),
}

/// Input event paired with the channel that carries the runtime's verdict
#[derive(Debug)]
pub struct SessionCommand {
    pub event: Event,
    pub reply: oneshot::Sender<Result<(), TransitionError>>,
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub command_tx: mpsc::Sender<SessionCommand>,
    pub broadcast_tx: broadcast::Sender<SseEvent>,
    pub view: watch::Receiver<SessionView>,
    shutdown: CancellationToken,
}

/// Manager for all session runtimes
pub struct SessionManager {
    llm_client: Arc<dyn LlmService>,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new(llm_client: Arc<dyn LlmService>) -> Self {
        Self {
            llm_client,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn model_id(&self) -> &str {
        self.llm_client.model_id()
    }

    /// Start a new session. The greeting is already in the returned view.
    pub async fn create(&self) -> (String, SessionView) {
        let session_id = uuid::Uuid::new_v4().to_string();
        let context = SessionContext::new(&session_id, self.llm_client.model_id());

        let (event_tx, event_rx) = mpsc::channel(32);
        let (command_tx, command_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(128);
        let (view_tx, view_rx) = watch::channel(SessionView::default());
        let shutdown = CancellationToken::new();

        let runtime: ProductionRuntime = SessionRuntime::new(
            context,
            SYSTEM_PROMPT,
            Arc::clone(&self.llm_client),
            BroadcastRenderer::new(broadcast_tx.clone()),
            command_rx,
            event_rx,
            event_tx,
            broadcast_tx.clone(),
            view_tx,
            shutdown.clone(),
        );
        let view = view_rx.borrow().clone();

        tokio::spawn(runtime.run());

        self.sessions.write().await.insert(
            session_id.clone(),
            SessionHandle {
                command_tx,
                broadcast_tx,
                view: view_rx,
                shutdown,
            },
        );

        let active = self.session_count().await;
        tracing::info!(session_id = %session_id, active, "Session created");
        (session_id, view)
    }

    pub async fn get(&self, session_id: &str) -> Result<SessionHandle, SessionError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    pub async fn view(&self, session_id: &str) -> Result<SessionView, SessionError> {
        let handle = self.get(session_id).await?;
        let view = handle.view.borrow().clone();
        Ok(view)
    }

    /// Deliver an input event and wait for the runtime to accept or refuse it.
    ///
    /// The verdict comes from the transition the runtime actually applies, so
    /// two submissions sent back to back can never both be accepted.
    pub async fn send_event(&self, session_id: &str, event: Event) -> Result<(), SessionError> {
        let handle = self.get(session_id).await?;
        let (reply, verdict) = oneshot::channel();

        handle
            .command_tx
            .send(SessionCommand { event, reply })
            .await
            .map_err(|_| SessionError::Closed(session_id.to_string()))?;

        // Sender dropped: the runtime stopped before answering
        verdict
            .await
            .map_err(|_| SessionError::Closed(session_id.to_string()))??;
        Ok(())
    }

    /// Subscribe to session updates, with the view to start from
    pub async fn subscribe(
        &self,
        session_id: &str,
    ) -> Result<(SessionView, broadcast::Receiver<SseEvent>), SessionError> {
        let handle = self.get(session_id).await?;
        // Subscribe before reading the view so no render falls between the two
        let rx = handle.broadcast_tx.subscribe();
        let view = handle.view.borrow().clone();
        Ok((view, rx))
    }

    /// Stop a session's runtime, cancelling any in-flight completion
    pub async fn close(&self, session_id: &str) -> Result<(), SessionError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        handle.shutdown.cancel();
        let active = self.session_count().await;
        tracing::info!(session_id = %session_id, active, "Session closed");
        Ok(())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
