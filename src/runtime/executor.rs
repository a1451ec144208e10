//! Session runtime executor
//!
//! Owns the session log and the current state, feeds events through the pure
//! transition function and executes the resulting effects. The completion
//! call is the only suspension point and runs as a spawned, cancellable task
//! whose outcome comes back as an event.

use super::traits::TranscriptRenderer;
use super::{SessionCommand, SessionView, SseEvent};

use crate::llm::{LlmRequest, LlmService};
use crate::state_machine::{
    transition, ConvState, Effect, Event, SessionContext, SessionLog, TransitionError,
};
use crate::transcript;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Generic session runtime that can work with any completion client and renderer
pub struct SessionRuntime<L, R>
where
    L: LlmService + ?Sized + 'static,
    R: TranscriptRenderer,
{
    context: SessionContext,
    state: ConvState,
    log: SessionLog,
    llm_client: Arc<L>,
    renderer: R,
    /// Input from the gateway, answered with the transition verdict
    command_rx: mpsc::Receiver<SessionCommand>,
    /// Completion outcomes from the spawned request task
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    /// Latest rows and state, read by handlers and new subscribers
    view_tx: watch::Sender<SessionView>,
    /// Stops the event loop when the session is closed
    shutdown: CancellationToken,
    /// Token to cancel the in-flight completion
    completion_cancel_token: Option<CancellationToken>,
}

impl<L, R> SessionRuntime<L, R>
where
    L: LlmService + ?Sized + 'static,
    R: TranscriptRenderer,
{
    /// Build the runtime and run the greeting bootstrap
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: SessionContext,
        system_prompt: &str,
        llm_client: Arc<L>,
        renderer: R,
        command_rx: mpsc::Receiver<SessionCommand>,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        broadcast_tx: broadcast::Sender<SseEvent>,
        view_tx: watch::Sender<SessionView>,
        shutdown: CancellationToken,
    ) -> Self {
        let mut runtime = Self {
            context,
            state: ConvState::Idle,
            log: SessionLog::new(system_prompt),
            llm_client,
            renderer,
            command_rx,
            event_rx,
            event_tx,
            broadcast_tx,
            view_tx,
            shutdown,
            completion_cancel_token: None,
        };
        for effect in Effect::greeting() {
            runtime.execute_effect(effect);
        }
        runtime
    }

    #[cfg(test)]
    pub fn state(&self) -> ConvState {
        self.state
    }

    #[cfg(test)]
    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    pub async fn run(mut self) {
        tracing::info!(
            session_id = %self.context.session_id,
            model = %self.context.model_id,
            "Starting session runtime"
        );

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                Some(command) = self.command_rx.recv() => {
                    let verdict = self.handle_input(command.event);
                    // The caller may have given up waiting
                    let _ = command.reply.send(verdict);
                }
                Some(event) = self.event_rx.recv() => self.handle_event(event),
                else => break,
            }
        }

        if let Some(token) = self.completion_cancel_token.take() {
            token.cancel();
        }

        tracing::info!(session_id = %self.context.session_id, "Session runtime stopped");
    }

    /// Receive and handle one event. Returns false once the channel is closed.
    #[cfg(test)]
    pub(crate) async fn step(&mut self) -> bool {
        match self.event_rx.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// Apply gateway input; a rejection goes back to the caller only
    pub(crate) fn handle_input(&mut self, event: Event) -> Result<(), TransitionError> {
        self.process_event(event).inspect_err(|e| {
            tracing::info!(
                session_id = %self.context.session_id,
                state = self.state.name(),
                error = %e,
                "Input refused"
            );
        })
    }

    /// Process an event, reporting rejections to connected clients
    pub(crate) fn handle_event(&mut self, event: Event) {
        match &event {
            Event::CompletionSucceeded { .. } => self.completion_cancel_token = None,
            Event::CompletionFailed { message, kind } => {
                self.completion_cancel_token = None;
                tracing::warn!(
                    session_id = %self.context.session_id,
                    error = %message,
                    kind = ?kind,
                    "Completion failed, replying with apology"
                );
            }
            Event::UserMessage { .. } | Event::Reset => {}
        }

        if let Err(e) = self.process_event(event) {
            tracing::warn!(
                session_id = %self.context.session_id,
                state = self.state.name(),
                error = %e,
                "Event rejected"
            );
            let _ = self.broadcast_tx.send(SseEvent::Error {
                message: e.to_string(),
            });
        }
    }

    pub(crate) fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        let event_name = event.name();
        let result = transition(&self.state, event)?;

        tracing::debug!(
            session_id = %self.context.session_id,
            event = event_name,
            from = self.state.name(),
            to = result.new_state.name(),
            "Transition"
        );

        self.state = result.new_state;
        for effect in result.effects {
            self.execute_effect(effect);
        }
        Ok(())
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::Append { message } => {
                if let Err(e) = self.log.push(message) {
                    tracing::error!(
                        session_id = %self.context.session_id,
                        error = %e,
                        "Refused log append"
                    );
                }
            }

            Effect::TruncateToSystem => self.log.truncate_to_system(),

            Effect::Render => {
                let rows = transcript::project(&self.log);
                tracing::debug!(
                    session_id = %self.context.session_id,
                    entries = self.log.len(),
                    "Rendering transcript"
                );
                // View first, so a subscriber never sees an older view than its first broadcast
                self.view_tx.send_modify(|view| view.rows.clone_from(&rows));
                self.renderer.render(&rows);
            }

            Effect::NotifyState => {
                let state = self.state;
                self.view_tx.send_modify(|view| view.state = state);
                let _ = self.broadcast_tx.send(SseEvent::StateChange { state });
            }

            Effect::RequestCompletion => self.spawn_completion(),
        }
    }

    fn spawn_completion(&mut self) {
        let cancel_token = CancellationToken::new();
        self.completion_cancel_token = Some(cancel_token.clone());

        let request = LlmRequest {
            messages: self.log.snapshot(),
        };
        let llm_client = Arc::clone(&self.llm_client);
        let event_tx = self.event_tx.clone();
        let session_id = self.context.session_id.clone();

        tokio::spawn(async move {
            tracing::debug!(
                session_id = %session_id,
                messages = request.messages.len(),
                "Requesting completion (background)"
            );

            tokio::select! {
                biased;

                () = cancel_token.cancelled() => {
                    tracing::info!(session_id = %session_id, "Completion cancelled");
                }

                result = llm_client.complete(&request) => {
                    let event = match result {
                        Ok(response) => Event::CompletionSucceeded { text: response.text },
                        Err(e) => Event::CompletionFailed { message: e.message, kind: e.kind },
                    };
                    let _ = event_tx.send(event).await;
                }
            }
        });
    }
}
