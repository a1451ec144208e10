//! Mock implementations for testing
//!
//! These mocks enable session testing without real I/O.

use super::executor::SessionRuntime;
use super::traits::TranscriptRenderer;
use super::{SessionView, SseEvent};
use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService};
use crate::state_machine::{ConvState, Event, SessionContext, SessionLog, TransitionError};
use crate::system_prompt::SYSTEM_PROMPT;
use crate::transcript::TranscriptRow;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, Notify};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Gated Mock LLM Client (for in-flight testing)
// ============================================================================

/// Mock LLM client that holds every request until released
pub struct GatedMockLlmClient {
    inner: MockLlmClient,
    release: Arc<Notify>,
    /// Notified when a request starts (for test synchronization)
    pub request_started: Arc<Notify>,
}

impl GatedMockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            inner: MockLlmClient::new(model_id),
            release: Arc::new(Notify::new()),
            request_started: Arc::new(Notify::new()),
        }
    }

    pub fn queue_response(&self, response: LlmResponse) {
        self.inner.queue_response(response);
    }

    /// Let one held request complete
    pub fn release_one(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl LlmService for GatedMockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.request_started.notify_one();
        self.release.notified().await;
        self.inner.complete(request).await
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

// ============================================================================
// Recording Renderer
// ============================================================================

/// Renderer that keeps every transcript it was handed
#[derive(Default)]
pub struct RecordingRenderer {
    renders: Mutex<Vec<Vec<TranscriptRow>>>,
}

impl RecordingRenderer {
    pub fn render_count(&self) -> usize {
        self.renders.lock().unwrap().len()
    }

    /// Rows of the most recent render
    pub fn last(&self) -> Vec<TranscriptRow> {
        self.renders.lock().unwrap().last().cloned().unwrap_or_default()
    }

    pub fn all(&self) -> Vec<Vec<TranscriptRow>> {
        self.renders.lock().unwrap().clone()
    }
}

impl TranscriptRenderer for RecordingRenderer {
    fn render(&self, rows: &[TranscriptRow]) {
        self.renders.lock().unwrap().push(rows.to_vec());
    }
}

// ============================================================================
// Test Session
// ============================================================================

/// A session runtime driven directly by the test, without a spawned loop
pub struct TestSession<L: LlmService + 'static> {
    pub runtime: SessionRuntime<L, Arc<RecordingRenderer>>,
    pub llm: Arc<L>,
    pub renderer: Arc<RecordingRenderer>,
    pub broadcast_rx: broadcast::Receiver<SseEvent>,
    pub view_rx: watch::Receiver<SessionView>,
}

impl TestSession<MockLlmClient> {
    /// Create a test session with an instant mock
    pub fn new() -> Self {
        Self::with_llm(MockLlmClient::new("test-model"))
    }
}

impl<L: LlmService + 'static> TestSession<L> {
    pub fn with_llm(llm: L) -> Self {
        let llm = Arc::new(llm);
        let renderer = Arc::new(RecordingRenderer::default());

        let context = SessionContext::new("test-session", llm.model_id());
        // Input is fed straight into the runtime, not through the command channel
        let (_, command_rx) = mpsc::channel(1);
        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, broadcast_rx) = broadcast::channel(128);
        let (view_tx, view_rx) = watch::channel(SessionView::default());

        let runtime = SessionRuntime::new(
            context,
            SYSTEM_PROMPT,
            Arc::clone(&llm),
            Arc::clone(&renderer),
            command_rx,
            event_rx,
            event_tx,
            broadcast_tx,
            view_tx,
            CancellationToken::new(),
        );

        Self {
            runtime,
            llm,
            renderer,
            broadcast_rx,
            view_rx,
        }
    }

    /// Submit text and wait until the session is idle again
    pub async fn submit(&mut self, text: &str) {
        if self.runtime.handle_input(Event::user_message(text)).is_err() {
            return;
        }
        while self.runtime.state().is_working() {
            if !self.runtime.step().await {
                break;
            }
        }
    }

    pub fn reset(&mut self) -> Result<(), TransitionError> {
        self.runtime.handle_input(Event::Reset)
    }

    pub fn log(&self) -> &SessionLog {
        self.runtime.log()
    }

    pub fn state(&self) -> ConvState {
        self.runtime.state()
    }
}

/// Wait until a `StateChange` to `expected` arrives
pub async fn wait_for_state(
    rx: &mut broadcast::Receiver<SseEvent>,
    expected: ConvState,
    timeout: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout(Duration::from_millis(50), rx.recv()).await {
            Ok(Ok(SseEvent::StateChange { state })) if state == expected => return true,
            _ => continue,
        }
    }
    false
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmMessage, MessageRole};
    use crate::runtime::{SessionError, SessionManager};
    use crate::system_prompt::{APOLOGY, EMPTY_INPUT_NOTICE, GREETING};
    use proptest::prelude::*;

    const WAIT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_mock_llm_client() {
        let mock = MockLlmClient::new("test-model");
        mock.queue_response(LlmResponse::text("Hello"));

        let request = LlmRequest { messages: vec![] };

        let response = mock.complete(&request).await.unwrap();
        assert_eq!(response.text, "Hello");

        // Second call should fail (no more responses)
        let result = mock.complete(&request).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fresh_session_is_greeted() {
        let session = TestSession::new();

        assert_eq!(
            session.log().messages(),
            &[
                LlmMessage::system(SYSTEM_PROMPT),
                LlmMessage::assistant(GREETING)
            ]
        );
        assert_eq!(session.renderer.render_count(), 1);
        assert_eq!(session.renderer.last().len(), 1);
        assert_eq!(session.view_rx.borrow().rows.len(), 1);
        assert_eq!(session.state(), ConvState::Idle);
    }

    /// Fresh session, one exchange, then reset
    #[tokio::test]
    async fn test_end_to_end_exchange_and_reset() {
        let llm = MockLlmClient::new("test-model");
        llm.queue_response(LlmResponse::text("hi there"));
        let mut session = TestSession::with_llm(llm);

        session.submit("hello").await;

        assert_eq!(
            session.log().messages(),
            &[
                LlmMessage::system(SYSTEM_PROMPT),
                LlmMessage::assistant(GREETING),
                LlmMessage::user("hello"),
                LlmMessage::assistant("hi there"),
            ]
        );
        let rows = session.renderer.last();
        let labels: Vec<&str> = rows.iter().map(|r| r.role_label).collect();
        assert_eq!(labels, ["Assistant", "User", "Assistant"]);

        session.reset().unwrap();

        assert_eq!(session.log().len(), 2);
        assert_eq!(session.log().messages()[1], LlmMessage::assistant(GREETING));
        assert_eq!(session.renderer.last().len(), 1);
        assert_eq!(session.view_rx.borrow().rows.len(), 1);
    }

    #[tokio::test]
    async fn test_completion_receives_entire_log() {
        let llm = MockLlmClient::new("test-model");
        llm.queue_response(LlmResponse::text("first"));
        llm.queue_response(LlmResponse::text("second"));
        let mut session = TestSession::with_llm(llm);

        session.submit("one").await;
        session.submit("  two  ").await;

        let requests = session.llm.recorded_requests();
        assert_eq!(requests.len(), 2);

        // Each request is the log right after the user turn was appended
        assert_eq!(requests[0].messages, session.log().messages()[..3]);
        assert_eq!(requests[1].messages, session.log().messages()[..5]);
        assert_eq!(requests[1].messages[0].role, MessageRole::System);
        assert_eq!(requests[1].messages[4], LlmMessage::user("two"));
    }

    #[tokio::test]
    async fn test_blank_submission_skips_completion() {
        let mut session = TestSession::new();
        let renders_before = session.renderer.render_count();

        session.submit(" \t\n ").await;

        assert!(session.llm.recorded_requests().is_empty());
        assert_eq!(session.log().len(), 3);
        assert_eq!(
            session.log().messages()[2],
            LlmMessage::assistant(EMPTY_INPUT_NOTICE)
        );
        assert_eq!(session.renderer.render_count(), renders_before + 1);
    }

    #[tokio::test]
    async fn test_submission_renders_twice() {
        let llm = MockLlmClient::new("test-model");
        llm.queue_response(LlmResponse::text("reply"));
        let mut session = TestSession::with_llm(llm);
        let renders_before = session.renderer.render_count();

        session.submit("question").await;

        let renders = session.renderer.all();
        assert_eq!(renders.len(), renders_before + 2);
        // User echo first, then the reply
        assert_eq!(renders[renders_before].len(), 2);
        assert_eq!(renders[renders_before + 1].len(), 3);
    }

    #[tokio::test]
    async fn test_failure_is_swallowed_with_apology() {
        let llm = MockLlmClient::new("test-model");
        llm.queue_error(LlmError::auth("Invalid API key"));
        let mut session = TestSession::with_llm(llm);
        let before = session.log().len();

        session.submit("hello").await;

        assert_eq!(session.state(), ConvState::Idle);
        assert_eq!(session.log().len(), before + 2);
        assert_eq!(
            session.log().messages().last().unwrap(),
            &LlmMessage::assistant(APOLOGY)
        );
    }

    #[tokio::test]
    async fn test_empty_reply_is_logged() {
        let llm = MockLlmClient::new("test-model");
        llm.queue_response(LlmResponse::text(""));
        let mut session = TestSession::with_llm(llm);

        session.submit("say nothing").await;

        assert_eq!(session.log().len(), 4);
        assert_eq!(session.log().messages()[3], LlmMessage::assistant(""));
    }

    #[tokio::test]
    async fn test_busy_session_rejects_input_and_reset() {
        let llm = MockLlmClient::new("test-model");
        llm.queue_response(LlmResponse::text("done"));
        let mut session = TestSession::with_llm(llm);

        // Start a submission but leave its outcome unprocessed
        session.runtime.handle_input(Event::user_message("first")).unwrap();
        assert_eq!(session.state(), ConvState::Processing);
        let len_in_flight = session.log().len();

        assert_eq!(
            session.runtime.handle_input(Event::user_message("second")),
            Err(TransitionError::Busy)
        );
        assert_eq!(session.reset(), Err(TransitionError::Busy));
        assert_eq!(session.log().len(), len_in_flight);

        // The first reply still lands after its own user turn
        assert!(session.runtime.step().await);
        assert_eq!(session.state(), ConvState::Idle);
        let turns = session.log().turns();
        assert_eq!(turns[turns.len() - 2], LlmMessage::user("first"));
        assert_eq!(turns[turns.len() - 1], LlmMessage::assistant("done"));
    }

    #[tokio::test]
    async fn test_stale_outcome_is_reported_not_logged() {
        let mut session = TestSession::new();
        let before = session.log().clone();
        while session.broadcast_rx.try_recv().is_ok() {}

        session.runtime.handle_event(Event::CompletionSucceeded {
            text: "nobody asked".to_string(),
        });

        assert_eq!(session.log(), &before);
        assert!(matches!(
            session.broadcast_rx.try_recv(),
            Ok(SseEvent::Error { .. })
        ));
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let llm = MockLlmClient::new("test-model");
        llm.queue_response(LlmResponse::text("a"));
        let mut session = TestSession::with_llm(llm);
        session.submit("q").await;

        session.reset().unwrap();
        let once = session.log().clone();
        let rows_once = session.renderer.last();
        session.reset().unwrap();

        assert_eq!(session.log(), &once);
        assert_eq!(session.renderer.last(), rows_once);
    }

    #[tokio::test]
    async fn test_reset_clears_rows_before_greeting() {
        let mut session = TestSession::new();
        session.submit("").await;
        let renders_before = session.renderer.render_count();

        session.reset().unwrap();

        let renders = session.renderer.all();
        assert_eq!(renders.len(), renders_before + 2);
        assert!(renders[renders_before].is_empty());
        assert_eq!(renders[renders_before + 1].len(), 1);
    }

    // ========================================================================
    // Session manager (spawned runtimes)
    // ========================================================================

    #[tokio::test]
    async fn test_manager_round_trip() {
        let llm = MockLlmClient::new("test-model");
        llm.queue_response(LlmResponse::text("hi there"));
        let manager = SessionManager::new(Arc::new(llm));

        let (id, view) = manager.create().await;
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].text, GREETING);

        let (_, mut rx) = manager.subscribe(&id).await.unwrap();
        manager
            .send_event(&id, Event::user_message("hello"))
            .await
            .unwrap();

        assert!(wait_for_state(&mut rx, ConvState::Processing, WAIT).await);
        assert!(wait_for_state(&mut rx, ConvState::Idle, WAIT).await);

        let view = manager.view(&id).await.unwrap();
        assert_eq!(view.state, ConvState::Idle);
        let texts: Vec<&str> = view.rows.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, [GREETING, "hello", "hi there"]);
    }

    #[tokio::test]
    async fn test_manager_refuses_while_processing() {
        let llm = Arc::new(GatedMockLlmClient::new("test-model"));
        llm.queue_response(LlmResponse::text("eventually"));
        let manager = SessionManager::new(llm.clone());

        let (id, _) = manager.create().await;
        let (_, mut rx) = manager.subscribe(&id).await.unwrap();
        manager
            .send_event(&id, Event::user_message("slow question"))
            .await
            .unwrap();
        assert!(wait_for_state(&mut rx, ConvState::Processing, WAIT).await);

        let second = manager.send_event(&id, Event::user_message("again")).await;
        assert!(matches!(
            second,
            Err(SessionError::Rejected(TransitionError::Busy))
        ));
        let reset = manager.send_event(&id, Event::Reset).await;
        assert!(matches!(
            reset,
            Err(SessionError::Rejected(TransitionError::Busy))
        ));

        llm.release_one();
        assert!(wait_for_state(&mut rx, ConvState::Idle, WAIT).await);

        let view = manager.view(&id).await.unwrap();
        assert_eq!(view.rows.len(), 3);
        assert_eq!(view.rows[2].text, "eventually");

        // Idle again: reset goes through
        manager.send_event(&id, Event::Reset).await.unwrap();
    }

    #[tokio::test]
    async fn test_back_to_back_submissions_refuse_the_second() {
        let llm = Arc::new(GatedMockLlmClient::new("test-model"));
        llm.queue_response(LlmResponse::text("one"));
        let manager = SessionManager::new(llm.clone());
        let (id, _) = manager.create().await;

        // No waiting between the two: acceptance is decided by the runtime
        let first = manager.send_event(&id, Event::user_message("first")).await;
        let second = manager.send_event(&id, Event::user_message("second")).await;
        let reset = manager.send_event(&id, Event::Reset).await;

        assert!(first.is_ok());
        assert!(matches!(
            second,
            Err(SessionError::Rejected(TransitionError::Busy))
        ));
        assert!(matches!(
            reset,
            Err(SessionError::Rejected(TransitionError::Busy))
        ));

        let (_, mut rx) = manager.subscribe(&id).await.unwrap();
        llm.release_one();
        assert!(wait_for_state(&mut rx, ConvState::Idle, WAIT).await);

        let view = manager.view(&id).await.unwrap();
        let texts: Vec<&str> = view.rows.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, [GREETING, "first", "one"]);
    }

    #[tokio::test]
    async fn test_send_to_stopped_runtime_is_closed() {
        let manager = SessionManager::new(Arc::new(MockLlmClient::new("test-model")));
        let (id, _) = manager.create().await;
        let handle = manager.get(&id).await.unwrap();

        // Stop the runtime but leave the handle registered
        handle.shutdown.cancel();
        handle.command_tx.closed().await;

        let result = manager.send_event(&id, Event::user_message("hello")).await;
        assert!(matches!(result, Err(SessionError::Closed(_))));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let llm = MockLlmClient::new("test-model");
        llm.queue_response(LlmResponse::text("for a"));
        let manager = SessionManager::new(Arc::new(llm));

        let (a, _) = manager.create().await;
        let (b, _) = manager.create().await;
        assert_ne!(a, b);
        assert_eq!(manager.session_count().await, 2);

        let (_, mut rx) = manager.subscribe(&a).await.unwrap();
        manager.send_event(&a, Event::user_message("hi")).await.unwrap();
        assert!(wait_for_state(&mut rx, ConvState::Idle, WAIT).await);

        assert_eq!(manager.view(&a).await.unwrap().rows.len(), 3);
        assert_eq!(manager.view(&b).await.unwrap().rows.len(), 1);
    }

    #[tokio::test]
    async fn test_close_stops_session() {
        let llm = Arc::new(GatedMockLlmClient::new("test-model"));
        let manager = SessionManager::new(llm.clone());

        let (id, _) = manager.create().await;
        let started = llm.request_started.clone();
        manager
            .send_event(&id, Event::user_message("never answered"))
            .await
            .unwrap();
        tokio::time::timeout(WAIT, started.notified()).await.unwrap();

        manager.close(&id).await.unwrap();

        assert!(matches!(
            manager.view(&id).await,
            Err(SessionError::NotFound(_))
        ));
        assert!(matches!(
            manager.close(&id).await,
            Err(SessionError::NotFound(_))
        ));
        assert_eq!(manager.session_count().await, 0);
    }

    // ========================================================================
    // Properties over whole sessions
    // ========================================================================

    #[derive(Debug, Clone)]
    enum Action {
        Submit(String),
        SubmitFailing(String),
        Reset,
    }

    fn arb_action() -> impl Strategy<Value = Action> {
        prop_oneof![
            3 => "[ a-z\n]{0,12}".prop_map(Action::Submit),
            1 => "[ a-z\n]{0,12}".prop_map(Action::SubmitFailing),
            1 => Just(Action::Reset),
        ]
    }

    proptest! {
        #[test]
        fn session_shape_holds_for_any_actions(actions in proptest::collection::vec(arb_action(), 0..20)) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let mut session = TestSession::new();
                for action in actions {
                    let before = session.log().len();
                    match action {
                        Action::Submit(text) | Action::SubmitFailing(text) if text.trim().is_empty() => {
                            session.submit(&text).await;
                            assert_eq!(session.log().len(), before + 1);
                        }
                        Action::Submit(text) => {
                            session.llm.queue_response(LlmResponse::text("ok"));
                            session.submit(&text).await;
                            assert_eq!(session.log().len(), before + 2);
                            assert_eq!(session.log().messages()[before], LlmMessage::user(text.trim()));
                        }
                        Action::SubmitFailing(text) => {
                            session.llm.queue_error(LlmError::server_error("boom"));
                            session.submit(&text).await;
                            assert_eq!(session.log().len(), before + 2);
                            assert_eq!(session.log().messages()[before + 1], LlmMessage::assistant(APOLOGY));
                        }
                        Action::Reset => {
                            session.reset().unwrap();
                            assert_eq!(session.log().len(), 2);
                        }
                    }
                    assert_eq!(session.log().system(), &LlmMessage::system(SYSTEM_PROMPT));
                    assert_eq!(session.renderer.last().len(), session.log().len() - 1);
                    assert_eq!(session.state(), ConvState::Idle);
                }
            });
        }
    }
}
