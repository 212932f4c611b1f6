//! Chat stream controller.
//!
//! Owns the lifecycle of each stream session: opens the transport, drives
//! the decoder, classifies records, and routes them to a [`StreamHandler`].

use crate::decoder::{DecodedRecord, StreamDecoder};
use crate::error::{StreamError, StreamResult};
use crate::events::ChatStreamEvent;
use crate::handler::{Callbacks, StreamHandler};
use crate::session::{Session, SessionState, StreamHandle};
use crate::transport::{ByteStream, ChatTransport, HttpTransport};
use bytes::Bytes;
use futures::StreamExt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use supportdesk_core::identifier::generate_short_id;
use supportdesk_core::{ChatRequest, ClientConfig, ThinkingPhase};
use tracing::{debug, error, info, warn};

/// Options applied to every session opened by a controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOptions {
    /// Fail the session when response headers or the next chunk take longer
    /// than this.
    pub idle_timeout: Option<Duration>,
}

impl StreamOptions {
    /// Create default options (no idle timeout).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the idle timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }
}

/// Opens chat streams and drives them to completion.
///
/// The controller holds no per-session state and may run any number of
/// sessions at once; keeping one session per conversation is up to the
/// caller.
///
/// # Example
///
/// ```ignore
/// use supportdesk_core::{ChatRequest, ClientConfig};
/// use supportdesk_streaming::{Callbacks, ChatStreamController};
///
/// let controller = ChatStreamController::from_config(&ClientConfig::from_env()?)?;
/// let handle = controller.open(
///     ChatRequest::new("alice", "Where is my order?"),
///     Callbacks::new(|c| print!("{c}"), || println!(), |e| eprintln!("{e}")),
/// );
/// // later, e.g. when the user switches persona:
/// handle.cancel();
/// ```
#[derive(Clone)]
pub struct ChatStreamController {
    transport: Arc<dyn ChatTransport>,
    options: StreamOptions,
}

impl std::fmt::Debug for ChatStreamController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStreamController")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ChatStreamController {
    /// Create a controller over a transport.
    pub fn new<T: ChatTransport + 'static>(transport: T) -> Self {
        Self::from_arc(Arc::new(transport))
    }

    /// Create a controller over a shared transport.
    pub fn from_arc(transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            transport,
            options: StreamOptions::default(),
        }
    }

    /// Create an HTTP controller from client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP transport cannot be built.
    pub fn from_config(config: &ClientConfig) -> StreamResult<Self> {
        let mut options = StreamOptions::new();
        options.idle_timeout = config.stream_idle_timeout;
        Ok(Self::new(HttpTransport::from_config(config)?).with_options(options))
    }

    /// Replace the stream options.
    #[must_use]
    pub fn with_options(mut self, options: StreamOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the idle timeout.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.options.idle_timeout = Some(timeout);
        self
    }

    /// Current options.
    #[must_use]
    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    /// Open a stream and route its events to `handler`.
    ///
    /// Returns immediately; the connection and decode loop run on a spawned
    /// task. The returned handle can cancel the session at any point,
    /// including before the connection is established.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn open<H: StreamHandler>(&self, request: ChatRequest, handler: H) -> StreamHandle {
        let session = Session::new(generate_short_id());
        debug!(
            session_id = %session.id(),
            new_conversation = request.is_new_conversation(),
            "opening chat stream"
        );

        let run = SessionRun {
            session: Arc::clone(&session),
            transport: Arc::clone(&self.transport),
            idle_timeout: self.options.idle_timeout,
            handler,
        };
        let task = tokio::spawn(run.run(request));
        StreamHandle::new(session, task)
    }

    /// Open a stream with closure callbacks.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn open_with<C, D, E>(
        &self,
        request: ChatRequest,
        on_chunk: C,
        on_complete: D,
        on_error: E,
        on_thinking: Option<Box<dyn FnMut(ThinkingPhase, &str) + Send>>,
    ) -> StreamHandle
    where
        C: FnMut(&str) + Send + 'static,
        D: FnMut() + Send + 'static,
        E: FnMut(StreamError) + Send + 'static,
    {
        let mut callbacks = Callbacks::new(on_chunk, on_complete, on_error);
        if let Some(on_thinking) = on_thinking {
            callbacks = callbacks.with_thinking(on_thinking);
        }
        self.open(request, callbacks)
    }
}

/// Everything one decode loop owns.
struct SessionRun<H> {
    session: Arc<Session>,
    transport: Arc<dyn ChatTransport>,
    idle_timeout: Option<Duration>,
    handler: H,
}

enum Read {
    Chunk(Bytes),
    End,
    Failed(StreamError),
}

impl<H: StreamHandler> SessionRun<H> {
    async fn run(mut self, request: ChatRequest) {
        let token = self.session.token().clone();

        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(session_id = %self.session.id(), "cancelled before response");
                return;
            }
            opened = connect(&*self.transport, &request, self.idle_timeout) => opened,
        };

        let mut body = match opened {
            Ok(body) => body,
            Err(e) => {
                error!(session_id = %self.session.id(), error = %e, "failed to open chat stream");
                self.fail(e);
                return;
            }
        };
        debug!(session_id = %self.session.id(), "chat stream connected");

        let mut decoder = StreamDecoder::new();
        loop {
            let read = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(session_id = %self.session.id(), "cancelled mid-stream");
                    return;
                }
                read = next_chunk(&mut body, self.idle_timeout) => read,
            };

            match read {
                Read::Chunk(bytes) => {
                    let records = match decoder.feed(&bytes) {
                        Ok(records) => records,
                        Err(e) => {
                            self.fail(e);
                            return;
                        }
                    };
                    if self.dispatch(records).is_break() {
                        return;
                    }
                    if let Err(e) = decoder.check_overflow() {
                        error!(session_id = %self.session.id(), error = %e, "chat stream line too long");
                        self.fail(e);
                        return;
                    }
                }
                Read::End => {
                    if self.dispatch(decoder.finish()).is_break() {
                        return;
                    }
                    debug!(session_id = %self.session.id(), "body ended without terminal record");
                    self.complete();
                    return;
                }
                Read::Failed(e) => {
                    error!(session_id = %self.session.id(), error = %e, "chat stream read failed");
                    self.fail(e);
                    return;
                }
            }
        }
    }

    fn dispatch(&mut self, records: Vec<DecodedRecord>) -> ControlFlow<()> {
        for record in records {
            if !self.session.is_active() {
                return ControlFlow::Break(());
            }
            match record {
                DecodedRecord::Done => {
                    self.complete();
                    return ControlFlow::Break(());
                }
                DecodedRecord::Event(event) => {
                    for event in event.classify() {
                        self.route(event)?;
                    }
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn route(&mut self, event: ChatStreamEvent) -> ControlFlow<()> {
        if !self.session.is_active() {
            return ControlFlow::Break(());
        }
        match event {
            ChatStreamEvent::Thinking { phase, content } => {
                self.handler.on_thinking(phase, &content);
                ControlFlow::Continue(())
            }
            ChatStreamEvent::Content(content) => {
                self.handler.on_chunk(&content);
                ControlFlow::Continue(())
            }
            ChatStreamEvent::Completed => {
                self.complete();
                ControlFlow::Break(())
            }
            ChatStreamEvent::Failed(message) => {
                warn!(session_id = %self.session.id(), %message, "backend reported stream error");
                self.fail(StreamError::Stream(message));
                ControlFlow::Break(())
            }
        }
    }

    fn complete(&mut self) {
        if self.session.finish(SessionState::Completed) {
            info!(session_id = %self.session.id(), "chat stream completed");
            self.handler.on_complete();
        }
    }

    fn fail(&mut self, error: StreamError) {
        if self.session.finish(SessionState::Failed) {
            self.handler.on_error(error);
        }
    }
}

/// Open the body, bounded by the idle timeout while waiting for headers.
async fn connect(
    transport: &dyn ChatTransport,
    request: &ChatRequest,
    idle_timeout: Option<Duration>,
) -> StreamResult<ByteStream> {
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, transport.open_stream(request))
            .await
            .unwrap_or(Err(StreamError::Timeout(limit))),
        None => transport.open_stream(request).await,
    }
}

async fn next_chunk(body: &mut ByteStream, idle_timeout: Option<Duration>) -> Read {
    let next = match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, body.next()).await {
            Ok(next) => next,
            Err(_) => return Read::Failed(StreamError::Timeout(limit)),
        },
        None => body.next().await,
    };
    match next {
        Some(Ok(bytes)) => Read::Chunk(bytes),
        Some(Err(e)) => Read::Failed(e),
        None => Read::End,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, RecordingHandler, ScriptedTransport};
    use pretty_assertions::assert_eq;

    async fn run(transport: ScriptedTransport) -> (Vec<Call>, SessionState) {
        let controller = ChatStreamController::new(transport);
        let recorder = RecordingHandler::new();
        let handle = controller.open(ChatRequest::new("u1", "hi"), recorder.clone());
        let state = handle.finished().await;
        (recorder.calls(), state)
    }

    #[tokio::test]
    async fn test_scenario_content_split_then_done() {
        let transport = ScriptedTransport::new()
            .chunk("data: {\"content\":\"Hel")
            .chunk("lo\"}\n\ndata: [DONE]\n");
        let (calls, state) = run(transport).await;
        assert_eq!(calls, vec![Call::Chunk("Hello".into()), Call::Complete]);
        assert_eq!(state, SessionState::Completed);
    }

    #[tokio::test]
    async fn test_scenario_thinking_only() {
        let transport = ScriptedTransport::new().chunk(
            "data: {\"event\":\"thinking\",\"phase\":\"searching\",\"content\":\"looking up docs\"}\n",
        );
        let (calls, _) = run(transport).await;
        assert_eq!(
            calls,
            vec![
                Call::Thinking(ThinkingPhase::Searching, "looking up docs".into()),
                Call::Complete,
            ]
        );
    }

    #[tokio::test]
    async fn test_scenario_in_band_error() {
        let transport = ScriptedTransport::new()
            .chunk("data: {\"status\":\"error\",\"error\":\"backend down\"}\n")
            .chunk("data: {\"content\":\"ignored\"}\n");
        let (calls, state) = run(transport).await;
        assert_eq!(calls, vec![Call::Error("backend down".into())]);
        assert_eq!(state, SessionState::Failed);
    }

    #[tokio::test]
    async fn test_scenario_http_rejection() {
        let transport = ScriptedTransport::new()
            .reject(500, "internal failure")
            .chunk("data: {\"content\":\"never\"}\n");
        let (calls, state) = run(transport).await;
        assert_eq!(calls, vec![Call::Error("internal failure".into())]);
        assert_eq!(state, SessionState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_cancel_before_first_chunk() {
        let transport = ScriptedTransport::new()
            .delay(Duration::from_millis(50))
            .chunk("data: {\"content\":\"late\"}\n\ndata: [DONE]\n");
        let controller = ChatStreamController::new(transport);
        let recorder = RecordingHandler::new();
        let handle = controller.open(ChatRequest::new("u1", "hi"), recorder.clone());

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(handle.cancel());

        assert_eq!(handle.finished().await, SessionState::Cancelled);
        assert!(recorder.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_connect() {
        let transport = ScriptedTransport::new()
            .connect_delay(Duration::from_secs(10))
            .chunk("data: [DONE]\n");
        let controller = ChatStreamController::new(transport);
        let recorder = RecordingHandler::new();
        let handle = controller.open(ChatRequest::new("u1", "hi"), recorder.clone());

        let cancel = handle.cancel_handle();
        assert!(cancel.cancel());
        assert!(!cancel.cancel());
        assert_eq!(handle.finished().await, SessionState::Cancelled);
        assert!(recorder.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_stream_stops_callbacks() {
        let transport = ScriptedTransport::new()
            .chunk("data: {\"content\":\"first\"}\n")
            .delay(Duration::from_millis(100))
            .chunk("data: {\"content\":\"second\"}\n\ndata: [DONE]\n");
        let controller = ChatStreamController::new(transport);
        let recorder = RecordingHandler::new();
        let handle = controller.open(ChatRequest::new("u1", "hi"), recorder.clone());

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();
        assert_eq!(handle.finished().await, SessionState::Cancelled);
        assert_eq!(recorder.calls(), vec![Call::Chunk("first".into())]);
    }

    #[tokio::test]
    async fn test_cancel_after_completion_is_silent() {
        let transport = ScriptedTransport::new().chunk("data: [DONE]\n");
        let controller = ChatStreamController::new(transport);
        let recorder = RecordingHandler::new();
        let handle = controller.open(ChatRequest::new("u1", "hi"), recorder.clone());
        let cancel = handle.cancel_handle();

        assert_eq!(handle.finished().await, SessionState::Completed);
        assert!(!cancel.cancel());
        assert!(!cancel.cancel());
        assert_eq!(recorder.calls(), vec![Call::Complete]);
    }

    #[tokio::test]
    async fn test_done_halts_following_records_in_same_chunk() {
        let transport = ScriptedTransport::new()
            .chunk("data: {\"content\":\"a\"}\ndata: [DONE]\ndata: {\"content\":\"b\"}\ndata: {\"status\":\"error\",\"error\":\"x\"}\n");
        let (calls, _) = run(transport).await;
        assert_eq!(calls, vec![Call::Chunk("a".into()), Call::Complete]);
    }

    #[tokio::test]
    async fn test_content_and_completed_in_one_record() {
        let transport =
            ScriptedTransport::new().chunk("data: {\"content\":\"bye\",\"status\":\"completed\"}\n");
        let (calls, _) = run(transport).await;
        assert_eq!(calls, vec![Call::Chunk("bye".into()), Call::Complete]);
    }

    #[tokio::test]
    async fn test_transport_error_after_completion_is_ignored() {
        let transport = ScriptedTransport::new()
            .chunk("data: {\"status\":\"completed\"}\n")
            .fail("connection reset");
        let (calls, state) = run(transport).await;
        assert_eq!(calls, vec![Call::Complete]);
        assert_eq!(state, SessionState::Completed);
    }

    #[tokio::test]
    async fn test_transport_error_mid_stream() {
        let transport = ScriptedTransport::new()
            .chunk("data: {\"content\":\"partial\"}\n")
            .fail("connection reset");
        let (calls, state) = run(transport).await;
        assert_eq!(
            calls,
            vec![
                Call::Chunk("partial".into()),
                Call::Error("Connection error: connection reset".into()),
            ]
        );
        assert_eq!(state, SessionState::Failed);
    }

    #[tokio::test]
    async fn test_body_end_without_terminal_record_completes() {
        let transport = ScriptedTransport::new().chunk("data: {\"content\":\"tail\"}");
        let (calls, state) = run(transport).await;
        assert_eq!(calls, vec![Call::Chunk("tail".into()), Call::Complete]);
        assert_eq!(state, SessionState::Completed);
    }

    #[tokio::test]
    async fn test_malformed_record_is_skipped() {
        let transport = ScriptedTransport::new()
            .chunk("data: {not json}\ndata: {\"content\":\"ok\"}\ndata: [DONE]\n");
        let (calls, _) = run(transport).await;
        assert_eq!(calls, vec![Call::Chunk("ok".into()), Call::Complete]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_fails_session() {
        let transport = ScriptedTransport::new()
            .chunk("data: {\"content\":\"hello\"}\n")
            .hang();
        let controller =
            ChatStreamController::new(transport).with_idle_timeout(Duration::from_secs(30));
        let recorder = RecordingHandler::new();
        let handle = controller.open(ChatRequest::new("u1", "hi"), recorder.clone());

        assert_eq!(handle.finished().await, SessionState::Failed);
        assert_eq!(
            recorder.calls(),
            vec![
                Call::Chunk("hello".into()),
                Call::Error("Stream idle for 30s".into()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_covers_hung_connect() {
        let transport = ScriptedTransport::new()
            .connect_delay(Duration::from_secs(3600))
            .chunk("data: [DONE]\n");
        let controller =
            ChatStreamController::new(transport).with_idle_timeout(Duration::from_secs(30));
        let recorder = RecordingHandler::new();
        let handle = controller.open(ChatRequest::new("u1", "hi"), recorder.clone());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(handle.state(), SessionState::Failed);
        assert_eq!(recorder.calls(), vec![Call::Error("Stream idle for 30s".into())]);
        assert_eq!(handle.finished().await, SessionState::Failed);
    }

    #[tokio::test]
    async fn test_overflow_delivers_records_decoded_first() {
        let mut chunk = b"data: {\"content\":\"a\"}\n".to_vec();
        chunk.extend(std::iter::repeat(b'x').take(crate::decoder::MAX_LINE_BYTES + 1));
        let (calls, state) = run(ScriptedTransport::new().chunk(chunk)).await;
        assert_eq!(
            calls,
            vec![
                Call::Chunk("a".into()),
                Call::Error("SSE line exceeded 10485760 bytes".into()),
            ]
        );
        assert_eq!(state, SessionState::Failed);
    }

    #[tokio::test]
    async fn test_fragmentation_does_not_change_callbacks() {
        let payload = concat!(
            "data: {\"event\":\"thinking\",\"phase\":\"memory\",\"content\":\"recalling\"}\n\n",
            "data: {\"event\":\"thinking\",\"phase\":\"planning\",\"content\":\"plan \u{2713}\"}\n\n",
            "data: {\"content\":\"Your order \"}\n\n",
            "data: {\"content\":\"ships today.\"}\n\n",
            "data: {\"status\":\"completed\"}\n\n"
        );

        let (expected, _) = run(ScriptedTransport::new().chunk(payload)).await;
        assert_eq!(expected.len(), 5);

        for size in [1, 2, 3, 7, 13, 64] {
            let (calls, _) = run(ScriptedTransport::from_payload(payload.as_bytes(), size)).await;
            assert_eq!(calls, expected, "chunk size {size}");
        }
    }

    #[tokio::test]
    async fn test_open_with_closures() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        let (chunk_tx, done_tx, err_tx, think_tx) = (tx.clone(), tx.clone(), tx.clone(), tx);
        let transport = ScriptedTransport::new().chunk(
            "data: {\"event\":\"thinking\",\"phase\":\"generating\",\"content\":\"g\"}\ndata: {\"content\":\"x\"}\ndata: [DONE]\n",
        );
        let controller = ChatStreamController::new(transport);
        let handle = controller.open_with(
            ChatRequest::new("u1", "hi"),
            move |c| {
                let _ = chunk_tx.send(format!("chunk:{c}"));
            },
            move || {
                let _ = done_tx.send("complete".into());
            },
            move |e| {
                let _ = err_tx.send(format!("error:{e}"));
            },
            Some(Box::new(move |phase: ThinkingPhase, c: &str| {
                let _ = think_tx.send(format!("{phase}:{c}"));
            })),
        );
        handle.finished().await;

        let mut seen = Vec::new();
        while let Ok(item) = rx.try_recv() {
            seen.push(item);
        }
        assert_eq!(seen, vec!["generating:g", "chunk:x", "complete"]);
    }

    #[tokio::test]
    async fn test_request_is_forwarded_to_transport() {
        let transport = ScriptedTransport::new().chunk("data: [DONE]\n");
        let requests = transport.requests();
        let controller = ChatStreamController::new(transport);
        let request = ChatRequest::new("u1", "where is my order?").with_conversation("c7");
        controller
            .open(request.clone(), RecordingHandler::new())
            .finished()
            .await;
        assert_eq!(*requests.lock(), vec![request]);
    }

    #[test]
    fn test_from_config_carries_idle_timeout() {
        let config = ClientConfig::default().with_stream_idle_timeout(Duration::from_secs(12));
        let controller = ChatStreamController::from_config(&config).unwrap();
        assert_eq!(controller.options().idle_timeout, Some(Duration::from_secs(12)));
    }
}
