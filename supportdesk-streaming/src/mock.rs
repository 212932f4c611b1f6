//! Scripted transport and recording handler for tests.
//!
//! - [`ScriptedTransport`]: replays a fixed sequence of chunks, delays, and
//!   failures, so tests control fragmentation and timing exactly.
//! - [`RecordingHandler`]: records every callback in order.
//!
//! # Example
//!
//! ```rust,ignore
//! use supportdesk_streaming::mock::{RecordingHandler, ScriptedTransport};
//! use supportdesk_streaming::ChatStreamController;
//!
//! let transport = ScriptedTransport::new()
//!     .chunk("data: {\"content\":\"Hel")
//!     .chunk("lo\"}\n\ndata: [DONE]\n");
//! let recorder = RecordingHandler::new();
//! let handle = ChatStreamController::new(transport).open(request, recorder.clone());
//! handle.finished().await;
//! ```

use crate::error::{StreamError, StreamResult};
use crate::handler::StreamHandler;
use crate::transport::{ByteStream, ChatTransport};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use supportdesk_core::{ChatRequest, ThinkingPhase};

/// One step of a scripted response body.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Deliver a chunk.
    Chunk(Bytes),
    /// Wait before the next step.
    Delay(Duration),
    /// Fail the body read.
    Fail(String),
}

/// A [`ChatTransport`] that replays a script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    steps: Vec<ScriptStep>,
    connect_delay: Option<Duration>,
    rejection: Option<(u16, String)>,
    hang: bool,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedTransport {
    /// Create an empty script (body ends immediately).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Split `payload` into chunks of `chunk_size` bytes.
    #[must_use]
    pub fn from_payload(payload: &[u8], chunk_size: usize) -> Self {
        payload
            .chunks(chunk_size.max(1))
            .fold(Self::new(), |t, c| t.chunk(Bytes::copy_from_slice(c)))
    }

    /// Append a chunk.
    #[must_use]
    pub fn chunk(mut self, chunk: impl Into<Bytes>) -> Self {
        self.steps.push(ScriptStep::Chunk(chunk.into()));
        self
    }

    /// Append a delay.
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.steps.push(ScriptStep::Delay(delay));
        self
    }

    /// Append a body read failure.
    #[must_use]
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.steps.push(ScriptStep::Fail(message.into()));
        self
    }

    /// Keep the body open forever after the script runs out.
    #[must_use]
    pub fn hang(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Delay response headers.
    #[must_use]
    pub fn connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// Reject the request with an HTTP error instead of streaming.
    #[must_use]
    pub fn reject(mut self, status: u16, message: impl Into<String>) -> Self {
        self.rejection = Some((status, message.into()));
        self
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Arc<Mutex<Vec<ChatRequest>>> {
        Arc::clone(&self.requests)
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn open_stream(&self, request: &ChatRequest) -> StreamResult<ByteStream> {
        self.requests.lock().push(request.clone());

        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some((status, message)) = &self.rejection {
            return Err(StreamError::http(*status, message.clone()));
        }

        let steps: VecDeque<ScriptStep> = self.steps.iter().cloned().collect();
        let hang = self.hang;
        let body = futures::stream::unfold(steps, move |mut steps| async move {
            loop {
                match steps.pop_front() {
                    Some(ScriptStep::Delay(delay)) => tokio::time::sleep(delay).await,
                    Some(ScriptStep::Chunk(bytes)) => return Some((Ok(bytes), steps)),
                    Some(ScriptStep::Fail(message)) => {
                        return Some((Err(StreamError::Transport(message)), steps))
                    }
                    None if hang => futures::future::pending::<()>().await,
                    None => return None,
                }
            }
        });
        Ok(Box::pin(body))
    }
}

/// A recorded callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `on_chunk`
    Chunk(String),
    /// `on_thinking`
    Thinking(ThinkingPhase, String),
    /// `on_complete`
    Complete,
    /// `on_error`, with the error's display text.
    Error(String),
}

/// A [`StreamHandler`] that records every callback.
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingHandler {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl RecordingHandler {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the calls so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Number of terminal callbacks recorded.
    #[must_use]
    pub fn terminal_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::Complete | Call::Error(_)))
            .count()
    }
}

impl StreamHandler for RecordingHandler {
    fn on_chunk(&mut self, content: &str) {
        self.calls.lock().push(Call::Chunk(content.to_string()));
    }

    fn on_complete(&mut self) {
        self.calls.lock().push(Call::Complete);
    }

    fn on_error(&mut self, error: StreamError) {
        self.calls.lock().push(Call::Error(error.to_string()));
    }

    fn on_thinking(&mut self, phase: ThinkingPhase, content: &str) {
        self.calls
            .lock()
            .push(Call::Thinking(phase, content.to_string()));
    }
}
