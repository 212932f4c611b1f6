//! Callback contract between the stream controller and its consumer.
//!
//! Callbacks run inline on the decode loop between reads, so they must be
//! quick, non-blocking state updates.

use crate::error::StreamError;
use std::fmt;
use supportdesk_core::ThinkingPhase;

/// Receiver of a single chat stream's events.
///
/// For one session, `on_chunk` and `on_thinking` fire in arrival order,
/// followed by exactly one of `on_complete` or `on_error`, unless the
/// session is cancelled, in which case neither terminal callback fires.
pub trait StreamHandler: Send + 'static {
    /// A content fragment. Fragments never overlap; concatenate them.
    fn on_chunk(&mut self, content: &str);

    /// The stream finished normally.
    fn on_complete(&mut self);

    /// The stream failed.
    fn on_error(&mut self, error: StreamError);

    /// A thinking-phase utterance. Ignored by default.
    fn on_thinking(&mut self, phase: ThinkingPhase, content: &str) {
        let _ = (phase, content);
    }
}

type ChunkFn = Box<dyn FnMut(&str) + Send>;
type CompleteFn = Box<dyn FnMut() + Send>;
type ErrorFn = Box<dyn FnMut(StreamError) + Send>;
type ThinkingFn = Box<dyn FnMut(ThinkingPhase, &str) + Send>;

/// A [`StreamHandler`] assembled from closures.
///
/// # Example
///
/// ```rust
/// use supportdesk_streaming::Callbacks;
///
/// let callbacks = Callbacks::new(
///     |chunk| print!("{chunk}"),
///     || println!(),
///     |err| eprintln!("stream failed: {err}"),
/// )
/// .with_thinking(|phase, text| eprintln!("[{phase}] {text}"));
/// ```
pub struct Callbacks {
    on_chunk: ChunkFn,
    on_complete: CompleteFn,
    on_error: ErrorFn,
    on_thinking: Option<ThinkingFn>,
}

impl Callbacks {
    /// Create callbacks for the three required channels.
    pub fn new<C, D, E>(on_chunk: C, on_complete: D, on_error: E) -> Self
    where
        C: FnMut(&str) + Send + 'static,
        D: FnMut() + Send + 'static,
        E: FnMut(StreamError) + Send + 'static,
    {
        Self {
            on_chunk: Box::new(on_chunk),
            on_complete: Box::new(on_complete),
            on_error: Box::new(on_error),
            on_thinking: None,
        }
    }

    /// Add the optional thinking callback.
    #[must_use]
    pub fn with_thinking<T>(mut self, on_thinking: T) -> Self
    where
        T: FnMut(ThinkingPhase, &str) + Send + 'static,
    {
        self.on_thinking = Some(Box::new(on_thinking));
        self
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("has_thinking", &self.on_thinking.is_some())
            .finish_non_exhaustive()
    }
}

impl StreamHandler for Callbacks {
    fn on_chunk(&mut self, content: &str) {
        (self.on_chunk)(content);
    }

    fn on_complete(&mut self) {
        (self.on_complete)();
    }

    fn on_error(&mut self, error: StreamError) {
        (self.on_error)(error);
    }

    fn on_thinking(&mut self, phase: ThinkingPhase, content: &str) {
        if let Some(on_thinking) = self.on_thinking.as_mut() {
            on_thinking(phase, content);
        }
    }
}
