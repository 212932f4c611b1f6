//! Incremental SSE decoder for the chat stream.
//!
//! The backend frames every record as a single `data: <payload>` line, where
//! the payload is either the literal `[DONE]` or one complete JSON object. A
//! JSON object never spans multiple `data:` lines; a line whose payload does
//! not parse is logged and dropped, not buffered for reassembly.

use crate::error::{StreamError, StreamResult};
use crate::events::StreamEvent;
use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Longest undelimited line the decoder will hold.
pub const MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

/// Prefix of an SSE data line.
pub const DATA_PREFIX: &str = "data: ";

/// Out-of-band completion sentinel.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Output of the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedRecord {
    /// A successfully parsed JSON record.
    Event(StreamEvent),
    /// The `[DONE]` sentinel. Nothing follows it.
    Done,
}

/// Line-oriented SSE decoder.
///
/// Feed it chunks as they arrive; it returns every record completed by the
/// chunk and keeps the unterminated tail for the next call. Multi-byte UTF-8
/// sequences split across chunks are held back until complete.
///
/// The decoder is single-use: after `[DONE]` or [`finish`](Self::finish) it
/// ignores further input.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: String,
    partial_utf8: Vec<u8>,
    finished: bool,
}

impl StreamDecoder {
    /// Create a new decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes.
    ///
    /// If the chunk completes records and also leaves an unterminated line
    /// past [`MAX_LINE_BYTES`], the records are returned and the overflow is
    /// reported by [`check_overflow`](Self::check_overflow) and by every
    /// later call.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::BufferOverflow`] if the buffer is over the
    /// limit and the chunk completed no record.
    pub fn feed(&mut self, chunk: &[u8]) -> StreamResult<Vec<DecodedRecord>> {
        if self.finished {
            return Ok(Vec::new());
        }
        self.check_overflow()?;
        self.decode_utf8(chunk);
        self.drain_lines()
    }

    /// Signal end of input and decode whatever is left in the buffer.
    ///
    /// A final `data:` line that lacks its trailing newline is still decoded.
    pub fn finish(&mut self) -> Vec<DecodedRecord> {
        if self.finished {
            return Vec::new();
        }
        if !self.partial_utf8.is_empty() {
            let tail = std::mem::take(&mut self.partial_utf8);
            self.buffer.push_str(&String::from_utf8_lossy(&tail));
        }
        let rest = std::mem::take(&mut self.buffer);
        self.finished = true;
        parse_line(&rest).into_iter().collect()
    }

    /// Whether the decoder has seen `[DONE]` or been finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bytes currently held waiting for a newline.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len() + self.partial_utf8.len()
    }

    fn decode_utf8(&mut self, chunk: &[u8]) {
        let owned;
        let mut bytes: &[u8] = if self.partial_utf8.is_empty() {
            chunk
        } else {
            self.partial_utf8.extend_from_slice(chunk);
            owned = std::mem::take(&mut self.partial_utf8);
            &owned
        };

        loop {
            match std::str::from_utf8(bytes) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(err) => {
                    let (valid, rest) = bytes.split_at(err.valid_up_to());
                    // `valid_up_to` always lands on a char boundary.
                    self.buffer
                        .push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match err.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            bytes = &rest[len..];
                        }
                        None => {
                            self.partial_utf8.extend_from_slice(rest);
                            return;
                        }
                    }
                }
            }
        }
    }

    fn drain_lines(&mut self) -> StreamResult<Vec<DecodedRecord>> {
        let Some(last_newline) = self.buffer.rfind('\n') else {
            return self.check_overflow().map(|()| Vec::new());
        };

        let complete: String = self.buffer.drain(..=last_newline).collect();
        let mut records = Vec::new();
        for line in complete.split('\n') {
            match parse_line(line) {
                Some(DecodedRecord::Done) => {
                    tracing::debug!("received [DONE] sentinel");
                    self.finished = true;
                    self.buffer.clear();
                    self.partial_utf8.clear();
                    records.push(DecodedRecord::Done);
                    return Ok(records);
                }
                Some(record) => records.push(record),
                None => {}
            }
        }

        if records.is_empty() {
            self.check_overflow()?;
        }
        Ok(records)
    }

    /// Fail if the unterminated tail has grown past [`MAX_LINE_BYTES`].
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::BufferOverflow`] when over the limit.
    pub fn check_overflow(&self) -> StreamResult<()> {
        if self.buffered_len() > MAX_LINE_BYTES {
            return Err(StreamError::BufferOverflow(MAX_LINE_BYTES));
        }
        Ok(())
    }
}

fn parse_line(line: &str) -> Option<DecodedRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        tracing::trace!(line, "skipping non-data SSE line");
        return None;
    };

    if payload == DONE_SENTINEL {
        return Some(DecodedRecord::Done);
    }

    match serde_json::from_str::<StreamEvent>(payload) {
        Ok(event) => Some(DecodedRecord::Event(event)),
        Err(e) => {
            tracing::warn!(error = %e, payload, "Failed to parse SSE data, dropping record");
            None
        }
    }
}

pin_project! {
    /// Stream adapter that decodes records from a byte stream.
    ///
    /// Ends after `[DONE]` without polling the inner stream again, or when
    /// the inner stream ends.
    pub struct DecodedStream<S> {
        #[pin]
        inner: S,
        decoder: StreamDecoder,
        pending: VecDeque<DecodedRecord>,
        error: Option<StreamError>,
        finished: bool,
    }
}

impl<S> DecodedStream<S>
where
    S: Stream<Item = StreamResult<Bytes>>,
{
    /// Create a new decoding stream.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            decoder: StreamDecoder::new(),
            pending: VecDeque::new(),
            error: None,
            finished: false,
        }
    }
}

impl<S> Stream for DecodedStream<S>
where
    S: Stream<Item = StreamResult<Bytes>>,
{
    type Item = StreamResult<DecodedRecord>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(record) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(record)));
            }

            if let Some(e) = this.error.take() {
                return Poll::Ready(Some(Err(e)));
            }

            if *this.finished {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => match this.decoder.feed(&bytes) {
                    Ok(records) => {
                        this.pending.extend(records);
                        if this.decoder.is_finished() {
                            *this.finished = true;
                        } else if let Err(e) = this.decoder.check_overflow() {
                            *this.error = Some(e);
                            *this.finished = true;
                        }
                    }
                    Err(e) => {
                        *this.finished = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                },
                Poll::Ready(Some(Err(e))) => {
                    *this.finished = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    *this.finished = true;
                    this.pending.extend(this.decoder.finish());
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
