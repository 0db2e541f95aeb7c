//! Incremental decoding of the price-matrix event stream.
//!
//! The service answers with a line-oriented text body. Meaningful lines look
//! like `data: <json>`; `data: keep-alive` is a heartbeat, lines starting with
//! `:` are comments and blank lines separate events. Chunks from the
//! transport can end anywhere, including in the middle of a line or of a
//! multi-byte character, so bytes are buffered until a full line is seen.

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::types::MatrixEvent;

/// Prefix of payload lines.
pub const DATA_PREFIX: &str = "data:";

/// Payload of heartbeat lines.
pub const KEEP_ALIVE: &str = "keep-alive";

/// Longest line kept while waiting for its newline.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// A boxed stream of decoded events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<MatrixEvent>> + Send + 'static>>;

// ─────────────────────────────────────────────────────────────────────────────
// Line decoding
// ─────────────────────────────────────────────────────────────────────────────

/// Decode a single complete line.
///
/// Returns `None` for blank lines, comments, heartbeats, non-payload lines
/// and payloads that fail to decode. A decode failure only loses that line.
pub fn decode_line(line: &str) -> Option<MatrixEvent> {
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() || line.starts_with(':') {
        return None;
    }

    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        trace!(line = %line, "Ignoring non-data line");
        return None;
    };

    let payload = payload.trim();
    if payload.is_empty() || payload == KEEP_ALIVE {
        return None;
    }

    match serde_json::from_str::<MatrixEvent>(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(data = %payload, error = %e, "Failed to parse stream event");
            None
        }
    }
}

/// Reassembles transport chunks into lines and decodes them.
///
/// A line that grows past [`MAX_LINE_BYTES`] without a newline is dropped,
/// along with whatever of it arrives later.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    discarding: bool,
}

impl LineDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the events of every line it completes.
    ///
    /// The trailing partial line is kept for the next chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<MatrixEvent> {
        self.buffer.extend_from_slice(chunk);

        let events = match self.buffer.iter().rposition(|b| *b == b'\n') {
            Some(last_newline) => {
                let complete: Vec<u8> = self.buffer.drain(..=last_newline).collect();
                // The first line is the tail of an oversized one
                let skip = usize::from(std::mem::take(&mut self.discarding));
                complete
                    .split(|b| *b == b'\n')
                    .skip(skip)
                    .filter_map(|line| decode_line(&String::from_utf8_lossy(line)))
                    .collect()
            }
            None => Vec::new(),
        };

        if self.buffer.len() > MAX_LINE_BYTES {
            warn!(
                bytes = self.buffer.len(),
                limit = MAX_LINE_BYTES,
                "Dropping oversized stream line"
            );
            self.buffer.clear();
            self.discarding = true;
        }

        events
    }

    /// Flush the final unterminated line once the transport is exhausted.
    pub fn finish(&mut self) -> Option<MatrixEvent> {
        if std::mem::take(&mut self.discarding) {
            self.buffer.clear();
            return None;
        }
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&String::from_utf8_lossy(&rest))
    }

    /// Number of buffered bytes not yet forming a complete line.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stream adapter
// ─────────────────────────────────────────────────────────────────────────────

/// Turn a byte stream into a stream of decoded events.
///
/// The stream ends when the transport reports end-of-data or when `cancel`
/// fires. Cancellation ends it silently; only transport failures are yielded
/// as errors, after which the stream ends. Transport errors keep their kind,
/// so a body read from reqwest that times out is still [`Error::Http`].
pub fn event_stream<S, E>(byte_stream: S, cancel: CancellationToken) -> EventStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Into<Error> + Send + 'static,
{
    Box::pin(futures::stream::unfold(
        StreamState {
            byte_stream: Box::pin(byte_stream),
            decoder: LineDecoder::new(),
            queue: VecDeque::new(),
            cancel,
            done: false,
        },
        |mut state| async move {
            loop {
                if state.cancel.is_cancelled() {
                    debug!("Event stream cancelled");
                    return None;
                }

                if let Some(event) = state.queue.pop_front() {
                    return Some((Ok(event), state));
                }

                if state.done {
                    return None;
                }

                // Need more data from the byte stream
                let next = tokio::select! {
                    biased;
                    _ = state.cancel.cancelled() => {
                        debug!("Event stream cancelled while waiting for data");
                        return None;
                    }
                    next = state.byte_stream.next() => next,
                };

                match next {
                    Some(Ok(bytes)) => {
                        let events = state.decoder.push(&bytes);
                        state.queue.extend(events);
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((Err(e.into()), state));
                    }
                    None => {
                        state.done = true;
                        state.queue.extend(state.decoder.finish());
                    }
                }
            }
        },
    ))
}

struct StreamState<E> {
    byte_stream: Pin<Box<dyn Stream<Item = std::result::Result<Bytes, E>> + Send>>,
    decoder: LineDecoder,
    queue: VecDeque<MatrixEvent>,
    cancel: CancellationToken,
    done: bool,
}
