use crate::constants::{api::DATA_PREFIX, messages::UNKNOWN_ERROR};
use crate::error::ChatError;
use futures::{Stream, StreamExt};
use serde_json::{Map, Value};
use std::collections::VecDeque;

/// Typed events decoded from the answer stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Informational frame; carries every field except `type`.
    Metadata(Map<String, Value>),
    Content(String),
    Done,
    /// `synthetic` is set when the error was produced locally from a
    /// transport failure rather than sent by the service.
    Error { message: String, synthetic: bool },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error { .. })
    }

    fn transport(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
            synthetic: true,
        }
    }
}

/// Incremental decoder for `data: {json}` framed lines.
///
/// Bytes are buffered until a full line is available, so fragments may split
/// a line or a multi-byte character anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and return the events completed by it, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let scan_from = self.buffer.len();
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut consumed = 0;
        let mut search = scan_from;
        while let Some(offset) = self.buffer[search..].iter().position(|b| *b == b'\n') {
            let line_end = search + offset;
            let line = String::from_utf8_lossy(&self.buffer[consumed..line_end]);
            if let Some(event) = parse_line(&line) {
                events.push(event);
            }
            consumed = line_end + 1;
            search = consumed;
        }
        self.buffer.drain(..consumed);
        events
    }

    /// Bytes of the incomplete trailing line.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any incomplete trailing line at end of stream.
    pub fn finish(&mut self) {
        if !self.buffer.is_empty() {
            tracing::debug!(
                "Discarding {} bytes of unterminated stream line",
                self.buffer.len()
            );
            self.buffer.clear();
        }
    }
}

/// Parse one complete line. Returns `None` for lines that carry no event,
/// including malformed frames, which are logged and skipped.
pub fn parse_line(line: &str) -> Option<StreamEvent> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let payload = line.strip_prefix(DATA_PREFIX)?;
    if payload.trim().is_empty() {
        return None;
    }

    let frame: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Skipping malformed stream frame: {e}");
            return None;
        }
    };

    match frame.get("type").and_then(|t| t.as_str()) {
        Some("metadata") => {
            let mut fields = match frame {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            fields.remove("type");
            Some(StreamEvent::Metadata(fields))
        }
        Some("content") => match frame.get("content").and_then(|c| c.as_str()) {
            Some(delta) => Some(StreamEvent::Content(delta.to_string())),
            None => {
                tracing::warn!("Skipping content frame without text");
                None
            }
        },
        Some("done") => Some(StreamEvent::Done),
        Some("error") => Some(StreamEvent::Error {
            message: frame
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or(UNKNOWN_ERROR)
                .to_string(),
            synthetic: false,
        }),
        other => {
            tracing::warn!("Skipping stream frame with unknown type {:?}", other);
            None
        }
    }
}

struct DecodeState<S> {
    inner: S,
    decoder: SseDecoder,
    pending: VecDeque<StreamEvent>,
    finished: bool,
}

/// Lazily decode a byte stream into events.
///
/// The sequence ends after the first `Done`/`Error` event or when the
/// transport ends. A transport failure seen before any terminal event is
/// yielded as a synthetic `Error`.
pub fn decode_stream<S>(bytes: S) -> impl Stream<Item = StreamEvent>
where
    S: Stream<Item = Result<Vec<u8>, ChatError>> + Unpin,
{
    let state = DecodeState {
        inner: bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(event) = st.pending.pop_front() {
                if event.is_terminal() {
                    st.finished = true;
                    st.pending.clear();
                }
                return Some((event, st));
            }
            if st.finished {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(chunk)) => {
                    let events = st.decoder.feed(&chunk);
                    st.pending.extend(events);
                }
                Some(Err(e)) => {
                    tracing::warn!("Answer stream failed: {e}");
                    st.finished = true;
                    return Some((StreamEvent::transport(e.to_string()), st));
                }
                None => {
                    st.decoder.finish();
                    st.finished = true;
                }
            }
        }
    })
}
