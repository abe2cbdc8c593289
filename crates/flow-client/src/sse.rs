//! Server-sent event parsing and stream adaptation
//!
//! [`SseParser`] is a push parser over text: feed it whatever the transport
//! yields and it returns each event completed by a blank line. The stream
//! helpers wrap a byte stream (normally a `reqwest` body) and reassemble
//! UTF-8 sequences split across chunks. One fetch per stream; there is no
//! reconnection.

use std::collections::VecDeque;
use std::pin::Pin;

use futures_util::stream::{self, Stream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::constants::sse::{DEFAULT_EVENT, DONE_MARKER};
use crate::error::{ClientError, Result};
use crate::http::ApiClient;

/// Boxed stream of parsed events
pub type SseStream = Pin<Box<dyn Stream<Item = Result<SseEvent>> + Send>>;

/// One dispatched event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub id: Option<String>,
    pub event: Option<String>,
    /// `data` lines joined with `\n`
    pub data: String,
    /// Reconnection hint in milliseconds, kept for callers; never acted on
    pub retry: Option<u64>,
}

impl SseEvent {
    /// Event name, `"message"` when the frame had no `event:` field
    pub fn name(&self) -> &str {
        self.event.as_deref().unwrap_or(DEFAULT_EVENT)
    }

    /// Whether the data is the `[DONE]` terminator
    pub fn is_done(&self) -> bool {
        self.data.trim() == DONE_MARKER
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.data)
            .map_err(|e| ClientError::Decode(format!("event data: {}", e)))
    }
}

/// Incremental parser for `text/event-stream`
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    current: Option<SseEvent>,
    data_lines: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text and return every event it completes
    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush an unterminated last line and any event still open
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim_end_matches('\r');
        if !rest.is_empty() {
            self.process_line(rest);
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        let event = self.current.get_or_insert_with(SseEvent::default);
        match field {
            "data" => self.data_lines.push(value.to_string()),
            "event" => event.event = Some(value.to_string()),
            "id" => event.id = Some(value.to_string()),
            "retry" => match value.trim().parse() {
                Ok(ms) => event.retry = Some(ms),
                Err(_) => log::debug!("Ignoring invalid retry value '{}'", value),
            },
            other => log::debug!("Ignoring unknown SSE field '{}'", other),
        }
        None
    }

    /// Frames without a `data` line are dropped
    fn dispatch(&mut self) -> Option<SseEvent> {
        let mut event = self.current.take()?;
        if self.data_lines.is_empty() {
            return None;
        }
        event.data = std::mem::take(&mut self.data_lines).join("\n");
        Some(event)
    }
}

/// Parse events out of any byte stream
pub fn events_from_byte_stream<S, B, E>(bytes: S) -> SseStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + 'static,
    E: Into<ClientError> + 'static,
{
    struct State {
        inner: Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>,
        parser: SseParser,
        pending: Vec<u8>,
        queue: VecDeque<SseEvent>,
        done: bool,
    }

    let inner = bytes.map(|item| -> Result<Vec<u8>> {
        match item {
            Ok(chunk) => Ok(chunk.as_ref().to_vec()),
            Err(e) => Err(e.into()),
        }
    });
    let state = State {
        inner: Box::pin(inner),
        parser: SseParser::new(),
        pending: Vec::new(),
        queue: VecDeque::new(),
        done: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.queue.pop_front() {
                return Some((Ok(event), state));
            }
            if state.done {
                return None;
            }
            match state.inner.next().await {
                Some(Ok(bytes)) => {
                    state.pending.extend_from_slice(&bytes);
                    let text = take_utf8(&mut state.pending);
                    let events = state.parser.feed(&text);
                    state.queue.extend(events);
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.done = true;
                    if !state.pending.is_empty() {
                        let text = String::from_utf8_lossy(&state.pending).into_owned();
                        state.pending.clear();
                        let events = state.parser.feed(&text);
                        state.queue.extend(events);
                    }
                    state.queue.extend(state.parser.finish());
                }
            }
        }
    }))
}

/// Parse the body of a response as an event stream
pub fn sse_stream(response: reqwest::Response) -> SseStream {
    events_from_byte_stream(response.bytes_stream())
}

/// POST `body` to `path` and stream the events of the response
///
/// The whole stream is bounded by the configured stream timeout.
pub async fn open_event_stream<B>(client: &ApiClient, path: &str, body: &B) -> Result<SseStream>
where
    B: Serialize + ?Sized,
{
    let request = client
        .request_with_timeout(Method::POST, path, client.config().stream_timeout())
        .header(ACCEPT, "text/event-stream")
        .json(body);
    let response = client.send_checked(request).await?;
    log::debug!("Opened event stream on {}", path);
    Ok(sse_stream(response))
}

/// Take the longest valid UTF-8 prefix, keeping an incomplete tail
fn take_utf8(pending: &mut Vec<u8>) -> String {
    match std::str::from_utf8(pending) {
        Ok(text) => {
            let text = text.to_string();
            pending.clear();
            text
        }
        Err(e) if e.error_len().is_none() => {
            let valid = e.valid_up_to();
            let text = String::from_utf8_lossy(&pending[..valid]).into_owned();
            pending.drain(..valid);
            text
        }
        Err(_) => {
            let text = String::from_utf8_lossy(pending).into_owned();
            pending.clear();
            text
        }
    }
}
