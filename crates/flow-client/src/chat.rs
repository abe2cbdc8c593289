//! Streaming chat replies on top of the event stream

use std::pin::Pin;

use futures_util::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::constants::endpoints;
use crate::error::{ClientError, Result};
use crate::http::ApiClient;
use crate::sse::{open_event_stream, SseEvent, SseStream};

/// A streaming chunk of a chat reply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatChunk {
    /// Text content of this chunk
    pub content: Option<String>,
    /// Whether this is the final chunk
    pub done: bool,
}

pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatChunk>> + Send>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(message)],
            conversation_id: None,
            flow_id: None,
        }
    }
}

/// Open a streamed chat reply
pub async fn chat_stream(client: &ApiClient, request: &ChatRequest) -> Result<ChatStream> {
    let events = open_event_stream(client, endpoints::CHAT_STREAM, request).await?;
    Ok(chunks_from_events(events))
}

/// Map events to chunks, ending after `[DONE]` or an `error` event
pub fn chunks_from_events(events: SseStream) -> ChatStream {
    Box::pin(stream::unfold(Some(events), |events| async move {
        let mut events = events?;
        let event = match events.next().await? {
            Ok(event) => event,
            Err(e) => return Some((Err(e), None)),
        };
        if event.name() == "error" {
            log::warn!("Chat stream reported an error: {}", event.data);
            return Some((Err(ClientError::api(500, event.data)), None));
        }
        let chunk = parse_chunk(&event);
        let next = if chunk.done { None } else { Some(events) };
        Some((Ok(chunk), next))
    }))
}

/// Drain a chat stream into the full reply text
pub async fn collect_reply(mut chunks: ChatStream) -> Result<String> {
    let mut reply = String::new();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        if let Some(content) = chunk.content {
            reply.push_str(&content);
        }
        if chunk.done {
            break;
        }
    }
    Ok(reply)
}

fn parse_chunk(event: &SseEvent) -> ChatChunk {
    if event.is_done() {
        return ChatChunk {
            content: None,
            done: true,
        };
    }

    // Only objects are structured chunks; anything else is a plain-text token
    let content = match serde_json::from_str::<serde_json::Value>(&event.data) {
        Ok(json) if json.is_object() => json
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("delta"))
            .and_then(|d| d.get("content"))
            .or_else(|| json.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string),
        _ => Some(event.data.clone()),
    };
    ChatChunk {
        content: content.filter(|c| !c.is_empty()),
        done: false,
    }
}
