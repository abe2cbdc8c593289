//! Flow Client - backend access for the agent-flow editor
//!
//! Everything here sits at a network boundary; nothing in this crate
//! mutates editor state except [`flows::open_flow`], and only after the
//! fetch has succeeded.
//!
//! - [`HttpFlowApi`]: flow CRUD, copy and run over the REST API
//! - [`HttpNodeRunner`]: single-node execution for debug sessions
//! - [`SseParser`] / [`sse_stream`]: `text/event-stream` parsing
//! - [`chat_stream`]: streamed chat replies
//!
//! # Example
//!
//! ```ignore
//! use flow_client::{ApiClient, ClientConfig, FlowApi, FlowQuery, HttpFlowApi};
//!
//! let config = ClientConfig::load("client.json").await?;
//! let api = HttpFlowApi::new(ApiClient::new(config)?);
//! let page = api.list_flows(&FlowQuery::default()).await?;
//! ```

pub mod chat;
pub mod config;
pub mod constants;
pub mod envelope;
pub mod error;
pub mod flows;
pub mod http;
pub mod node_runner;
pub mod sse;

pub use chat::{chat_stream, collect_reply, ChatChunk, ChatMessage, ChatRequest, ChatStream};
pub use config::ClientConfig;
pub use envelope::ApiEnvelope;
pub use error::{ClientError, Result};
pub use flows::{
    open_flow, save_flow, FlowApi, FlowDraft, FlowPage, FlowQuery, FlowRecord, FlowRunResult,
    FlowSummary, HttpFlowApi,
};
pub use http::ApiClient;
pub use node_runner::HttpNodeRunner;
pub use sse::{
    events_from_byte_stream, open_event_stream, sse_stream, SseEvent, SseParser, SseStream,
};
