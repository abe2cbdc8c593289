//! Client-wide constants

/// Default values for client configuration
pub mod defaults {
    pub const BASE_URL: &str = "http://127.0.0.1:8080";
    /// Ordinary REST calls
    pub const REQUEST_TIMEOUT_MS: u64 = 30_000;
    /// Single node executions, which may call a model
    pub const NODE_TIMEOUT_MS: u64 = 120_000;
    /// Whole lifetime of one event stream
    pub const STREAM_TIMEOUT_MS: u64 = 300_000;
    pub const PAGE_SIZE: u32 = 20;
}

/// Backend endpoint paths, relative to the base URL
pub mod endpoints {
    pub const FLOWS: &str = "/api/flows";
    pub const EXECUTE_NODE: &str = "/api/nodes/execute";
    pub const EXECUTE_AI_DIALOG: &str = "/api/nodes/ai-dialog/execute";
    pub const CHAT_STREAM: &str = "/api/chat/stream";
}

/// Server-sent event framing
pub mod sse {
    /// Data payload that marks the end of a chat stream
    pub const DONE_MARKER: &str = "[DONE]";
    /// Event name used when a frame carries no `event:` field
    pub const DEFAULT_EVENT: &str = "message";
}
