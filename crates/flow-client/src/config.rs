//! Configuration for the backend client

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::defaults;
use crate::error::{ClientError, Result};

/// Where the backend lives and how long to wait for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Base URL without a trailing slash, e.g. "http://localhost:8080"
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub node_timeout_ms: u64,
    pub stream_timeout_ms: u64,
    /// Sent as a bearer token when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::BASE_URL.to_string(),
            request_timeout_ms: defaults::REQUEST_TIMEOUT_MS,
            node_timeout_ms: defaults::NODE_TIMEOUT_MS,
            stream_timeout_ms: defaults::STREAM_TIMEOUT_MS,
            auth_token: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Read a JSON config file; missing fields take their defaults
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        log::debug!("Loaded client config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(ClientError::Config("base_url is empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "base_url must be http(s): {}",
                url
            )));
        }
        if self.request_timeout_ms == 0 || self.node_timeout_ms == 0 || self.stream_timeout_ms == 0
        {
            return Err(ClientError::Config("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Join an endpoint path onto the base URL
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn node_timeout(&self) -> Duration {
        Duration::from_millis(self.node_timeout_ms)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_timeout_ms)
    }
}
