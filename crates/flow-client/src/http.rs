//! Thin authenticated wrapper over `reqwest` for the backend API

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::envelope::ApiEnvelope;
use crate::error::{ClientError, Result};

/// Shared HTTP client bound to one backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: reqwest::Client,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Start a request with auth and the default REST timeout applied
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_with_timeout(method, path, self.config.request_timeout())
    }

    pub fn request_with_timeout(
        &self,
        method: Method,
        path: &str,
        timeout: Duration,
    ) -> RequestBuilder {
        let builder = self
            .http_client
            .request(method, self.config.url(path))
            .timeout(timeout);
        match &self.config.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// GET and unwrap an envelope
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.request(Method::GET, path).query(query).send().await?;
        read_envelope::<T>(response).await?.into_result()
    }

    /// Send a JSON body and unwrap an envelope
    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.request(method, path).json(body).send().await?;
        read_envelope::<T>(response).await?.into_result()
    }

    /// Send a request whose envelope carries no payload
    pub async fn send_unit(&self, method: Method, path: &str) -> Result<()> {
        let response = self.request(method, path).send().await?;
        read_envelope::<serde_json::Value>(response)
            .await?
            .into_unit()
    }

    /// Send a request and return the raw response once the status is 2xx
    pub async fn send_checked(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        ensure_success(response).await
    }
}

/// Append percent-encoded segments to a fixed endpoint path
///
/// Each segment stays one path segment even when it contains `/`, `?` or `#`.
pub fn endpoint_path(base: &str, segments: &[&str]) -> Result<String> {
    let mut url = reqwest::Url::parse("http://localhost/")
        .map_err(|e| ClientError::Config(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| ClientError::Config("URL cannot carry a path".to_string()))?
        .pop_if_empty()
        .extend(base.split('/').filter(|s| !s.is_empty()))
        .extend(segments);
    Ok(url.path().to_string())
}

/// Turn a non-2xx response into `ClientError::Api`, preferring the envelope message
pub async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&body)
        .ok()
        .map(|envelope| envelope.message)
        .filter(|message| !message.is_empty())
        .unwrap_or(body);
    log::warn!("Backend returned {}: {}", status, message);
    Err(ClientError::api(status.as_u16(), message))
}

async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<ApiEnvelope<T>> {
    let response = ensure_success(response).await?;
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ClientError::Decode(format!("{}: {}", e, body)))
}
