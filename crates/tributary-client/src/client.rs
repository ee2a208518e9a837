//! Instance HTTP client
//!
//! Provides a thin authenticated HTTP client for one configuration instance.
//! Handles the bearer header, URL construction with per-segment encoding, JSON
//! decoding, and the translation of HTTP outcomes into [`ClientError`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tributary_client::client::InstanceClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = InstanceClient::new("https://soar.example.com", "access-token")?;
//! let apps = client.get_json(&["app"], &[]).await?;
//! println!("{apps:?}");
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::{multipart, Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::ClientError;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Options applied when building the underlying `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub verify_ssl: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            verify_ssl: true,
        }
    }
}

// ============================================================================
// InstanceClient
// ============================================================================

/// HTTP client for one instance's REST API
///
/// Every path is resolved below `{host}/api`.
#[derive(Debug, Clone)]
pub struct InstanceClient {
    client: Client,
    host: String,
    base_url: Url,
    access_token: String,
}

impl InstanceClient {
    /// Creates a client for `host` with default options
    pub fn new(host: impl Into<String>, access_token: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_options(host, access_token, ClientOptions::default())
    }

    /// Creates a client for `host` with explicit timeout and TLS options
    pub fn with_options(
        host: impl Into<String>,
        access_token: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let host = host.into();
        let base = format!("{}/api", host.trim_end_matches('/'));
        let client = Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(!options.verify_ssl)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;
        Ok(Self {
            client,
            base_url: parse_base(&base)?,
            host,
            access_token: access_token.into(),
        })
    }

    /// Creates a client whose paths resolve directly below `base_url`
    /// (useful for testing against a mock server)
    pub fn with_base_url(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let base = base_url.into();
        Ok(Self {
            client: Client::new(),
            base_url: parse_base(&base)?,
            host: base,
            access_token: access_token.into(),
        })
    }

    /// The host this client talks to
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Resolve `segments` below the base URL, percent-encoding each one
    pub fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Creates an authenticated request builder for the given method and URL
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.access_token)
    }

    // ========================================================================
    // JSON helpers
    // ========================================================================

    /// `GET` a JSON document. 204 and 404 are a clean `None`.
    pub async fn get_json(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Option<Value>, ClientError> {
        let url = self.url(segments, query)?;
        debug!(%url, "GET");
        let response = self.request(Method::GET, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode_optional(check_status(response).await?).await
    }

    /// Send a JSON body and decode the JSON reply. An empty reply yields `None`.
    pub async fn send_json(
        &self,
        method: Method,
        segments: &[&str],
        body: &Value,
    ) -> Result<Option<Value>, ClientError> {
        let url = self.url(segments, &[])?;
        debug!(%url, %method, "Sending JSON");
        let response = self.request(method, url).json(body).send().await?;
        decode_optional(check_status(response).await?).await
    }

    /// `GET` raw bytes
    pub async fn get_bytes(&self, segments: &[&str]) -> Result<Vec<u8>, ClientError> {
        let url = self.url(segments, &[])?;
        debug!(%url, "Downloading");
        let response = check_status(self.request(Method::GET, url).send().await?).await?;
        let bytes = response.bytes().await?;
        debug!(bytes = bytes.len(), "Download complete");
        Ok(bytes.to_vec())
    }

    /// `POST` a single file as multipart form data under the `file` field
    pub async fn post_file(
        &self,
        segments: &[&str],
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<Option<Value>, ClientError> {
        let url = self.url(segments, &[])?;
        debug!(%url, file_name, bytes = data.len(), "Uploading file");
        let part = multipart::Part::bytes(data).file_name(file_name.to_string());
        let form = multipart::Form::new().part("file", part);
        let response = self.request(Method::POST, url).multipart(form).send().await?;
        decode_optional(check_status(response).await?).await
    }
}

fn parse_base(base: &str) -> Result<Url, ClientError> {
    let url = Url::parse(base).map_err(|_| ClientError::InvalidUrl(base.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ClientError::InvalidUrl(base.to_string()));
    }
    Ok(url)
}

/// Turn a non-success status into a [`ClientError::Status`]
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let code = serde_json::from_str::<Value>(&body)
        .ok()
        .as_ref()
        .and_then(error_code);
    Err(ClientError::Status {
        status: status.as_u16(),
        code,
        message: truncate(&body, 512),
    })
}

/// Decode a JSON body; 204 and an empty body are `None`
async fn decode_optional(response: Response) -> Result<Option<Value>, ClientError> {
    if response.status() == StatusCode::NO_CONTENT {
        return Ok(None);
    }
    let body = response.bytes().await?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|e| ClientError::Decode(e.to_string()))
}

/// Instance-specific error code carried in a 400 body
fn error_code(body: &Value) -> Option<i64> {
    ["ErrorCode", "errorCode", "code"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_i64))
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
