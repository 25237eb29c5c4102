// crates/coinload-core/src/executor.rs
// ============================================================================
// Module: Request Executor
// Description: Single HTTP call with a deadline and bounded response body.
// Purpose: Separate transport failures from application-level statuses.
// Dependencies: async-trait, reqwest, serde, serde_json, thiserror, url
// ============================================================================

//! ## Overview
//! [`RequestExecutor`] is the seam between the scenario logic and the
//! network. [`ReqwestExecutor`] is the production implementation: it
//! enforces the per-request timeout, never follows redirects, and reads
//! response bodies under a hard byte limit. Any status code (including 5xx)
//! is returned as a normal [`HttpResponse`]; only transport failures become
//! [`NetworkError`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::Method;
use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use reqwest::redirect::Policy;
use serde::Serialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Default maximum response body size in bytes.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;
/// Default user agent for outbound requests.
pub const DEFAULT_USER_AGENT: &str = "coinload/0.1";

// ============================================================================
// SECTION: Request / Response Types
// ============================================================================

/// HTTP methods used by the scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// HTTP GET.
    Get,
    /// HTTP POST.
    Post,
}

impl HttpMethod {
    /// Returns the canonical method label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Outbound HTTP request.
///
/// # Invariants
/// - `timeout` bounds the full request lifecycle, body included.
#[derive(Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method.
    pub method: HttpMethod,
    /// Absolute request URL.
    pub url: Url,
    /// Extra request headers as name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Optional request body.
    pub body: Option<Vec<u8>>,
    /// Request deadline.
    pub timeout: Duration,
}

impl HttpRequest {
    /// Builds a GET request with the default timeout.
    #[must_use]
    pub const fn get(url: Url) -> Self {
        Self {
            method: HttpMethod::Get,
            url,
            headers: Vec::new(),
            body: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Builds a POST request carrying `payload` encoded as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::InvalidRequest`] when the payload cannot be encoded.
    pub fn post_json<T: Serialize>(url: Url, payload: &T) -> Result<Self, NetworkError> {
        let body = serde_json::to_vec(payload)
            .map_err(|err| NetworkError::InvalidRequest(format!("json encoding failed: {err}")))?;
        Ok(Self {
            method: HttpMethod::Post,
            url,
            headers: vec![(CONTENT_TYPE.as_str().to_string(), "application/json".to_string())],
            body: Some(body),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Adds a bearer `Authorization` header.
    #[must_use]
    pub fn with_bearer(mut self, token: &str) -> Self {
        self.headers.push((AUTHORIZATION.as_str().to_string(), format!("Bearer {token}")));
        self
    }

    /// Replaces the request deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the first header value matching `name` (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(name, value)| {
                if name.eq_ignore_ascii_case(AUTHORIZATION.as_str()) {
                    (name.as_str(), "<redacted>")
                } else {
                    (name.as_str(), value.as_str())
                }
            })
            .collect();
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &headers)
            .field("body_bytes", &self.body.as_ref().map(Vec::len))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// HTTP response captured by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Response status code.
    pub status: u16,
    /// Response body (bounded by the executor limit).
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Builds a response from a status and body.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Transport-level failures.
///
/// # Invariants
/// - Application statuses never appear here; they are returned as responses.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkError {
    /// The request exceeded its deadline.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout {
        /// Configured deadline in milliseconds.
        timeout_ms: u64,
    },
    /// Connection, DNS, or protocol failure.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// Response body exceeded the configured limit.
    #[error("response exceeds size limit ({actual} > {limit})")]
    ResponseTooLarge {
        /// Bytes read before giving up.
        actual: usize,
        /// Maximum size in bytes.
        limit: usize,
    },
    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl NetworkError {
    /// Returns a stable label for event logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout {
                ..
            } => "timeout",
            Self::ConnectionFailed(_) => "connection_failed",
            Self::ResponseTooLarge {
                ..
            } => "response_too_large",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Issues a single HTTP call.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Executes `request`, returning any status as a response.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError`] for transport failures only.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, NetworkError>;
}

// ============================================================================
// SECTION: Reqwest Executor
// ============================================================================

/// Executor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Maximum response body size in bytes.
    pub max_response_bytes: usize,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Production executor backed by a shared `reqwest` client.
///
/// # Invariants
/// - Redirects are not followed.
/// - Response bodies larger than `max_response_bytes` fail closed.
#[derive(Debug, Clone)]
pub struct ReqwestExecutor {
    /// Shared connection-pooling client.
    client: Client,
    /// Maximum response body size in bytes.
    max_response_bytes: usize,
}

impl ReqwestExecutor {
    /// Builds an executor from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::InvalidRequest`] when the client cannot be built.
    pub fn new(config: &ExecutorConfig) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|err| NetworkError::InvalidRequest(format!("http client build failed: {err}")))?;
        Ok(Self {
            client,
            max_response_bytes: config.max_response_bytes,
        })
    }
}

#[async_trait]
impl RequestExecutor for ReqwestExecutor {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, NetworkError> {
        let timeout_ms = u64::try_from(request.timeout.as_millis()).unwrap_or(u64::MAX);
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        };
        let mut builder = self.client.request(method, request.url).timeout(request.timeout);
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| NetworkError::InvalidRequest(format!("invalid header name {name}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| NetworkError::InvalidRequest("invalid header value".to_string()))?;
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let response = builder.send().await.map_err(|err| classify(&err, timeout_ms))?;
        let status = response.status().as_u16();
        let body = read_body_with_limit(response, self.max_response_bytes, timeout_ms).await?;
        Ok(HttpResponse {
            status,
            body,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps a reqwest failure onto the transport taxonomy.
fn classify(err: &reqwest::Error, timeout_ms: u64) -> NetworkError {
    if err.is_timeout() {
        NetworkError::Timeout {
            timeout_ms,
        }
    } else {
        NetworkError::ConnectionFailed(err.to_string())
    }
}

/// Reads a response body while enforcing a hard byte limit.
async fn read_body_with_limit(
    mut response: reqwest::Response,
    limit: usize,
    timeout_ms: u64,
) -> Result<Vec<u8>, NetworkError> {
    if let Some(expected) = response.content_length() {
        let expected = usize::try_from(expected).unwrap_or(usize::MAX);
        if expected > limit {
            return Err(NetworkError::ResponseTooLarge {
                actual: expected,
                limit,
            });
        }
    }
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|err| classify(&err, timeout_ms))? {
        let next_total = body.len().saturating_add(chunk.len());
        if next_total > limit {
            return Err(NetworkError::ResponseTooLarge {
                actual: next_total,
                limit,
            });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
