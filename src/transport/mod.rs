//! HTTP transport seam.
//!
//! Both the [`RequestGateway`](crate::RequestGateway) and the
//! [`ReferenceDataStore`](crate::ReferenceDataStore) talk to the proxy
//! through a [`Transport`]. The production implementation is
//! [`HttpTransport`] (reqwest); tests inject in-memory doubles.
//!
//! The contract is deliberately narrow: `Err` means no HTTP response was
//! obtained at all. Any response that arrives, whatever its status, is
//! `Ok` and status handling belongs to the caller.

pub mod retry;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CryptarchError, Result};

pub use retry::{RetryConfig, fetch_with_retry};

/// HTTP method of a proxied call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Read-only methods are the only ones eligible for response caching.
    pub fn is_read(&self) -> bool {
        matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A fully resolved request: absolute URL, method and optional JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

impl RawRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: None,
        }
    }
}

/// An HTTP response as received, before any status interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON. An empty body decodes to `null`, which is
    /// what write endpoints acknowledging with `204` produce.
    pub fn json(&self) -> Result<Value> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Turn a non-success status into [`CryptarchError::Http`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(CryptarchError::Http {
                status: self.status,
                body: self.body,
            })
        }
    }
}

/// A single HTTP attempt against the proxy.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request. Never retries.
    async fn send(&self, request: &RawRequest) -> Result<RawResponse>;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
///
/// The proxy authenticates the user via a same-origin, HTTP-only session
/// cookie; a native client forwards it with [`with_session_cookie`](Self::with_session_cookie).
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    /// Create a transport with a default client.
    pub fn new() -> Result<Self> {
        Self::build(None, None)
    }

    /// Create a transport that sends `cookie` on every request.
    pub fn with_session_cookie(cookie: impl AsRef<str>) -> Result<Self> {
        Self::build(Some(cookie.as_ref()), None)
    }

    /// Wrap an existing client.
    pub fn from_client(http: Client) -> Self {
        Self { http }
    }

    pub(crate) fn build(cookie: Option<&str>, timeout: Option<Duration>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = cookie {
            let value = HeaderValue::from_str(cookie).map_err(|e| {
                CryptarchError::Configuration(format!("invalid session cookie: {e}"))
            })?;
            headers.insert(COOKIE, value);
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| {
            CryptarchError::Configuration(format!("failed to build HTTP client: {e}"))
        })?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &RawRequest) -> Result<RawResponse> {
        let mut builder = self
            .http
            .request(request.method.into(), &request.url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(RawResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_decodes_to_null() {
        let response = RawResponse::new(204, "");
        assert_eq!(response.json().unwrap(), Value::Null);
    }

    #[test]
    fn invalid_json_is_decode_error() {
        let response = RawResponse::new(200, "<html>");
        assert!(matches!(response.json(), Err(CryptarchError::Decode(_))));
    }

    #[test]
    fn error_for_status_keeps_body() {
        let err = RawResponse::new(429, "slow down")
            .error_for_status()
            .unwrap_err();
        assert_eq!(
            err,
            CryptarchError::Http {
                status: 429,
                body: "slow down".into()
            }
        );
    }

    #[test]
    fn only_get_is_read() {
        assert!(Method::Get.is_read());
        assert!(!Method::Post.is_read());
        assert_eq!(Method::default(), Method::Get);
    }
}
