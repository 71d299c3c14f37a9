//! The HTTP capability a broker session needs.
//!
//! A session does not care how bytes reach the broker.  It builds an
//! [`HttpRequest`], hands it to an [`HttpTransport`] together with its
//! [`ResponseBuffer`], and gets back the status code.  The body is streamed
//! into the buffer chunk by chunk as it arrives.
//!
//! The production implementation (`ReqwestTransport`) lives in the
//! infrastructure layer; tests use the scripted `MockTransport`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use qvd_core::ResponseBuffer;
use url::Url;

use crate::application::error::TransportError;

pub const AUTHORIZATION: &str = "Authorization";
pub const CONNECTION: &str = "Connection";
pub const UPGRADE: &str = "Upgrade";

/// Protocol the connect request asks the broker to switch to.
pub const QVD_UPGRADE_PROTOCOL: &str = "QVD/1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
        }
    }
}

/// One request to the broker.
#[derive(Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(&'static str, String)>,
}

impl HttpRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: HttpMethod::Get,
            url,
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Value of the first header called `name` (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// Requests end up in logs and test failure output; keep credentials out.
impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(name, value)| {
                if name.eq_ignore_ascii_case(AUTHORIZATION) {
                    (*name, "<redacted>")
                } else {
                    (*name, value.as_str())
                }
            })
            .collect();
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &headers)
            .finish()
    }
}

/// Sends one request and streams the response body into `body`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Returns the HTTP status code once the whole body has been read.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the request could not be sent, the
    /// connection failed mid-body, or `body` refused to grow.
    async fn execute(
        &self,
        request: &HttpRequest,
        body: &mut ResponseBuffer,
    ) -> Result<u16, TransportError>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn execute(
        &self,
        request: &HttpRequest,
        body: &mut ResponseBuffer,
    ) -> Result<u16, TransportError> {
        (**self).execute(request, body).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
