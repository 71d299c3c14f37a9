//! HTTPS transport to the broker, built on `reqwest`.
//!
//! `ReqwestTransport` sends one request, then pulls the body with
//! `Response::chunk()` and appends each chunk to the session's
//! [`ResponseBuffer`] as it arrives.  The body is never collected into an
//! intermediate `Vec` first, so the buffer's size ceiling applies while the
//! bytes are still arriving.
//!
//! A `connect_to_vm` request asks to upgrade to `QVD/1.0`.  When the broker
//! answers `101 Switching Protocols`, the connection parameters arrive on the
//! upgraded stream rather than as an HTTP body, and the stream is not closed
//! afterwards.  They are read until one complete JSON value is buffered, then
//! the stream is dropped.
//!
//! Errors from `reqwest` are folded into a [`TransportErrorKind`] so the
//! application layer never sees `reqwest` types.

pub mod mock;

use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use qvd_core::protocol::buffer::TRANSPORT_CHUNK_SIZE;
use qvd_core::{holds_complete_json, ResponseBuffer};
use reqwest::StatusCode;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace, warn};

use crate::application::error::{TransportError, TransportErrorKind};
use crate::application::transport::{HttpMethod, HttpRequest, HttpTransport};

/// Options that shape the underlying HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// Skip certificate verification.  For brokers with self-signed
    /// certificates only.
    pub accept_invalid_certs: bool,
    pub connect_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            accept_invalid_certs: false,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// [`HttpTransport`] over HTTPS.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the TLS backend cannot be initialised.
    pub fn new(options: &TransportOptions) -> Result<Self, TransportError> {
        if options.accept_invalid_certs {
            warn!("TLS certificate verification is disabled");
        }
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(options.accept_invalid_certs)
            .connect_timeout(options.connect_timeout)
            .user_agent(concat!("qvd-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| classify(&e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(
        &self,
        request: &HttpRequest,
        body: &mut ResponseBuffer,
    ) -> Result<u16, TransportError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(request.url.clone()),
        };
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }

        let mut response = builder.send().await.map_err(|e| classify(&e))?;
        let status = response.status();

        if status == StatusCode::SWITCHING_PROTOCOLS {
            debug!("broker switched protocols, reading parameters from the upgraded stream");
            let mut upgraded = response.upgrade().await.map_err(|e| classify(&e))?;
            read_json_value(&mut upgraded, body).await?;
            return Ok(status.as_u16());
        }

        while let Some(chunk) = response.chunk().await.map_err(|e| classify(&e))? {
            trace!(len = chunk.len(), "body chunk");
            body.append(&chunk)?;
        }
        Ok(status.as_u16())
    }
}

/// Appends from `stream` until `body` holds one complete JSON value or the
/// stream ends.
async fn read_json_value<R>(stream: &mut R, body: &mut ResponseBuffer) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; TRANSPORT_CHUNK_SIZE];
    loop {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| TransportError::new(TransportErrorKind::Io, e.to_string()))?;
        if n == 0 {
            return Ok(());
        }
        trace!(len = n, "upgraded stream chunk");
        body.append(&chunk[..n])?;
        if holds_complete_json(body.as_bytes()) {
            return Ok(());
        }
    }
}

/// Maps a `reqwest` error to a transport error kind.
fn classify(error: &reqwest::Error) -> TransportError {
    let detail = error_chain(error);
    let kind = if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if looks_like_tls(&detail) {
        TransportErrorKind::Tls
    } else if error.is_connect() {
        TransportErrorKind::Connect
    } else {
        TransportErrorKind::Io
    };
    TransportError::new(kind, detail)
}

/// `reqwest` wraps the interesting cause several levels deep.
fn error_chain(error: &reqwest::Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

fn looks_like_tls(detail: &str) -> bool {
    let lower = detail.to_ascii_lowercase();
    ["certificate", "tls", "handshake", "unknownissuer"]
        .iter()
        .any(|needle| lower.contains(needle))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
