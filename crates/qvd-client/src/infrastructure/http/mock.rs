//! Scripted HTTP transport for unit and integration tests.
//!
//! # Why a mock transport?
//!
//! The real transport needs a reachable HTTPS broker with a certificate the
//! test machine trusts.  `MockTransport` replaces the network with a queue of
//! scripted replies and records every request it receives, so tests can
//! assert on exact URLs and headers.
//!
//! # Usage in tests
//!
//! ```ignore
//! let transport = Arc::new(
//!     MockTransport::new()
//!         .with_reply(200, r#"[{"id":1,"name":"a","state":"running","blocked":0}]"#)
//!         .with_reply(200, r#"{"link":"nx:40"}"#),
//! );
//! let session = BrokerSession::new("broker", 8443, "alice", "pw", Arc::clone(&transport))?;
//! // ... drive the session ...
//! assert_eq!(transport.request_count(), 2);
//! ```
//!
//! Bodies are delivered in small chunks so the session's buffering is
//! exercised the same way a real streamed response would.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use qvd_core::ResponseBuffer;

use crate::application::error::{TransportError, TransportErrorKind};
use crate::application::transport::{HttpRequest, HttpTransport};

/// Size of the chunks scripted bodies are split into.
const MOCK_CHUNK_SIZE: usize = 7;

#[derive(Debug, Clone)]
enum Reply {
    Respond { status: u16, body: Vec<u8> },
    Fail(TransportError),
    /// Never completes; used to exercise timeouts and cancellation.
    Hang,
}

/// A transport that replays scripted replies in order.
///
/// When the script runs out, further requests fail with an `Io` error.
#[derive(Debug, Default)]
pub struct MockTransport {
    requests: Mutex<Vec<HttpRequest>>,
    replies: Mutex<VecDeque<Reply>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response with `status` and `body`.
    pub fn with_reply(self, status: u16, body: impl Into<Vec<u8>>) -> Self {
        self.push(Reply::Respond {
            status,
            body: body.into(),
        })
    }

    /// Queues a transport failure.
    pub fn with_failure(self, error: TransportError) -> Self {
        self.push(Reply::Fail(error))
    }

    /// Queues a request that never completes.
    pub fn with_hang(self) -> Self {
        self.push(Reply::Hang)
    }

    /// Snapshot of every request received so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn push(self, reply: Reply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(
        &self,
        request: &HttpRequest,
        body: &mut ResponseBuffer,
    ) -> Result<u16, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().pop_front();

        match reply {
            Some(Reply::Respond { status, body: bytes }) => {
                for chunk in bytes.chunks(MOCK_CHUNK_SIZE) {
                    body.append(chunk)?;
                }
                Ok(status)
            }
            Some(Reply::Fail(error)) => Err(error),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(TransportError::new(
                TransportErrorKind::Io,
                "mock transport has no scripted reply",
            )),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
