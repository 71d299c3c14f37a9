//! BrokerSession: one authenticated conversation with a QVD broker.
//!
//! A session owns everything a single broker conversation needs: the
//! endpoint, the encoded credentials, the display overrides sent with the
//! connect request, one reusable [`ResponseBuffer`], the transport and a
//! cancellation token.  Nothing is shared between sessions.
//!
//! # Request lifecycle (for beginners)
//!
//! Every network operation goes through the same steps:
//!
//! 1. `last_error` is cleared.
//! 2. The response buffer is reset (capacity is kept, so the list and connect
//!    bodies reuse one allocation).
//! 3. The request future is raced against the timeout *and* the cancellation
//!    token with `tokio::select!`.  Whichever finishes first wins.
//! 4. The status code is checked and the buffered body is parsed.
//! 5. On failure the error is stored in `last_error` and also returned.
//!
//! Only one request is ever in flight because every operation takes
//! `&mut self`.  To abort from another task, grab a clone of the token with
//! [`BrokerSession::cancel_handle`] before starting the operation.

use std::time::Duration;

use qvd_core::{
    build_auth_header, parse_vm_list, AuthHeader, BrokerEndpoint, ConnectOverrides,
    ConnectionParams, Geometry, ResponseBuffer, VmCatalog, VmId,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument, Span};
use url::Url;
use uuid::Uuid;

use crate::application::error::{BrokerError, Operation, TransportError, TransportErrorKind};
use crate::application::transport::{
    HttpRequest, HttpTransport, AUTHORIZATION, CONNECTION, QVD_UPGRADE_PROTOCOL, UPGRADE,
};

/// Default bound on each network operation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default ceiling on a single response body.
pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Tunables that are not part of the broker conversation itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub timeout: Duration,
    pub max_body_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

pub struct BrokerSession<T: HttpTransport> {
    endpoint: BrokerEndpoint,
    username: String,
    auth: AuthHeader,
    overrides: ConnectOverrides,
    catalog: Option<VmCatalog>,
    last_error: Option<BrokerError>,
    buffer: ResponseBuffer,
    timeout: Duration,
    cancel: CancellationToken,
    /// `None` once the session is closed.
    transport: Option<T>,
    span: Span,
}

impl<T: HttpTransport> BrokerSession<T> {
    /// Creates a session with [`SessionConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::InvalidSetting`] for a bad host or port and
    /// [`BrokerError::InvalidCredential`] if the credentials cannot be
    /// encoded.  No request is sent in either case.
    pub fn new(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        transport: T,
    ) -> Result<Self, BrokerError> {
        Self::with_config(host, port, username, password, transport, SessionConfig::default())
    }

    /// Creates a session with explicit timeout and body limit.
    ///
    /// # Errors
    ///
    /// Same as [`BrokerSession::new`].
    pub fn with_config(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        transport: T,
        config: SessionConfig,
    ) -> Result<Self, BrokerError> {
        let endpoint = BrokerEndpoint::new(host, port)
            .map_err(|e| BrokerError::InvalidSetting(e.to_string()))?;
        let auth = build_auth_header(username, password)?;

        let span = info_span!(
            "broker_session",
            session_id = %Uuid::new_v4(),
            host = %endpoint.host(),
            port = endpoint.port()
        );
        span.in_scope(|| debug!(base_url = %endpoint.base_url(), "session created"));

        Ok(Self {
            endpoint,
            username: username.to_string(),
            auth,
            overrides: ConnectOverrides::default(),
            catalog: None,
            last_error: None,
            buffer: ResponseBuffer::new().with_limit(config.max_body_bytes),
            timeout: config.timeout,
            cancel: CancellationToken::new(),
            transport: Some(transport),
            span,
        })
    }

    // ── Settings ──────────────────────────────────────────────────────────────

    /// Replaces the credentials and recomputes the `Authorization` header.
    ///
    /// On error the previous credentials stay in effect.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::InvalidCredential`] if the pair cannot be encoded.
    pub fn set_credentials(&mut self, username: &str, password: &str) -> Result<(), BrokerError> {
        self.auth = build_auth_header(username, password)?;
        self.username = username.to_string();
        Ok(())
    }

    /// Sets the requested geometry from a `WxH` string.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::InvalidSetting`] for a malformed value; the
    /// previous geometry is kept.
    pub fn set_geometry(&mut self, geometry: &str) -> Result<(), BrokerError> {
        let parsed: Geometry = geometry
            .parse()
            .map_err(|e| BrokerError::InvalidSetting(format!("geometry: {e}")))?;
        self.overrides.geometry = Some(parsed);
        Ok(())
    }

    pub fn set_fullscreen(&mut self) {
        self.overrides.fullscreen = true;
    }

    pub fn set_nofullscreen(&mut self) {
        self.overrides.fullscreen = false;
    }

    pub fn set_display(&mut self, display: impl Into<String>) {
        self.overrides.display = Some(display.into());
    }

    pub fn set_home(&mut self, home: impl Into<String>) {
        self.overrides.home = Some(home.into());
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    /// Display overrides sent with the next connect request.
    pub fn settings(&self) -> &ConnectOverrides {
        &self.overrides
    }

    /// The catalog from the last successful listing; `None` if there was
    /// none or the last listing failed.
    pub fn catalog(&self) -> Option<&VmCatalog> {
        self.catalog.as_ref()
    }

    pub fn base_url(&self) -> &Url {
        self.endpoint.base_url()
    }

    pub fn endpoint(&self) -> &BrokerEndpoint {
        &self.endpoint
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn last_error(&self) -> Option<&BrokerError> {
        self.last_error.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_none()
    }

    /// A clone of the cancellation token; cancelling it aborts the in-flight
    /// request with `TransportFailure { Cancelled }`.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn span(&self) -> &Span {
        &self.span
    }

    /// Records an error raised outside the session's own requests.
    pub(crate) fn record_error(&mut self, error: BrokerError) {
        self.last_error = Some(error);
    }

    // ── Operations ────────────────────────────────────────────────────────────

    /// Authenticates and fetches the VM list.
    ///
    /// On success the catalog is stored and returned.  On any failure the
    /// stored catalog is cleared.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::AuthenticationFailed`] for 401 / 403.
    /// - [`BrokerError::ProtocolError`] for any other non-2xx status or an
    ///   unparseable body.
    /// - [`BrokerError::TransportFailure`] for network problems, timeout,
    ///   cancellation or a closed session.
    pub async fn authenticate_and_list_vms(&mut self) -> Result<&VmCatalog, BrokerError> {
        self.last_error = None;
        self.catalog = None;

        let span = self.span.clone();
        match self.fetch_catalog().instrument(span).await {
            Ok(catalog) => {
                self.span
                    .in_scope(|| info!(count = catalog.len(), "VM list received"));
                Ok(&*self.catalog.insert(catalog))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Asks the broker to connect to VM `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not in the current catalog.  Callers must pick `id`
    /// from [`BrokerSession::catalog`].
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::VmBlocked`] without sending anything if the VM
    /// is blocked; otherwise the same taxonomy as
    /// [`BrokerSession::authenticate_and_list_vms`].
    pub async fn connect_to_vm(&mut self, id: VmId) -> Result<ConnectionParams, BrokerError> {
        self.last_error = None;

        if self.is_closed() {
            let e = closed_error(Operation::ConnectToVm);
            return Err(self.fail(e));
        }

        let blocked = match self.catalog.as_ref().and_then(|c| c.get(id)) {
            Some(vm) => vm.blocked,
            None => panic!("connect_to_vm: VM {id} is not in the current catalog"),
        };
        if blocked {
            return Err(self.fail(BrokerError::VmBlocked { id }));
        }

        let span = self.span.clone();
        match self.request_connection(id).instrument(span).await {
            Ok(params) => {
                self.span.in_scope(|| info!(vm = %id, "broker accepted connection"));
                Ok(params)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Cancels any in-flight request and releases the transport.
    ///
    /// Idempotent.  Every operation after `close` fails with
    /// `TransportFailure { Closed }`.
    pub fn close(&mut self) {
        self.cancel.cancel();
        if self.transport.take().is_some() {
            self.span.in_scope(|| debug!("session closed"));
        }
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    async fn fetch_catalog(&mut self) -> Result<VmCatalog, BrokerError> {
        let operation = Operation::ListOfVm;
        let request = HttpRequest::get(self.endpoint.list_of_vm_url())
            .header(AUTHORIZATION, self.auth.as_str());

        debug!(url = %request.url, "requesting VM list");
        let status = self.send(operation, &request).await?;
        check_status(operation, status, false)?;

        parse_vm_list(self.buffer.as_bytes()).map_err(|e| BrokerError::ProtocolError {
            operation,
            detail: e.to_string(),
        })
    }

    async fn request_connection(&mut self, id: VmId) -> Result<ConnectionParams, BrokerError> {
        let operation = Operation::ConnectToVm;
        let request = HttpRequest::get(self.endpoint.connect_to_vm_url(id, &self.overrides))
            .header(AUTHORIZATION, self.auth.as_str())
            .header(CONNECTION, UPGRADE)
            .header(UPGRADE, QVD_UPGRADE_PROTOCOL);

        debug!(url = %request.url, "requesting connection");
        let status = self.send(operation, &request).await?;
        check_status(operation, status, true)?;

        ConnectionParams::parse(self.buffer.as_bytes()).map_err(|e| BrokerError::ProtocolError {
            operation,
            detail: e.to_string(),
        })
    }

    /// Runs one request, bounded by the timeout and the cancellation token.
    async fn send(&mut self, operation: Operation, request: &HttpRequest) -> Result<u16, BrokerError> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| closed_error(operation))?;

        self.buffer.reset();
        let buffer = &mut self.buffer;
        let timeout = self.timeout;

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TransportError::new(
                TransportErrorKind::Cancelled,
                "request cancelled",
            )),
            outcome = tokio::time::timeout(timeout, transport.execute(request, buffer)) => {
                match outcome {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::new(
                        TransportErrorKind::Timeout,
                        format!("no response within {timeout:?}"),
                    )),
                }
            }
        };

        let status = result.map_err(|e| BrokerError::transport(operation, e))?;
        debug!(status, bytes = self.buffer.len(), "response received");
        Ok(status)
    }

    fn fail(&mut self, error: BrokerError) -> BrokerError {
        self.span.in_scope(|| warn!("{error}"));
        self.last_error = Some(error.clone());
        error
    }
}

impl<T: HttpTransport> Drop for BrokerSession<T> {
    fn drop(&mut self) {
        self.close();
    }
}

fn closed_error(operation: Operation) -> BrokerError {
    BrokerError::transport(
        operation,
        TransportError::new(TransportErrorKind::Closed, "session is closed"),
    )
}

/// 2xx is success; 101 also counts when the request asked for an upgrade.
fn check_status(operation: Operation, status: u16, upgrade: bool) -> Result<(), BrokerError> {
    match status {
        200..=299 => Ok(()),
        101 if upgrade => Ok(()),
        401 | 403 => Err(BrokerError::AuthenticationFailed { operation, status }),
        _ => Err(BrokerError::ProtocolError {
            operation,
            detail: format!("unexpected HTTP status {status}"),
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
