//! Error taxonomy for broker sessions.
//!
//! Every failure a caller can observe is a [`BrokerError`].  Network-level
//! problems first surface from the transport as a [`TransportError`] and are
//! then tagged with the [`Operation`] that was running.

use std::fmt;

use qvd_core::{BufferError, CredentialError, VmId};
use thiserror::Error;

use crate::application::launch::LaunchError;

/// The broker-facing step an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListOfVm,
    ConnectToVm,
    Launch,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::ListOfVm => "list_of_vm",
            Operation::ConnectToVm => "connect_to_vm",
            Operation::Launch => "launch",
        })
    }
}

/// Coarse classification of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// No complete response within the configured timeout.
    Timeout,
    /// TCP connection could not be established.
    Connect,
    /// TLS handshake or certificate verification failed.
    Tls,
    /// Any other read/write failure on an established connection.
    Io,
    /// The request was cancelled through the session's cancellation token.
    Cancelled,
    /// The session has been closed.
    Closed,
    /// The response body exceeded the configured ceiling.
    BodyTooLarge,
    /// The response buffer could not grow.
    OutOfMemory,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Tls => "tls",
            TransportErrorKind::Io => "io",
            TransportErrorKind::Cancelled => "cancelled",
            TransportErrorKind::Closed => "closed",
            TransportErrorKind::BodyTooLarge => "body too large",
            TransportErrorKind::OutOfMemory => "out of memory",
        })
    }
}

/// Failure reported by an [`HttpTransport`](crate::application::transport::HttpTransport).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {detail}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub detail: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl From<BufferError> for TransportError {
    fn from(e: BufferError) -> Self {
        let kind = match e {
            BufferError::OutOfMemory { .. } => TransportErrorKind::OutOfMemory,
            BufferError::LimitExceeded { .. } => TransportErrorKind::BodyTooLarge,
        };
        Self::new(kind, e.to_string())
    }
}

/// Everything that can go wrong in a broker session or a connection run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrokerError {
    /// Credentials were refused locally and never sent.
    #[error("invalid credentials: {0}")]
    InvalidCredential(#[from] CredentialError),

    /// A host, port, geometry or other local setting is malformed.
    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    #[error("{operation}: transport failure ({kind}): {detail}")]
    TransportFailure {
        operation: Operation,
        kind: TransportErrorKind,
        detail: String,
    },

    /// The broker answered 401 or 403.
    #[error("{operation}: authentication failed (HTTP {status})")]
    AuthenticationFailed { operation: Operation, status: u16 },

    /// Unexpected status or a body that could not be understood.
    #[error("{operation}: protocol error: {detail}")]
    ProtocolError { operation: Operation, detail: String },

    /// The VM is administratively locked and was not requested.
    #[error("VM {id} is blocked")]
    VmBlocked { id: VmId },

    /// The selector found nothing it was allowed to pick.
    #[error("no selectable VM in the catalog")]
    NoSelectableVm,

    #[error("launch: {0}")]
    Launch(#[from] LaunchError),
}

impl BrokerError {
    pub fn transport(operation: Operation, error: TransportError) -> Self {
        BrokerError::TransportFailure {
            operation,
            kind: error.kind,
            detail: error.detail,
        }
    }

    /// The operation the error is attached to, if any.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            BrokerError::TransportFailure { operation, .. }
            | BrokerError::AuthenticationFailed { operation, .. }
            | BrokerError::ProtocolError { operation, .. } => Some(*operation),
            BrokerError::VmBlocked { .. } => Some(Operation::ConnectToVm),
            BrokerError::Launch(_) => Some(Operation::Launch),
            BrokerError::InvalidCredential(_)
            | BrokerError::InvalidSetting(_)
            | BrokerError::NoSelectableVm => None,
        }
    }

    /// Transport failure kind, when this is a transport failure.
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            BrokerError::TransportFailure { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
