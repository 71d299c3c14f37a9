//! # qvd-core
//!
//! Shared library for the QVD client containing the broker protocol
//! primitives: credential encoding, response buffering, the VM catalog model
//! and its parser, and the connection parameters returned by the broker.
//!
//! It has zero dependencies on sockets, async runtimes, or OS process APIs.
//! The `qvd-client` crate wires these pieces to a real HTTP transport and a
//! display launcher.
//!
//! # Architecture overview (for beginners)
//!
//! A QVD broker is an HTTPS service that knows which virtual desktops a user
//! may open.  A client session against it goes through two requests:
//!
//! 1. `GET /qvd/list_of_vm` with a Basic `Authorization` header.  The broker
//!    answers with a JSON list of VMs.
//! 2. `GET /qvd/connect_to_vm?id=N` for the chosen VM.  The broker answers
//!    with the parameters (the *link*) needed to start the tunneled display.
//!
//! This crate defines the data exchanged in those requests:
//!
//! - **`domain`** – Pure types with no wire concerns: the [`Vm`] entity, the
//!   ordered [`VmCatalog`], and the validated display [`Geometry`].
//!
//! - **`protocol`** – How bytes become domain types and back: the growable
//!   [`ResponseBuffer`] that collects a streamed body, the credential codec
//!   that builds the `Authorization` header, the VM-list parser, and the
//!   endpoint/connect-parameter helpers.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `qvd_core::VmCatalog` instead of `qvd_core::domain::vm::VmCatalog`.
pub use domain::geometry::{Geometry, GeometryError};
pub use domain::vm::{Vm, VmCatalog, VmId};
pub use protocol::buffer::{BufferError, ResponseBuffer};
pub use protocol::catalog::{parse_vm_list, CatalogError};
pub use protocol::connect::{
    holds_complete_json, ConnectOverrides, ConnectParamsError, ConnectionParams,
};
pub use protocol::credentials::{build_auth_header, AuthHeader, CredentialError};
pub use protocol::endpoints::{BrokerEndpoint, EndpointError};
