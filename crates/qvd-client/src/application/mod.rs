//! Application layer use cases for the QVD client.
//!
//! # What lives here?
//!
//! - **`broker_session`** – One authenticated conversation with a broker.
//!   Issues the `list_of_vm` and `connect_to_vm` requests through an injected
//!   [`transport::HttpTransport`], keeps the parsed catalog and the last error,
//!   and can be cancelled or closed at any time.
//!
//! - **`orchestrator`** – The connection state machine.  Drives a session
//!   from authentication through VM selection and connect, then hands the
//!   result to a [`launch::DisplayLauncher`].
//!
//! - **`launch`** – The contract between the orchestrator and whatever starts
//!   the display program.
//!
//! - **`error`** – The [`error::BrokerError`] taxonomy shared by the above.
//!
//! - **`outcome`** – How a finished run maps to a process exit status.
//!
//! Nothing in this layer opens sockets or spawns processes directly; those
//! are injected from `infrastructure`.

pub mod broker_session;
pub mod error;
pub mod launch;
pub mod orchestrator;
pub mod outcome;
pub mod transport;
