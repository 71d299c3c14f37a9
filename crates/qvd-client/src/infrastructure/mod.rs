//! Infrastructure layer for the QVD client.
//!
//! Contains the OS- and network-facing adapters injected into the
//! application layer.
//!
//! **Dependency rule**: this layer may depend on `application` and `qvd_core`,
//! but MUST NOT be imported by the `application` layer (tests excepted).
//!
//! # Sub-modules
//!
//! - **`http`** – `ReqwestTransport`, the HTTPS implementation of
//!   `HttpTransport`, plus a scripted `MockTransport` for tests.
//!
//! - **`launcher`** – `CommandLauncher`, which spawns the display program
//!   (`nxproxy` by default), plus a recording `MockLauncher`.
//!
//! - **`storage`** – TOML configuration file persistence.
//!
//! - **`logging`** – `tracing-subscriber` installation for the binary.

pub mod http;
pub mod launcher;
pub mod logging;
pub mod storage;
