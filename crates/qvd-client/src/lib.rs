//! qvd-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does qvd-client do? (for beginners)
//!
//! QVD serves virtual desktops.  A *broker* decides which desktops a user may
//! open and sets up the tunnel to them.  This client is the piece that runs
//! on the user's machine:
//!
//! 1. Sends the user's credentials to the broker and asks for the list of
//!    VMs the user may open.
//! 2. Picks one of them (the first unblocked VM, or the one the user named).
//! 3. Asks the broker to connect to it, passing display preferences such as
//!    geometry and fullscreen.
//! 4. Hands the connection parameters the broker returns to a *display
//!    launcher*, which starts the program that actually draws the desktop.
//!
//! The broker protocol primitives (credential encoding, response buffering,
//! VM-list parsing) live in `qvd-core`.  This crate adds the async session,
//! the connection state machine, and the OS-facing adapters.

/// Application layer: broker session, orchestration and the launch contract.
pub mod application;

/// Infrastructure layer: HTTP transport, process launcher, config and logging.
pub mod infrastructure;
