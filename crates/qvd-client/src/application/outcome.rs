//! Result of one client run and its process exit status.

use qvd_core::{ConnectionParams, VmId};

use crate::application::error::BrokerError;
use crate::application::launch::LaunchError;

/// Process exit statuses of the `qvd-client` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Connected,
    InvalidArguments,
    NoVms,
    ListOnly,
    ConnectFailed,
    ListFailed,
    LaunchFailed,
}

impl ExitReason {
    pub fn code(self) -> u8 {
        match self {
            ExitReason::Connected => 0,
            ExitReason::InvalidArguments => 1,
            ExitReason::NoVms => 2,
            ExitReason::ListOnly => 3,
            ExitReason::ConnectFailed => 4,
            ExitReason::ListFailed => 5,
            ExitReason::LaunchFailed => 6,
        }
    }
}

/// How a run of the connection orchestrator ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Connected and the display program finished successfully.
    Connected { vm: VmId, params: ConnectionParams },
    /// The broker returned an empty list.
    NoVms,
    /// List-only mode: the catalog was fetched and nothing else was done.
    Listed { count: usize },
    /// Authentication or listing failed.
    ListFailed(BrokerError),
    /// Selection or the connect request failed.
    ConnectFailed(BrokerError),
    /// Connected, but the display program could not be run.
    LaunchFailed { vm: VmId, error: LaunchError },
}

impl RunOutcome {
    pub fn exit_reason(&self) -> ExitReason {
        match self {
            RunOutcome::Connected { .. } => ExitReason::Connected,
            RunOutcome::NoVms => ExitReason::NoVms,
            RunOutcome::Listed { .. } => ExitReason::ListOnly,
            RunOutcome::ListFailed(_) => ExitReason::ListFailed,
            RunOutcome::ConnectFailed(_) => ExitReason::ConnectFailed,
            RunOutcome::LaunchFailed { .. } => ExitReason::LaunchFailed,
        }
    }
}
