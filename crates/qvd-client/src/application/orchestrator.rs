//! ConnectionOrchestrator: the client's connection state machine.
//!
//! # States (for beginners)
//!
//! ```text
//! Init ─► Authenticating ─┬─► Listed ─► Selected ─► Connecting ─┬─► Connected
//!                         ├─► NoVms                             └─► Failed
//!                         └─► Failed
//! ```
//!
//! - `Authenticating` covers the `list_of_vm` request (credentials are only
//!   checked by the broker when the list is requested).
//! - `Listed` means a non-empty catalog; an empty one ends in `NoVms`, which
//!   is terminal but not an error.
//! - The VM to connect to is chosen by a [`VmSelector`].
//! - `Connected`, `NoVms` and `Failed` are terminal.  Nothing is retried.
//!
//! A display launch failure after `Connected` does not change the state.  It
//! is recorded as the session's last error and reported in the outcome.

use std::sync::Arc;

use qvd_core::{ConnectionParams, VmCatalog, VmId};
use tracing::{debug, error, info};

use crate::application::broker_session::BrokerSession;
use crate::application::error::{BrokerError, Operation, TransportError, TransportErrorKind};
use crate::application::launch::{DisplayLauncher, LaunchRequest};
use crate::application::outcome::RunOutcome;
use crate::application::transport::HttpTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Init,
    Authenticating,
    Listed,
    Selected,
    Connecting,
    Connected,
    NoVms,
    Failed,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConnectionState::Connected | ConnectionState::NoVms | ConnectionState::Failed
        )
    }
}

// ── VM selection ──────────────────────────────────────────────────────────────

/// Picks the VM to connect to from a non-empty catalog.
pub trait VmSelector: Send + Sync {
    /// Returns `None` when no entry is acceptable.
    fn select(&self, catalog: &VmCatalog) -> Option<VmId>;
}

/// First unblocked VM in broker order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstAvailable;

impl VmSelector for FirstAvailable {
    fn select(&self, catalog: &VmCatalog) -> Option<VmId> {
        catalog.iter().find(|vm| !vm.blocked).map(|vm| vm.id)
    }
}

/// A specific VM chosen by the user.
///
/// A blocked VM is still selected; the session then refuses it with
/// [`BrokerError::VmBlocked`] so the user sees why.
#[derive(Debug, Clone, Copy)]
pub struct ById(pub VmId);

impl VmSelector for ById {
    fn select(&self, catalog: &VmCatalog) -> Option<VmId> {
        catalog.contains(self.0).then_some(self.0)
    }
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

pub struct ConnectionOrchestrator<T: HttpTransport> {
    session: BrokerSession<T>,
    selector: Box<dyn VmSelector>,
    launcher: Arc<dyn DisplayLauncher>,
    state: ConnectionState,
    selected: Option<VmId>,
    outcome: Option<RunOutcome>,
}

impl<T: HttpTransport> ConnectionOrchestrator<T> {
    pub fn new(
        session: BrokerSession<T>,
        selector: Box<dyn VmSelector>,
        launcher: Arc<dyn DisplayLauncher>,
    ) -> Self {
        Self {
            session,
            selector,
            launcher,
            state: ConnectionState::Init,
            selected: None,
            outcome: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn selected(&self) -> Option<VmId> {
        self.selected
    }

    pub fn session(&self) -> &BrokerSession<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut BrokerSession<T> {
        &mut self.session
    }

    pub fn close(&mut self) {
        self.session.close();
    }

    /// Authenticates and lists VMs.  Only acts in `Init`; in any other state
    /// it returns the current state unchanged.
    pub async fn discover(&mut self) -> ConnectionState {
        if self.state != ConnectionState::Init {
            return self.state;
        }

        self.transition(ConnectionState::Authenticating);
        let listed = self.session.authenticate_and_list_vms().await.map(|c| c.len());
        match listed {
            Ok(0) => {
                info!("broker returned no VMs");
                self.finish(ConnectionState::NoVms, RunOutcome::NoVms);
            }
            Ok(_) => self.transition(ConnectionState::Listed),
            Err(e) => {
                self.finish(ConnectionState::Failed, RunOutcome::ListFailed(e));
            }
        }
        self.state
    }

    /// List-only mode: discovers and stops at `Listed`.
    pub async fn list_only(&mut self) -> RunOutcome {
        self.discover().await;
        match (self.state, self.session.catalog()) {
            (ConnectionState::Listed, Some(catalog)) => RunOutcome::Listed {
                count: catalog.len(),
            },
            _ => self.current_outcome(),
        }
    }

    /// Runs the whole flow: discover, select, connect, launch.
    ///
    /// Calling `run` again after it finished returns the same outcome.
    pub async fn run(&mut self) -> RunOutcome {
        self.discover().await;
        if self.state != ConnectionState::Listed {
            return self.current_outcome();
        }

        let Some(id) = self.session.catalog().and_then(|c| self.selector.select(c)) else {
            let e = BrokerError::NoSelectableVm;
            self.session.record_error(e.clone());
            return self.finish(ConnectionState::Failed, RunOutcome::ConnectFailed(e));
        };
        self.selected = Some(id);
        self.transition(ConnectionState::Selected);

        self.transition(ConnectionState::Connecting);
        let params = match self.session.connect_to_vm(id).await {
            Ok(params) => params,
            Err(e) => return self.finish(ConnectionState::Failed, RunOutcome::ConnectFailed(e)),
        };
        self.transition(ConnectionState::Connected);

        self.launch(id, params).await
    }

    async fn launch(&mut self, vm: VmId, params: ConnectionParams) -> RunOutcome {
        let request = LaunchRequest::new(&params, self.session.settings());
        debug!(%vm, link = %request.link, "starting display program");

        let outcome = match self.launcher.launch(&request).await {
            Ok(()) => RunOutcome::Connected { vm, params },
            Err(e) => {
                let span = self.session.span().clone();
                span.in_scope(|| error!(operation = %Operation::Launch, "{e}"));
                self.session.record_error(BrokerError::Launch(e.clone()));
                RunOutcome::LaunchFailed { vm, error: e }
            }
        };
        self.outcome = Some(outcome.clone());
        outcome
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }

    fn finish(&mut self, state: ConnectionState, outcome: RunOutcome) -> RunOutcome {
        self.transition(state);
        self.outcome = Some(outcome.clone());
        outcome
    }

    /// Outcome for a run that stopped early or already finished.
    fn current_outcome(&self) -> RunOutcome {
        match &self.outcome {
            Some(outcome) => outcome.clone(),
            // A previous run future was dropped mid-flight.
            None => {
                let error = self.session.last_error().cloned().unwrap_or_else(|| {
                    BrokerError::transport(
                        Operation::ConnectToVm,
                        TransportError::new(TransportErrorKind::Cancelled, "run was interrupted"),
                    )
                });
                if self.state == ConnectionState::Authenticating {
                    RunOutcome::ListFailed(error)
                } else {
                    RunOutcome::ConnectFailed(error)
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::launch::{LaunchError, MockDisplayLauncher};
    use crate::infrastructure::http::mock::MockTransport;
    use qvd_core::{parse_vm_list, Vm};

    const TWO_VMS: &str = r#"[
        {"id": 1, "name": "desktop-a", "state": "running", "blocked": 0},
        {"id": 2, "name": "desktop-b", "state": "stopped", "blocked": 1}
    ]"#;
    const LINK: &str = r#"{"link": "nx/nx,link=lan:40"}"#;

    fn id(raw: u32) -> VmId {
        VmId::new(raw).unwrap()
    }

    fn orchestrator(
        transport: &Arc<MockTransport>,
        launcher: MockDisplayLauncher,
    ) -> ConnectionOrchestrator<Arc<MockTransport>> {
        let session =
            BrokerSession::new("broker", 8443, "alice", "secret", Arc::clone(transport)).unwrap();
        ConnectionOrchestrator::new(session, Box::new(FirstAvailable), Arc::new(launcher))
    }

    fn launcher_never_called() -> MockDisplayLauncher {
        let mut launcher = MockDisplayLauncher::new();
        launcher.expect_launch().never();
        launcher
    }

    // ── Selectors ─────────────────────────────────────────────────────────────

    #[test]
    fn test_first_available_skips_blocked_vms() {
        // Arrange
        let catalog = VmCatalog::try_from_vms([
            Vm::new(id(4), "a", "running", true),
            Vm::new(id(9), "b", "running", false),
        ])
        .unwrap();

        // Act / Assert
        assert_eq!(FirstAvailable.select(&catalog), Some(id(9)));
    }

    #[test]
    fn test_first_available_returns_none_when_all_blocked() {
        let catalog = VmCatalog::try_from_vms([Vm::new(id(1), "a", "s", true)]).unwrap();
        assert_eq!(FirstAvailable.select(&catalog), None);
    }

    #[test]
    fn test_by_id_selects_only_known_vm() {
        let catalog = parse_vm_list(TWO_VMS.as_bytes()).unwrap();
        assert_eq!(ById(id(2)).select(&catalog), Some(id(2)));
        assert_eq!(ById(id(3)).select(&catalog), None);
    }

    // ── State machine ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_run_happy_path_launches_with_broker_link() {
        // Arrange
        let transport = Arc::new(MockTransport::new().with_reply(200, TWO_VMS).with_reply(200, LINK));
        let mut launcher = MockDisplayLauncher::new();
        launcher
            .expect_launch()
            .withf(|req| req.link == "nx/nx,link=lan:40" && !req.fullscreen)
            .times(1)
            .returning(|_| Ok(()));
        let mut orch = orchestrator(&transport, launcher);

        // Act
        let outcome = orch.run().await;

        // Assert
        assert!(matches!(outcome, RunOutcome::Connected { vm, .. } if vm == id(1)));
        assert_eq!(orch.state(), ConnectionState::Connected);
        assert_eq!(orch.selected(), Some(id(1)));
    }

    #[tokio::test]
    async fn test_initial_state_is_init() {
        let transport = Arc::new(MockTransport::new());
        let orch = orchestrator(&transport, launcher_never_called());
        assert_eq!(orch.state(), ConnectionState::Init);
    }

    #[tokio::test]
    async fn test_discover_with_two_vms_stops_at_listed() {
        let transport = Arc::new(MockTransport::new().with_reply(200, TWO_VMS));
        let mut orch = orchestrator(&transport, launcher_never_called());
        assert_eq!(orch.discover().await, ConnectionState::Listed);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_list_failure_is_failed_without_connect() {
        // Arrange
        let transport = Arc::new(MockTransport::new().with_failure(TransportError::new(
            TransportErrorKind::Tls,
            "certificate rejected",
        )));
        let mut orch = orchestrator(&transport, launcher_never_called());

        // Act
        let outcome = orch.run().await;

        // Assert
        assert!(matches!(outcome, RunOutcome::ListFailed(_)));
        assert_eq!(orch.state(), ConnectionState::Failed);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_all_blocked_fails_with_no_selectable_vm() {
        // Arrange
        let body = r#"[{"id": 1, "name": "a", "state": "blocked", "blocked": 1}]"#;
        let transport = Arc::new(MockTransport::new().with_reply(200, body));
        let mut orch = orchestrator(&transport, launcher_never_called());

        // Act
        let outcome = orch.run().await;

        // Assert
        assert_eq!(outcome, RunOutcome::ConnectFailed(BrokerError::NoSelectableVm));
        assert_eq!(orch.state(), ConnectionState::Failed);
        assert_eq!(orch.session().last_error(), Some(&BrokerError::NoSelectableVm));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_is_failed() {
        let transport = Arc::new(MockTransport::new().with_reply(200, TWO_VMS).with_reply(503, ""));
        let mut orch = orchestrator(&transport, launcher_never_called());
        let outcome = orch.run().await;
        assert!(matches!(
            outcome,
            RunOutcome::ConnectFailed(BrokerError::ProtocolError { operation: Operation::ConnectToVm, .. })
        ));
        assert_eq!(orch.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_launch_failure_keeps_connected_and_records_last_error() {
        // Arrange
        let transport = Arc::new(MockTransport::new().with_reply(200, TWO_VMS).with_reply(200, LINK));
        let mut launcher = MockDisplayLauncher::new();
        launcher
            .expect_launch()
            .times(1)
            .returning(|_| Err(LaunchError::Other("no display".into())));
        let mut orch = orchestrator(&transport, launcher);

        // Act
        let outcome = orch.run().await;

        // Assert
        assert!(matches!(outcome, RunOutcome::LaunchFailed { .. }));
        assert_eq!(orch.state(), ConnectionState::Connected);
        assert!(matches!(
            orch.session().last_error(),
            Some(BrokerError::Launch(LaunchError::Other(_)))
        ));
    }

    #[tokio::test]
    async fn test_run_twice_does_not_repeat_requests() {
        let transport = Arc::new(MockTransport::new().with_reply(200, "[]"));
        let mut orch = orchestrator(&transport, launcher_never_called());
        assert_eq!(orch.run().await, RunOutcome::NoVms);
        assert_eq!(orch.run().await, RunOutcome::NoVms);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_list_only_reports_count_and_sends_no_connect() {
        let transport = Arc::new(MockTransport::new().with_reply(200, TWO_VMS));
        let mut orch = orchestrator(&transport, launcher_never_called());
        assert_eq!(orch.list_only().await, RunOutcome::Listed { count: 2 });
        assert_eq!(orch.state(), ConnectionState::Listed);
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn test_terminal_states() {
        assert!(ConnectionState::Connected.is_terminal());
        assert!(ConnectionState::NoVms.is_terminal());
        assert!(ConnectionState::Failed.is_terminal());
        assert!(!ConnectionState::Listed.is_terminal());
        assert!(!ConnectionState::Init.is_terminal());
    }
}
