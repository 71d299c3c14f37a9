//! Recording display launcher for tests.
//!
//! `MockLauncher` stores every [`LaunchRequest`] it receives in a
//! `Mutex<Vec<...>>` so assertions can check exactly what the orchestrator
//! handed over.  Set `should_fail = true` to exercise launch-failure paths.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::application::launch::{DisplayLauncher, LaunchError, LaunchRequest};

#[derive(Debug, Default)]
pub struct MockLauncher {
    /// Every request passed to `launch`, in order.
    pub launches: Mutex<Vec<LaunchRequest>>,
    /// When `true`, `launch` records the request and then fails.
    pub should_fail: bool,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }
}

#[async_trait]
impl DisplayLauncher for MockLauncher {
    async fn launch(&self, request: &LaunchRequest) -> Result<(), LaunchError> {
        self.launches.lock().unwrap().push(request.clone());
        if self.should_fail {
            return Err(LaunchError::Other("mock failure".into()));
        }
        Ok(())
    }
}
