//! Contract between the orchestrator and the display program launcher.
//!
//! Once the broker has accepted a connect request, its connection parameters
//! and the user's display preferences are bundled into a [`LaunchRequest`]
//! and passed, unchanged, to a [`DisplayLauncher`].

use async_trait::async_trait;
use qvd_core::{ConnectOverrides, ConnectionParams, Geometry};
use thiserror::Error;

/// Error type for display launch operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LaunchError {
    #[error("failed to start display program {program:?}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("display program {program:?} exited unsuccessfully ({status})")]
    Exited { program: String, status: String },

    #[error("display launcher failed: {0}")]
    Other(String),
}

/// Everything the display program needs to attach to the tunneled session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Link descriptor from the broker's connect response.
    pub link: String,
    pub geometry: Option<Geometry>,
    pub fullscreen: bool,
    /// Overrides `DISPLAY` for the launched program.
    pub display: Option<String>,
    /// Overrides `NX_HOME` for the launched program.
    pub home: Option<String>,
}

impl LaunchRequest {
    pub fn new(params: &ConnectionParams, overrides: &ConnectOverrides) -> Self {
        Self {
            link: params.link.clone(),
            geometry: overrides.geometry,
            fullscreen: overrides.fullscreen,
            display: overrides.display.clone(),
            home: overrides.home.clone(),
        }
    }
}

/// Starts the program that renders the remote desktop.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DisplayLauncher: Send + Sync {
    /// # Errors
    ///
    /// Returns [`LaunchError`] if the program cannot be started or reports
    /// failure.
    async fn launch(&self, request: &LaunchRequest) -> Result<(), LaunchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_launch_request_copies_link_and_overrides_unchanged() {
        // Arrange
        let params = ConnectionParams {
            link: "nx/nx,link=lan:40".to_string(),
            extra: [("session".to_string(), Value::from(3))].into_iter().collect(),
        };
        let overrides = ConnectOverrides {
            geometry: Some("1024x768".parse().unwrap()),
            fullscreen: true,
            display: Some(":1".to_string()),
            home: None,
        };

        // Act
        let request = LaunchRequest::new(&params, &overrides);

        // Assert
        assert_eq!(request.link, "nx/nx,link=lan:40");
        assert_eq!(request.geometry.unwrap().to_string(), "1024x768");
        assert!(request.fullscreen);
        assert_eq!(request.display.as_deref(), Some(":1"));
        assert_eq!(request.home, None);
    }
}
