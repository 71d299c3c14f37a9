//! Display launcher that runs an external program.
//!
//! `CommandLauncher` starts the configured display program (default
//! `nxproxy`) and waits for it to exit:
//!
//! ```text
//! nxproxy [extra args...] -S nx/nx,link=lan,geometry=1024x768,fullscreen=1:40
//! ```
//!
//! The options after `-S` are the broker's link with the geometry and
//! fullscreen preferences spliced in before the trailing `:<port>`.  The
//! `display` and `home` overrides become the child's `DISPLAY` and `NX_HOME`
//! environment variables.

pub mod mock;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::application::launch::{DisplayLauncher, LaunchError, LaunchRequest};

pub const DEFAULT_PROGRAM: &str = "nxproxy";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLauncher {
    program: String,
    extra_args: Vec<String>,
}

impl Default for CommandLauncher {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM, Vec::new())
    }
}

impl CommandLauncher {
    pub fn new(program: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            extra_args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Full argument list for `request`.
    pub fn args_for(&self, request: &LaunchRequest) -> Vec<String> {
        let mut args = self.extra_args.clone();
        args.push("-S".to_string());
        args.push(display_options(request));
        args
    }
}

#[async_trait]
impl DisplayLauncher for CommandLauncher {
    async fn launch(&self, request: &LaunchRequest) -> Result<(), LaunchError> {
        let mut command = Command::new(&self.program);
        command.args(self.args_for(request)).kill_on_drop(true);
        if let Some(display) = &request.display {
            command.env("DISPLAY", display);
        }
        if let Some(home) = &request.home {
            command.env("NX_HOME", home);
        }

        debug!(program = %self.program, "spawning display program");
        let status = command.status().await.map_err(|e| LaunchError::Spawn {
            program: self.program.clone(),
            reason: e.to_string(),
        })?;

        if status.success() {
            info!(program = %self.program, "display program exited");
            Ok(())
        } else {
            Err(LaunchError::Exited {
                program: self.program.clone(),
                status: status.to_string(),
            })
        }
    }
}

/// Link options with geometry and fullscreen added.
fn display_options(request: &LaunchRequest) -> String {
    let mut extra = String::new();
    if let Some(geometry) = request.geometry {
        extra.push_str(&format!(",geometry={geometry}"));
    }
    if request.fullscreen {
        extra.push_str(",fullscreen=1");
    }

    match request.link.rsplit_once(':') {
        Some((options, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            format!("{options}{extra}:{port}")
        }
        _ => format!("{}{extra}", request.link),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
