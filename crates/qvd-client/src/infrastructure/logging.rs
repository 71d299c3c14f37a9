//! Installs the `tracing` subscriber for the binary.
//!
//! Library code only emits events; this module decides where they go.
//!
//! Level selection, first match wins:
//! 1. `RUST_LOG`, when set and valid.
//! 2. `debug` when `--debug` was given or `QVD_DEBUG` is set to anything
//!    other than empty or `0`.
//! 3. `info`.
//!
//! When `--debug-file` or `QVD_DEBUG_FILE` names a path, output is appended
//! to that file without ANSI colours instead of going to stderr.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const DEBUG_ENV: &str = "QVD_DEBUG";
pub const DEBUG_FILE_ENV: &str = "QVD_DEBUG_FILE";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("cannot open log file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install log subscriber: {0}")]
    Init(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub debug: bool,
    pub file: Option<PathBuf>,
}

impl LogSettings {
    /// Merges command-line flags with the `QVD_DEBUG*` variables read through
    /// `lookup`.  Flags win over the environment.
    pub fn resolve(
        debug_flag: bool,
        debug_file: Option<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let env_debug = lookup(DEBUG_ENV).is_some_and(|v| !v.is_empty() && v != "0");
        let env_file = lookup(DEBUG_FILE_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self {
            debug: debug_flag || env_debug,
            file: debug_file.or(env_file),
        }
    }

    /// `true` when log output shares stderr with the binary's own messages.
    pub fn writes_to_stderr(&self) -> bool {
        self.file.is_none()
    }

    /// Directive used when `RUST_LOG` is absent.
    pub fn default_directive(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns [`LoggingError`] if the log file cannot be opened or a global
/// subscriber is already installed.
pub fn init_logging(settings: &LogSettings) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.default_directive()));

    let result = match &settings.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::Io {
                    path: path.clone(),
                    source,
                })?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    result.map_err(|e| LoggingError::Init(e.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
