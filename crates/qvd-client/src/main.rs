//! QVD client: entry point.
//!
//! Authenticates against a QVD broker, lists the user's virtual desktops,
//! connects to one and starts the display program for it.
//!
//! # Usage
//!
//! ```text
//! qvd-client -h <HOST> -u <USER> -w <PASSWORD> [OPTIONS]
//!
//! Options:
//!   -h, --host <HOST>         Broker host name or IP
//!   -p, --port <PORT>         Broker HTTPS port [default: 8443]
//!   -u, --username <USER>     User name
//!   -w, --password <PASS>     Password [env: QVD_PASSWORD]
//!   -g, --geometry <WxH>      Requested desktop geometry, e.g. 1024x768
//!   -f, --fullscreen          Request a fullscreen session
//!   -l, --list-only           Print the VM list and exit
//!   -d, --debug               Debug logging
//!       --debug-file <PATH>   Write logs to PATH [env: QVD_DEBUG_FILE]
//!       --vm-id <ID>          Connect to this VM instead of the first available
//!       --timeout <SECS>      Per-request timeout
//!       --config <PATH>       Config file (default: platform config dir)
//!       --insecure            Accept invalid TLS certificates
//!       --save-config         Store the effective settings (not the password)
//!   -?, --help                Print help
//! ```
//!
//! `-h` is the broker host, so help is on `-?`.
//!
//! # Exit statuses
//!
//! | Status | Meaning                             |
//! |--------|-------------------------------------|
//! | 0      | connected and display program ran   |
//! | 1      | invalid arguments or configuration  |
//! | 2      | the broker returned no VMs          |
//! | 3      | list-only mode completed            |
//! | 4      | selecting or connecting to a VM failed |
//! | 5      | authentication or listing failed    |
//! | 6      | the display program failed          |
//!
//! # Configuration precedence
//!
//! Command-line arguments override the TOML config file, which overrides the
//! built-in defaults.  The password is only ever taken from the command line
//! or `QVD_PASSWORD`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{ArgAction, Parser};
use qvd_core::{VmCatalog, VmId};
use tracing::{error, info};

use qvd_client::application::broker_session::{BrokerSession, SessionConfig};
use qvd_client::application::orchestrator::{ById, ConnectionOrchestrator, FirstAvailable, VmSelector};
use qvd_client::application::outcome::{ExitReason, RunOutcome};
use qvd_client::infrastructure::http::{ReqwestTransport, TransportOptions};
use qvd_client::infrastructure::launcher::CommandLauncher;
use qvd_client::infrastructure::logging::{init_logging, LogSettings};
use qvd_client::infrastructure::storage::config::{
    config_file_path, load_config, load_config_from, save_config_to, BrokerConfig, ClientConfig,
    DisplayConfig, LauncherConfig,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Connects to a virtual desktop served by a QVD broker.
#[derive(Debug, Parser)]
#[command(
    name = "qvd-client",
    about = "Command-line client for QVD virtual desktop brokers",
    version,
    disable_help_flag = true
)]
struct Cli {
    /// Print help.
    #[arg(short = '?', long = "help", action = ArgAction::Help)]
    help: Option<bool>,

    /// Broker host name or IP address.
    #[arg(short = 'h', long)]
    host: Option<String>,

    /// Broker HTTPS port.
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,

    #[arg(short, long)]
    username: Option<String>,

    #[arg(short = 'w', long, env = "QVD_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Desktop geometry as WIDTHxHEIGHT.
    #[arg(short, long, value_name = "WxH")]
    geometry: Option<String>,

    #[arg(short, long)]
    fullscreen: bool,

    /// Print the VM list and exit without connecting.
    #[arg(short, long = "list-only")]
    list_only: bool,

    #[arg(short, long)]
    debug: bool,

    /// Append logs to this file instead of stderr.
    #[arg(long, value_name = "PATH")]
    debug_file: Option<PathBuf>,

    /// Connect to this VM instead of the first available one.
    #[arg(long, value_name = "ID")]
    vm_id: Option<u32>,

    /// Per-request timeout in seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Config file to use instead of the platform default.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Accept invalid TLS certificates (self-signed brokers).
    #[arg(long)]
    insecure: bool,

    /// X display for the session (`DISPLAY` of the display program).
    #[arg(long)]
    display: Option<String>,

    /// State directory for the display program (`NX_HOME`).
    #[arg(long, value_name = "PATH")]
    home: Option<String>,

    /// Write the effective settings, without the password, to the config
    /// file before connecting.
    #[arg(long)]
    save_config: bool,
}

/// Everything needed for one run, after merging CLI and config file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RunConfig {
    host: String,
    port: u16,
    username: String,
    password: String,
    geometry: Option<String>,
    fullscreen: bool,
    display: Option<String>,
    home: Option<String>,
    vm_id: Option<VmId>,
    list_only: bool,
    timeout: Duration,
    max_body_bytes: usize,
    accept_invalid_certs: bool,
    launcher: LauncherConfig,
}

impl RunConfig {
    /// The persistable part of this run.  The password and the per-run
    /// choices (`--vm-id`, `--list-only`) are left out.
    fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            broker: BrokerConfig {
                host: Some(self.host.clone()),
                port: self.port,
                username: Some(self.username.clone()),
                timeout_secs: self.timeout.as_secs(),
                max_body_bytes: self.max_body_bytes,
                accept_invalid_certs: self.accept_invalid_certs,
            },
            display: DisplayConfig {
                geometry: self.geometry.clone(),
                fullscreen: self.fullscreen,
                display: self.display.clone(),
                home: self.home.clone(),
            },
            launcher: self.launcher.clone(),
        }
    }
}

impl Cli {
    /// The file `--config` names, or the platform default.
    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => config_file_path().context("failed to locate config file"),
        }
    }

    fn load_file_config(&self) -> anyhow::Result<ClientConfig> {
        match &self.config {
            Some(path) => load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display())),
            None => load_config().context("failed to load config"),
        }
    }

    /// Merges the arguments over `file`.
    ///
    /// # Errors
    ///
    /// Returns an error if host, username or password is missing from both
    /// sources, or if `--vm-id` is `0`.
    fn into_run_config(self, file: ClientConfig) -> anyhow::Result<RunConfig> {
        let Some(host) = self.host.or(file.broker.host) else {
            bail!("broker host is required (-h/--host or [broker] host)");
        };
        let Some(username) = self.username.or(file.broker.username) else {
            bail!("username is required (-u/--username or [broker] username)");
        };
        let Some(password) = self.password else {
            bail!("password is required (-w/--password or QVD_PASSWORD)");
        };
        let vm_id = match self.vm_id {
            Some(raw) => Some(VmId::new(raw).context("--vm-id must be a positive integer")?),
            None => None,
        };

        Ok(RunConfig {
            host,
            port: self.port.unwrap_or(file.broker.port),
            username,
            password,
            geometry: self.geometry.or(file.display.geometry),
            fullscreen: self.fullscreen || file.display.fullscreen,
            display: self.display.or(file.display.display),
            home: self.home.or(file.display.home),
            vm_id,
            list_only: self.list_only,
            timeout: Duration::from_secs(self.timeout.unwrap_or(file.broker.timeout_secs)),
            max_body_bytes: file.broker.max_body_bytes,
            accept_invalid_certs: self.insecure || file.broker.accept_invalid_certs,
            launcher: file.launcher,
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    // `-?` and `--version` exit 0; every other parse problem is status 1.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(ExitReason::InvalidArguments.code())
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // ── Logging setup ─────────────────────────────────────────────────────────
    let log_settings =
        LogSettings::resolve(cli.debug, cli.debug_file.clone(), |key| std::env::var(key).ok());
    if let Err(e) = init_logging(&log_settings) {
        eprintln!("qvd-client: {e}");
    }

    match run(cli).await {
        Ok(reason) => ExitCode::from(reason.code()),
        Err(e) => {
            if !log_settings.writes_to_stderr() {
                error!("{e:#}");
            }
            eprintln!("qvd-client: {e:#}");
            ExitCode::from(ExitReason::InvalidArguments.code())
        }
    }
}

/// Builds the session from the merged configuration and runs it.
///
/// Errors returned here are set-up problems (exit status 1); broker and
/// launch failures are reported through the returned [`ExitReason`].
async fn run(cli: Cli) -> anyhow::Result<ExitReason> {
    let file_config = cli.load_file_config()?;
    let save_target = if cli.save_config {
        Some(cli.config_path()?)
    } else {
        None
    };
    let config = cli.into_run_config(file_config)?;

    if let Some(path) = save_target {
        save_config_to(&config.to_client_config(), &path)
            .with_context(|| format!("failed to save config to {}", path.display()))?;
        info!(path = %path.display(), "saved config");
    }

    let transport = ReqwestTransport::new(&TransportOptions {
        accept_invalid_certs: config.accept_invalid_certs,
        ..TransportOptions::default()
    })
    .context("failed to initialise HTTPS client")?;

    let mut session = BrokerSession::with_config(
        &config.host,
        config.port,
        &config.username,
        &config.password,
        transport,
        SessionConfig {
            timeout: config.timeout,
            max_body_bytes: config.max_body_bytes,
        },
    )?;
    if let Some(geometry) = &config.geometry {
        session.set_geometry(geometry)?;
    }
    if config.fullscreen {
        session.set_fullscreen();
    }
    if let Some(display) = &config.display {
        session.set_display(display.as_str());
    }
    if let Some(home) = &config.home {
        session.set_home(home.as_str());
    }

    let selector: Box<dyn VmSelector> = match config.vm_id {
        Some(id) => Box::new(ById(id)),
        None => Box::new(FirstAvailable),
    };
    let launcher = Arc::new(CommandLauncher::new(
        config.launcher.program.clone(),
        config.launcher.extra_args.clone(),
    ));
    let mut orchestrator = ConnectionOrchestrator::new(session, selector, launcher);

    // ── Ctrl+C aborts the in-flight request ───────────────────────────────────
    let cancel = orchestrator.session().cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, cancelling");
            cancel.cancel();
        }
    });

    info!(host = %config.host, port = config.port, "contacting broker");
    let outcome = if config.list_only {
        orchestrator.list_only().await
    } else {
        orchestrator.run().await
    };

    if let (RunOutcome::Listed { .. }, Some(catalog)) = (&outcome, orchestrator.session().catalog()) {
        print!("{}", format_catalog(catalog));
    }
    report(&outcome);

    orchestrator.close();
    Ok(outcome.exit_reason())
}

fn report(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Connected { vm, .. } => info!(%vm, "session finished"),
        RunOutcome::Listed { count } => info!(count, "listed VMs"),
        RunOutcome::NoVms => eprintln!("qvd-client: no VMs available for this user"),
        RunOutcome::ListFailed(e) | RunOutcome::ConnectFailed(e) => eprintln!("qvd-client: {e}"),
        RunOutcome::LaunchFailed { error, .. } => eprintln!("qvd-client: {error}"),
    }
}

/// One line per VM: id, name, state and a blocked marker.
fn format_catalog(catalog: &VmCatalog) -> String {
    catalog
        .iter()
        .map(|vm| {
            let blocked = if vm.blocked { "blocked" } else { "" };
            let line = format!("{:>6}  {:<24} {:<10} {}", vm.id.get(), vm.name, vm.state, blocked);
            format!("{}\n", line.trim_end())
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
