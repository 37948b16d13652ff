//! ---
//! alerter_section: "05-daemon-runtime"
//! alerter_subsection: "binary"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Binary entrypoint for the alerter daemon."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
use std::path::PathBuf;

use alerter_common::{ServerConfig, VersionInfo, ENV_SERVER_CONFIG_PATH};
use alerter_core::{Daemon, Terminator};
use alerter_logging::{log_system_event, LogContext, LogSettings, SystemEventOutcome};
use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Alert delivery daemon",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'c',
        long,
        value_name = "FILE",
        env = ENV_SERVER_CONFIG_PATH,
        default_value = "/etc/alerter/alerter.yml",
        help = "Path to the daemon configuration file"
    )]
    config: PathBuf,

    #[arg(
        short = 'v',
        long,
        value_name = "FILE",
        default_value = "/etc/alerter/log.yml",
        help = "Path to the logging configuration file"
    )]
    log_config: PathBuf,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print extended version information and exit"
    )]
    version: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let version = VersionInfo::current();
    if cli.version {
        println!("{}", version.extended("alerter"));
        return Ok(());
    }

    let settings = LogSettings::load(&cli.log_config)?;
    let _guard = alerter_logging::init("alerter", &settings)?;
    info!(version = %version.banner("alerter"), "starting");

    let config = ServerConfig::load(&cli.config)
        .with_context(|| format!("loading daemon config {}", cli.config.display()))?;
    let daemon = Daemon::from_config(&config)?;
    let terminator = Terminator::install().context("installing signal handlers")?;
    let handle = daemon.start().await.context("starting daemon")?;

    let signal = terminator.wait().await;
    handle.shutdown().await?;
    log_system_event(
        Some(&LogContext::new()),
        "daemon.stop",
        &format!("alerter stopped on {signal}"),
        SystemEventOutcome::Success,
    );
    Ok(())
}
