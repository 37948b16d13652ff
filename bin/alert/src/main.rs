//! ---
//! alerter_section: "06-client"
//! alerter_subsection: "binary"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Binary entrypoint for the alert client."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
use std::io::Write;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use alerter_common::host::hostname;
use alerter_common::{
    AlertRequest, ClientConfig, Field, Level, Message, VersionInfo, ENV_CLIENT_CONFIG_PATH,
};
use alerter_logging::LogSettings;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{ArgAction, Parser};
use tracing::{debug, info, warn};

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "Send an alert through the local alerter daemon",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'C',
        long,
        value_name = "FILE",
        env = ENV_CLIENT_CONFIG_PATH,
        default_value = "/etc/alerter/alert.yml",
        help = "Path to the client configuration file"
    )]
    config: PathBuf,

    #[arg(short, long, help = "Channel to post to instead of the webhook default")]
    channel: Option<String>,

    #[arg(
        short,
        long,
        default_value_t = Level::Unknown,
        help = "Severity: OK, WARN, ERROR or UNKNOWN"
    )]
    level: Level,

    #[arg(short, long, value_name = "URL", help = "Link attached to the title")]
    title_link: Option<String>,

    #[arg(
        short,
        long = "field",
        value_name = "KEY:VALUE",
        help = "Additional field, may be repeated"
    )]
    fields: Vec<String>,

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

    #[arg(required_unless_present = "version")]
    title: Option<String>,

    #[arg(required_unless_present = "version")]
    text: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let version = VersionInfo::current();
    if cli.version {
        println!("{}", version.extended("alert"));
        return Ok(());
    }

    let settings = LogSettings::load(&cli.log_config)?;
    let _guard = alerter_logging::init("alert", &settings)?;

    let config = ClientConfig::load(&cli.config)
        .with_context(|| format!("loading client config {}", cli.config.display()))?;

    let request = AlertRequest {
        channel: cli.channel,
        title: cli.title.unwrap_or_default(),
        title_link: cli.title_link,
        text: cli.text.unwrap_or_default(),
        level: cli.level,
        fields: parse_fields(&cli.fields),
    };
    let message = request.compose(hostname(), version.footer("alert"), Utc::now());

    send(&config.socket_path, &message)
        .with_context(|| format!("sending alert to {}", config.socket_path.display()))?;
    info!(socket = %config.socket_path.display(), "alert handed to daemon");
    Ok(())
}

fn parse_fields(raw: &[String]) -> Vec<Field> {
    raw.iter()
        .filter_map(|entry| match entry.parse::<Field>() {
            Ok(field) => Some(field),
            Err(err) => {
                warn!(error = %err, "skipping field");
                None
            }
        })
        .collect()
}

fn send(socket: &Path, message: &Message) -> Result<()> {
    let mut stream = UnixStream::connect(socket)?;
    serde_json::to_writer(&mut stream, message)?;
    stream.flush()?;
    stream.shutdown(Shutdown::Write)?;
    debug!("message written");
    Ok(())
}
