//! ---
//! alerter_section: "03-logging"
//! alerter_subsection: "module"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Structured logging setup and lifecycle events."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Tracing initialisation shared by the `alert` client and `alerter` daemon.

use std::path::PathBuf;

use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

pub mod settings;

pub use settings::{LogFormat, LogSettings};

/// Environment variable that overrides the configured filter directive.
pub const LOG_ENV: &str = "ALERTER_LOG";

/// Result alias used throughout the logging crate.
pub type Result<T> = std::result::Result<T, LoggingError>;

/// Errors raised while loading logging settings or installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The log configuration file exists but could not be read.
    #[error("could not read log config {}: {source}", path.display())]
    Read {
        /// Offending file.
        path: PathBuf,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
    /// The log configuration file is not valid YAML for [`LogSettings`].
    #[error("could not parse log config {}: {source}", path.display())]
    Parse {
        /// Offending file.
        path: PathBuf,
        /// Underlying parser failure.
        #[source]
        source: serde_yaml::Error,
    },
    /// The configured level is not a recognised verbosity.
    #[error("invalid log level '{0}'")]
    InvalidLevel(String),
    /// The rolling log directory could not be created.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Keeps the background log writers alive; drop it last in `main`.
#[must_use = "dropping the guard stops log output"]
pub struct LoggingGuard {
    _guards: Vec<WorkerGuard>,
}

/// Install the global tracing subscriber for `service`.
///
/// The filter comes from `ALERTER_LOG`, then `RUST_LOG`, then `settings`.
/// Console output goes to stderr so the client's stdout stays clean. When a
/// directory is configured a daily rolling JSON file is written as well.
/// Installing a second subscriber in the same process is a no-op.
pub fn init(service: &str, settings: &LogSettings) -> Result<LoggingGuard> {
    let filter = build_filter(settings)?;
    let mut guards = Vec::new();

    let (console_writer, console_guard) = tracing_appender::non_blocking(std::io::stderr());
    guards.push(console_guard);

    let console_layer = match settings.format {
        LogFormat::StructuredJson => fmt::layer()
            .with_target(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .json()
            .with_writer(console_writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(console_writer)
            .boxed(),
    };

    let file_layer = match &settings.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory)?;
            let prefix = settings.file_prefix.as_deref().unwrap_or(service);
            let appender = daily(directory, format!("{}-{}.log", prefix, service));
            let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
            guards.push(file_guard);
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_timer(fmt::time::UtcTime::rfc_3339())
                    .json()
                    .with_writer(file_writer)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .ok();

    info!(service = %service, format = ?settings.format, log_dir = ?settings.directory, "tracing initialised");
    Ok(LoggingGuard { _guards: guards })
}

fn build_filter(settings: &LogSettings) -> Result<EnvFilter> {
    let configured = settings.directive()?;
    let directive = [LOG_ENV, "RUST_LOG"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty());

    Ok(match directive {
        Some(directive) => EnvFilter::try_new(&directive).unwrap_or_else(|err| {
            eprintln!(
                "invalid log directive '{}' ({}); using {}",
                directive, err, configured
            );
            EnvFilter::new(&configured)
        }),
        None => EnvFilter::new(&configured),
    })
}

/// Structured context attached to lifecycle events.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Unix socket the daemon listens on.
    pub socket: Option<&'a str>,
    /// Spool file backing undelivered messages.
    pub spool: Option<&'a str>,
    /// Number of messages waiting in the spool.
    pub queued: Option<usize>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the socket path.
    pub fn with_socket(mut self, socket: &'a str) -> Self {
        self.socket = Some(socket);
        self
    }

    /// Attach the spool path.
    pub fn with_spool(mut self, spool: &'a str) -> Self {
        self.spool = Some(spool);
        self
    }

    /// Attach the current spool depth.
    pub fn with_queued(mut self, queued: usize) -> Self {
        self.queued = Some(queued);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation failed or was aborted.
    Fault,
}

impl SystemEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            SystemEventOutcome::Success => "success",
            SystemEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event with a success/fault outcome.
pub fn log_system_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SystemEventOutcome,
) {
    let default = LogContext::default();
    let ctx = context.unwrap_or(&default);
    match outcome {
        SystemEventOutcome::Success => info!(
            event,
            outcome = outcome.as_str(),
            socket = ctx.socket.unwrap_or(""),
            spool = ctx.spool.unwrap_or(""),
            queued = ctx.queued.unwrap_or_default(),
            message = %message
        ),
        SystemEventOutcome::Fault => error!(
            event,
            outcome = outcome.as_str(),
            socket = ctx.socket.unwrap_or(""),
            spool = ctx.spool.unwrap_or(""),
            queued = ctx.queued.unwrap_or_default(),
            message = %message
        ),
    }
}
