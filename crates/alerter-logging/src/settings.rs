//! ---
//! alerter_section: "03-logging"
//! alerter_subsection: "module"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Logging configuration document."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::{LoggingError, Result};

/// Output encoding for console log lines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// Human readable single-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    StructuredJson,
}

/// Contents of the logging configuration file handed to `--log-config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Base verbosity: `error`, `warn`, `info`, `debug`, `trace` or `off`.
    pub level: String,
    /// Console output encoding.
    pub format: LogFormat,
    /// Directory for a daily rolling JSON log file. No file is written when unset.
    pub directory: Option<PathBuf>,
    /// File name prefix for the rolling file; defaults to the service name.
    pub file_prefix: Option<String>,
    /// Chatty dependency targets that are never logged above `info`.
    pub quiet_targets: Vec<String>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Pretty,
            directory: None,
            file_prefix: None,
            quiet_targets: ["hyper", "reqwest", "mio", "want"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

impl LogSettings {
    /// Load settings from a YAML file.
    ///
    /// A missing file yields the defaults, so the binaries stay usable on hosts
    /// without a logging configuration. A file that exists but does not parse
    /// is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            eprintln!(
                "log configuration {} not found; using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| LoggingError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: LogSettings =
            serde_yaml::from_str(&contents).map_err(|source| LoggingError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.level_filter()?;
        Ok(settings)
    }

    /// Parsed base verbosity.
    pub fn level_filter(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(self.level.trim())
            .map_err(|_| LoggingError::InvalidLevel(self.level.clone()))
    }

    /// Filter directive equivalent to these settings, e.g. `debug,hyper=info`.
    pub fn directive(&self) -> Result<String> {
        let level = self.level_filter()?;
        let capped = level.min(LevelFilter::INFO);
        let mut directive = level.to_string().to_lowercase();
        for target in &self.quiet_targets {
            directive.push_str(&format!(",{}={}", target, capped.to_string().to_lowercase()));
        }
        Ok(directive)
    }
}
