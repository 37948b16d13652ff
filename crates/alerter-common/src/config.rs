//! ---
//! alerter_section: "01-core-functionality"
//! alerter_subsection: "module"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "YAML configuration for the alert client and daemon."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Environment variable naming the daemon config when `--config` is absent.
pub const ENV_SERVER_CONFIG_PATH: &str = "ALERTER_CONFIG";

/// Environment variable naming the client config when `--config` is absent.
pub const ENV_CLIENT_CONFIG_PATH: &str = "ALERTER_CLIENT_CONFIG";

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("could not parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("no {0} configured")]
    Missing(&'static str),
    #[error("invalid webhook url '{url}': {source}")]
    InvalidWebhook {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!(config_path = %path.display(), "loading configuration");
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Configuration of the `alert` client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub socket_path: PathBuf,
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self> {
        load_yaml(path)
    }
}

impl std::str::FromStr for ClientConfig {
    type Err = ConfigError;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Configuration of the `alerter` daemon.
///
/// `spool_path` and `webhook` are optional in the document so that a partial
/// file still parses; [`ServerConfig::validate`] rejects it with a message
/// naming the missing key.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
    #[serde(default)]
    pub spool_path: Option<PathBuf>,
    #[serde(default)]
    pub webhook: Option<String>,
    #[serde(default = "default_request_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub request_timeout: Duration,
}

impl ServerConfig {
    /// Load and validate the daemon configuration.
    pub fn load(path: &Path) -> Result<Self> {
        let config: ServerConfig = load_yaml(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.webhook_url()?;
        self.spool_path()?;
        Ok(())
    }

    pub fn webhook_url(&self) -> Result<Url> {
        let raw = self
            .webhook
            .as_deref()
            .ok_or(ConfigError::Missing("webhook"))?;
        Url::parse(raw).map_err(|source| ConfigError::InvalidWebhook {
            url: raw.to_owned(),
            source,
        })
    }

    pub fn spool_path(&self) -> Result<&Path> {
        self.spool_path
            .as_deref()
            .ok_or(ConfigError::Missing("spool_path"))
    }
}

impl std::str::FromStr for ServerConfig {
    type Err = ConfigError;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: ServerConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}
