//! ---
//! alerter_section: "11-test-harness"
//! alerter_subsection: "02-drivers"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Builder for runs of the alert client binary."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use tokio::process::Command;
use tracing::debug;

use crate::{HarnessConfiguration, HarnessError};

/// One execution of the `alert` client against the resolved configuration.
#[derive(Debug, Clone)]
pub struct AlertInvocation {
    binary: PathBuf,
    client_config: PathBuf,
    log_config: PathBuf,
    title: String,
    text: String,
    channel: Option<String>,
    title_link: Option<String>,
    level: Option<String>,
    fields: Vec<String>,
    current_dir: Option<PathBuf>,
}

impl AlertInvocation {
    pub fn new(config: &HarnessConfiguration, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            binary: config.client_binary_path().to_path_buf(),
            client_config: config.client_config_path().to_path_buf(),
            log_config: config.log_config_path().to_path_buf(),
            title: title.into(),
            text: text.into(),
            channel: None,
            title_link: None,
            level: None,
            fields: Vec::new(),
            current_dir: None,
        }
    }

    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn title_link(mut self, link: impl Into<String>) -> Self {
        self.title_link = Some(link.into());
        self
    }

    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    pub fn field(mut self, key: &str, value: &str) -> Self {
        self.fields.push(format!("{key}:{value}"));
        self
    }

    /// Pass a `-f` argument verbatim, separator or not.
    pub fn raw_field(mut self, raw: impl Into<String>) -> Self {
        self.fields.push(raw.into());
        self
    }

    /// Directory the client runs in; relative socket paths resolve from here.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-C".into(),
            self.client_config.clone().into(),
            "-v".into(),
            self.log_config.clone().into(),
        ];
        if let Some(channel) = &self.channel {
            args.extend(["-c".into(), channel.into()]);
        }
        if let Some(link) = &self.title_link {
            args.extend(["-t".into(), link.into()]);
        }
        if let Some(level) = &self.level {
            args.extend(["-l".into(), level.into()]);
        }
        for field in &self.fields {
            args.extend(["-f".into(), field.into()]);
        }
        args.push(self.title.clone().into());
        args.push(self.text.clone().into());
        args
    }

    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command
    }

    /// Run to completion and collect the output.
    pub async fn run(&self) -> Result<Output, HarnessError> {
        debug!(binary = %self.binary.display(), args = ?self.args(), "running client");
        Ok(self.command().output().await?)
    }
}
