//! ---
//! alerter_section: "11-test-harness"
//! alerter_subsection: "01-bootstrap"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Test harness bootstrap and shared exports."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
//! Integration test harness for the `alert` client and `alerter` daemon.
//!
//! [`HarnessConfiguration::shared`] resolves the binaries and configuration
//! files once per test process; the drivers build on the resolved paths.

use std::process::ExitStatus;
use std::time::Duration;

pub mod asserter;
pub mod bootstrap;
pub mod captor;
pub mod invocation;
pub mod server;
pub mod webhook;

pub use asserter::MessageAsserter;
pub use bootstrap::{
    project_root, resolve_configuration, ArtifactLayout, ConfigurationError, HarnessConfiguration,
    HarnessProperty,
};
pub use captor::MessageCaptor;
pub use invocation::AlertInvocation;
pub use server::ServerProcess;
pub use webhook::{RecordedRequest, WebhookStub};

/// Failures raised by the drivers once the harness is bootstrapped.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] alerter_common::ConfigError),
    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: &'static str, after: Duration },
    #[error("process exited early with {0}")]
    Exited(ExitStatus),
    #[error("could not signal process: {0}")]
    Signal(#[from] nix::errno::Errno),
}
