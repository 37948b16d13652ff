//! ---
//! alerter_section: "05-daemon-runtime"
//! alerter_subsection: "module"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Daemon runtime: listener, delivery, spool dispatch."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
//! Runtime of the `alerter` daemon.
//!
//! Messages arrive on a Unix socket ([`listener`]), are posted to the chat
//! webhook by the [`delivery`] worker, and failures are parked in the spool
//! until the [`dispatcher`] retries them.

pub mod daemon;
pub mod delivery;
pub mod dispatcher;
pub mod listener;
pub mod notifier;
pub mod terminator;

pub use daemon::{Daemon, DaemonHandle};
pub use delivery::{DeliveryReport, DeliveryWorker};
pub use dispatcher::SpoolDispatcher;
pub use listener::{Listener, ListenerError};
pub use notifier::{DeliveryError, Notifier, SlackNotifier};
pub use terminator::Terminator;

/// Errors surfaced while starting or stopping the daemon.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] alerter_common::ConfigError),
    #[error("spool unavailable: {0}")]
    Spool(#[from] alerter_spool::SpoolError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("webhook client: {0}")]
    Delivery(#[from] DeliveryError),
    #[error("task {task} failed: {source}")]
    Task {
        task: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}
