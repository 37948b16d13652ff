//! ---
//! alerter_section: "05-daemon-runtime"
//! alerter_subsection: "module"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Daemon lifecycle: wiring, startup, and shutdown."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::sync::Arc;

use alerter_common::ServerConfig;
use alerter_logging::{log_system_event, LogContext, SystemEventOutcome};
use alerter_spool::Spooler;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::info;

use crate::delivery::DeliveryWorker;
use crate::dispatcher::SpoolDispatcher;
use crate::listener::Listener;
use crate::notifier::{Notifier, SlackNotifier};
use crate::CoreError;

const DELIVERY_QUEUE_DEPTH: usize = 16;

/// Daemon entrypoint, holding everything needed before the runtime tasks start.
pub struct Daemon {
    socket_path: PathBuf,
    spool_path: PathBuf,
    notifier: Arc<dyn Notifier>,
}

impl Daemon {
    /// Build a daemon that posts to the configured webhook.
    pub fn from_config(config: &ServerConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let notifier = SlackNotifier::new(config.webhook_url()?, config.request_timeout)?;
        Ok(Self::with_notifier(
            &config.socket_path,
            config.spool_path()?,
            Arc::new(notifier),
        ))
    }

    pub fn with_notifier(
        socket_path: impl Into<PathBuf>,
        spool_path: impl Into<PathBuf>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            socket_path: socket_path.into(),
            spool_path: spool_path.into(),
            notifier,
        }
    }

    /// Load the spool, bind the socket and spawn the runtime tasks.
    pub async fn start(self) -> Result<DaemonHandle, CoreError> {
        let socket = self.socket_path.display().to_string();
        let spool = self.spool_path.display().to_string();

        let spooler = match Spooler::open(&self.spool_path) {
            Ok(spooler) => spooler,
            Err(err) => {
                log_system_event(
                    Some(&LogContext::new().with_spool(&spool)),
                    "daemon.spool",
                    &err.to_string(),
                    SystemEventOutcome::Fault,
                );
                return Err(err.into());
            }
        };
        let queued = spooler.len();

        let listener = match Listener::bind(&self.socket_path) {
            Ok(listener) => listener,
            Err(err) => {
                log_system_event(
                    Some(&LogContext::new().with_socket(&socket)),
                    "daemon.listener",
                    &err.to_string(),
                    SystemEventOutcome::Fault,
                );
                return Err(err.into());
            }
        };

        let (shutdown_tx, _) = broadcast::channel(1);
        let (deliveries_tx, deliveries_rx) = mpsc::channel(DELIVERY_QUEUE_DEPTH);
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();

        let worker = DeliveryWorker::new(self.notifier.clone(), deliveries_rx, reports_tx);
        let dispatcher = SpoolDispatcher::new(spooler, deliveries_tx.clone(), reports_rx);

        // joined in this order on shutdown: intake first, the spool last
        let tasks = vec![
            (
                "listener",
                tokio::spawn(listener.run(deliveries_tx, shutdown_tx.subscribe())),
            ),
            (
                "delivery",
                tokio::spawn(worker.run(shutdown_tx.subscribe())),
            ),
            (
                "dispatcher",
                tokio::spawn(dispatcher.run(shutdown_tx.subscribe())),
            ),
        ];

        log_system_event(
            Some(
                &LogContext::new()
                    .with_socket(&socket)
                    .with_spool(&spool)
                    .with_queued(queued),
            ),
            "daemon.start",
            &format!("alerter started, delivering via {}", self.notifier.name()),
            SystemEventOutcome::Success,
        );

        Ok(DaemonHandle {
            shutdown: shutdown_tx,
            tasks,
            socket_path: self.socket_path,
        })
    }
}

/// Handle to a running daemon.
#[derive(Debug)]
pub struct DaemonHandle {
    shutdown: broadcast::Sender<()>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    socket_path: PathBuf,
}

impl DaemonHandle {
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Broadcast shutdown and wait for every task.
    ///
    /// Messages still in flight or queued for delivery are stored in the spool
    /// before this returns.
    pub async fn shutdown(self) -> Result<(), CoreError> {
        let _ = self.shutdown.send(());
        for (task, handle) in self.tasks {
            handle
                .await
                .map_err(|source| CoreError::Task { task, source })?;
        }
        info!("alerter shutdown complete");
        Ok(())
    }
}
