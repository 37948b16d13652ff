//! ---
//! alerter_section: "05-daemon-runtime"
//! alerter_subsection: "module"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Retry scheduling for spooled messages."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
use std::time::Duration;

use alerter_common::Message;
use alerter_spool::{Backoff, Spooler};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error};

use crate::delivery::DeliveryReport;

/// Tick interval while nothing is queued.
pub const IDLE_TICK: Duration = Duration::from_secs(86_400);

/// Owns the spool: parks failed messages and feeds them back after a backoff.
pub struct SpoolDispatcher {
    spooler: Spooler,
    backoff: Backoff,
    outbox: mpsc::Sender<Message>,
    reports: mpsc::UnboundedReceiver<DeliveryReport>,
}

impl SpoolDispatcher {
    pub fn new(
        spooler: Spooler,
        outbox: mpsc::Sender<Message>,
        reports: mpsc::UnboundedReceiver<DeliveryReport>,
    ) -> Self {
        Self {
            spooler,
            backoff: Backoff::new(),
            outbox,
            reports,
        }
    }

    fn next_tick(&self) -> Duration {
        if self.spooler.is_empty() {
            IDLE_TICK
        } else {
            self.backoff.delay()
        }
    }

    fn persist(&self) {
        if let Err(err) = self.spooler.store() {
            error!(spool = %self.spooler.path().display(), error = %err, "failed to store spool");
        }
    }

    fn record(&mut self, report: DeliveryReport) {
        match report {
            DeliveryReport::Failed(message) => {
                self.spooler.queue(message);
                self.backoff.backoff();
            }
            DeliveryReport::Delivered => self.backoff.reset(),
        }
    }

    /// Run until shutdown. The spool is written to disk before returning.
    ///
    /// After shutdown no more retries are sent, but reports are still collected
    /// until the delivery worker drops its sender, so in-flight and queued
    /// messages end up in the stored spool.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            let tick = self.next_tick();
            debug!(tick_secs = tick.as_secs(), "spool ticker armed");

            tokio::select! {
                _ = tokio::time::sleep(tick) => {
                    if let Some(message) = self.spooler.pop() {
                        self.persist();
                        if let Err(mpsc::error::SendError(message)) = self.outbox.send(message).await {
                            self.spooler.queue_front(message);
                            break;
                        }
                    }
                }
                report = self.reports.recv() => match report {
                    Some(report) => {
                        let failed = matches!(report, DeliveryReport::Failed(_));
                        self.record(report);
                        if failed {
                            self.persist();
                        }
                    }
                    None => break,
                },
                _ = shutdown.recv() => break,
            }
        }

        while let Some(report) = self.reports.recv().await {
            self.record(report);
        }
        debug!(queued = self.spooler.len(), "spool dispatcher shutting down");
        self.persist();
    }
}
