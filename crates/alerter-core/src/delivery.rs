//! ---
//! alerter_section: "05-daemon-runtime"
//! alerter_subsection: "module"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Worker posting messages to the notifier."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
use std::sync::Arc;

use alerter_common::Message;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::notifier::Notifier;

/// Outcome of one delivery attempt, consumed by the spool dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryReport {
    Delivered,
    Failed(Message),
}

pub struct DeliveryWorker {
    notifier: Arc<dyn Notifier>,
    inbox: mpsc::Receiver<Message>,
    reports: mpsc::UnboundedSender<DeliveryReport>,
}

impl DeliveryWorker {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        inbox: mpsc::Receiver<Message>,
        reports: mpsc::UnboundedSender<DeliveryReport>,
    ) -> Self {
        Self {
            notifier,
            inbox,
            reports,
        }
    }

    /// Deliver messages one at a time until shutdown or until every sender is gone.
    ///
    /// On shutdown the delivery in progress completes and anything still queued
    /// is reported as failed so the dispatcher can spool it.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            let message = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                next = self.inbox.recv() => match next {
                    Some(message) => message,
                    None => break,
                },
            };

            let report = self.attempt(message).await;
            if self.reports.send(report).is_err() {
                debug!("spool dispatcher gone, delivery worker stopping");
                return;
            }
        }

        self.hand_back().await;
        debug!("delivery worker shutting down");
    }

    async fn attempt(&self, message: Message) -> DeliveryReport {
        match self.notifier.deliver(&message).await {
            Ok(()) => {
                info!(backend = self.notifier.name(), "message delivered");
                DeliveryReport::Delivered
            }
            Err(err) => {
                warn!(backend = self.notifier.name(), error = %err, "delivery failed, spooling");
                DeliveryReport::Failed(message)
            }
        }
    }

    async fn hand_back(&mut self) {
        self.inbox.close();
        let mut returned = 0usize;
        while let Some(message) = self.inbox.recv().await {
            if self.reports.send(DeliveryReport::Failed(message)).is_err() {
                break;
            }
            returned += 1;
        }
        if returned > 0 {
            info!(returned, "undelivered messages returned to the spool");
        }
    }
}
