//! ---
//! alerter_section: "05-daemon-runtime"
//! alerter_subsection: "module"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Webhook delivery backends."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
use std::time::Duration;

use alerter_common::Message;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream answered with status {0}")]
    Status(u16),
}

/// Destination that accepts finished messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message. Any error leaves the message for a later retry.
    async fn deliver(&self, message: &Message) -> Result<(), DeliveryError>;

    /// Short backend name for log fields.
    fn name(&self) -> &'static str;
}

/// Posts messages to a Slack-compatible incoming webhook.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    client: reqwest::Client,
    webhook: Url,
}

impl SlackNotifier {
    pub fn new(webhook: Url, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("alerter/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, webhook })
    }

    pub fn webhook(&self) -> &Url {
        &self.webhook
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn deliver(&self, message: &Message) -> Result<(), DeliveryError> {
        debug!(webhook = %self.webhook, "posting message");
        let response = self
            .client
            .post(self.webhook.clone())
            .json(message)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            warn!(status = status.as_u16(), "upstream reported error");
            Err(DeliveryError::Status(status.as_u16()))
        }
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}
