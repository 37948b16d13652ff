//! ---
//! alerter_section: "02-messaging-data-model"
//! alerter_subsection: "module"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Alert message wire format shared by client, daemon, and webhook."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
//! The client writes a [`Message`] as a single JSON document to the daemon's
//! socket, and the daemon posts the same document to the webhook unchanged.
//! The layout follows the Slack incoming-webhook attachment format.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A complete alert as accepted by the daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Target channel; the webhook default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Name shown as the sender, usually the originating host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_link: Option<String>,
    pub text: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub footer: String,
    /// Unix timestamp in seconds.
    #[serde(default)]
    pub ts: i64,
}

/// Additional key-value pair rendered below the alert text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub title: String,
    pub value: String,
    #[serde(default)]
    pub short: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("field '{0}' is missing a ':' separator")]
    MissingSeparator(String),
    #[error("unknown level '{0}', expected one of OK, WARN, ERROR, UNKNOWN")]
    UnknownLevel(String),
}

impl FromStr for Field {
    type Err = MessageError;

    /// Parse `key:value`. Only the first `:` separates, so values may contain colons.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (title, value) = raw
            .split_once(':')
            .ok_or_else(|| MessageError::MissingSeparator(raw.to_owned()))?;
        Ok(Field {
            title: title.to_owned(),
            value: value.to_owned(),
            short: true,
        })
    }
}

/// Severity of an alert, rendered as the attachment color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Ok,
    Warn,
    Error,
    #[default]
    Unknown,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Ok, Level::Warn, Level::Error, Level::Unknown];

    pub fn color(self) -> &'static str {
        match self {
            Level::Ok => "#44bb77",
            Level::Warn => "#ffaa44",
            Level::Error => "#ff5566",
            Level::Unknown => "#aa44ff",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Ok => "OK",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| MessageError::UnknownLevel(s.to_owned()))
    }
}

/// Everything the operator supplies on the command line for one alert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertRequest {
    pub channel: Option<String>,
    pub title: String,
    pub title_link: Option<String>,
    pub text: String,
    pub level: Level,
    pub fields: Vec<Field>,
}

impl AlertRequest {
    /// Build the wire message for this request.
    pub fn compose(
        self,
        username: Option<String>,
        footer: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Message {
        let attachment = Attachment {
            color: self.level.color().to_owned(),
            title: self.title,
            title_link: self.title_link,
            text: self.text,
            fields: self.fields,
            footer: footer.into(),
            ts: now.timestamp(),
        };
        Message {
            channel: self.channel,
            username,
            attachments: vec![attachment],
        }
    }
}
