//! ---
//! alerter_section: "01-core-functionality"
//! alerter_subsection: "module"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Shared primitives for the alert client and daemon."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
//! Shared primitives for the alerter workspace.
//! This crate exposes the message wire format, configuration loading, host
//! identification, and version metadata consumed by both binaries.

pub mod config;
pub mod host;
pub mod message;
pub mod version;

pub use config::{
    ClientConfig, ConfigError, ServerConfig, ENV_CLIENT_CONFIG_PATH, ENV_SERVER_CONFIG_PATH,
};
pub use message::{AlertRequest, Attachment, Field, Level, Message, MessageError};
pub use version::VersionInfo;
