//! ---
//! alerter_section: "04-spool-persistence"
//! alerter_subsection: "module"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Spool of undelivered alerts and retry backoff."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Undelivered alerts survive daemon restarts in a JSON-lines spool file.

/// Result alias used throughout the spool crate.
pub type Result<T> = std::result::Result<T, SpoolError>;

/// Error type for the spool subsystem.
#[derive(Debug, thiserror::Error)]
pub enum SpoolError {
    /// Wrapper for IO errors encountered while reading/writing the spool file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON serialization issues.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub mod backoff;
pub mod spooler;

pub use backoff::Backoff;
pub use spooler::Spooler;
