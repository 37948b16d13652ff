//! ---
//! alerter_section: "11-test-harness"
//! alerter_subsection: "02-drivers"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Unix socket that captures one client payload."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::UnixListener;

use crate::{HarnessError, MessageAsserter};

/// Stands in for the daemon socket so the client's output can be inspected.
pub struct MessageCaptor {
    path: PathBuf,
    listener: UnixListener,
}

impl MessageCaptor {
    pub fn bind(path: impl Into<PathBuf>) -> Result<Self, HarnessError> {
        let path = path.into();
        match std::fs::remove_file(&path) {
            Err(err) if err.kind() != ErrorKind::NotFound => return Err(err.into()),
            _ => {}
        }
        let listener = UnixListener::bind(&path)?;
        Ok(Self { path, listener })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept one connection and read it to EOF.
    pub async fn capture_raw(&self, timeout: Duration) -> Result<Vec<u8>, HarnessError> {
        let read = async {
            let (mut stream, _) = self.listener.accept().await?;
            let mut payload = Vec::new();
            stream.read_to_end(&mut payload).await?;
            Ok::<_, std::io::Error>(payload)
        };
        match tokio::time::timeout(timeout, read).await {
            Ok(payload) => Ok(payload?),
            Err(_) => Err(HarnessError::Timeout {
                what: "client connection",
                after: timeout,
            }),
        }
    }

    pub async fn capture(&self, timeout: Duration) -> Result<MessageAsserter, HarnessError> {
        let payload = self.capture_raw(timeout).await?;
        MessageAsserter::from_slice(&payload)
    }
}

impl Drop for MessageCaptor {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
