//! ---
//! alerter_section: "05-daemon-runtime"
//! alerter_subsection: "module"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Unix socket intake for client messages."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
use std::fs::{self, Permissions};
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use alerter_common::Message;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, warn};

/// Largest payload accepted from a single connection.
pub const MAX_PAYLOAD_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("could not remove stale socket {}: {source}", path.display())]
    RemoveStale {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not bind socket {}: {source}", path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not open permissions of {}: {source}", path.display())]
    Permissions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Bound Unix socket accepting one JSON message per connection.
#[derive(Debug)]
pub struct Listener {
    path: PathBuf,
    listener: UnixListener,
}

impl Listener {
    /// Replace any stale socket at `path`, bind, and make it world writable.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(path: impl Into<PathBuf>) -> Result<Self, ListenerError> {
        let path = path.into();
        match fs::remove_file(&path) {
            Ok(()) => debug!(socket = %path.display(), "removed stale socket"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(source) => return Err(ListenerError::RemoveStale { path, source }),
        }

        let listener = match UnixListener::bind(&path) {
            Ok(listener) => listener,
            Err(source) => return Err(ListenerError::Bind { path, source }),
        };
        if let Err(source) = fs::set_permissions(&path, Permissions::from_mode(0o777)) {
            return Err(ListenerError::Permissions { path, source });
        }
        debug!(socket = %path.display(), "socket open");
        Ok(Self { path, listener })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode one client payload.
    pub fn decode(payload: &[u8]) -> Result<Message, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Accept connections until shutdown, forwarding decoded messages.
    ///
    /// The socket file is removed on the way out.
    pub async fn run(self, deliveries: mpsc::Sender<Message>, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let deliveries = deliveries.clone();
                        tokio::spawn(handle_connection(stream, deliveries));
                    }
                    Err(err) => error!(error = %err, "failed to accept connection"),
                },
                _ = shutdown.recv() => break,
            }
        }

        debug!("listener shutting down");
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != ErrorKind::NotFound {
                warn!(socket = %self.path.display(), error = %err, "could not remove socket");
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, deliveries: mpsc::Sender<Message>) {
    let mut payload = Vec::new();
    let mut reader = stream.take(MAX_PAYLOAD_BYTES + 1);
    if let Err(err) = reader.read_to_end(&mut payload).await {
        error!(error = %err, "failed to read from socket");
        return;
    }
    if payload.len() as u64 > MAX_PAYLOAD_BYTES {
        warn!(limit = MAX_PAYLOAD_BYTES, "dropping oversized request");
        return;
    }

    let message = match Listener::decode(&payload) {
        Ok(message) => message,
        Err(err) => {
            warn!(error = %err, "could not read request");
            return;
        }
    };
    if deliveries.send(message).await.is_err() {
        warn!("delivery worker gone, dropping message");
    }
}
