//! ---
//! alerter_section: "11-test-harness"
//! alerter_subsection: "02-drivers"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Spawned alerter daemon under test."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use alerter_common::{Message, ServerConfig};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::{HarnessConfiguration, HarnessError};

/// A running `alerter` process. It is killed when dropped.
pub struct ServerProcess {
    child: Child,
    socket_path: PathBuf,
    spool_path: PathBuf,
}

impl ServerProcess {
    /// Start the daemon in `working_dir` with the resolved server and log configuration.
    ///
    /// Relative paths in the server configuration resolve against `working_dir`.
    pub fn spawn(config: &HarnessConfiguration, working_dir: &Path) -> Result<Self, HarnessError> {
        let server_config = ServerConfig::load(config.server_config_path())?;
        let spool_path = server_config.spool_path()?.to_path_buf();

        let child = Command::new(config.server_binary_path())
            .arg("-c")
            .arg(config.server_config_path())
            .arg("-v")
            .arg(config.log_config_path())
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;
        debug!(pid = ?child.id(), dir = %working_dir.display(), "server spawned");

        Ok(Self {
            child,
            socket_path: working_dir.join(server_config.socket_path),
            spool_path: working_dir.join(spool_path),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn spool_path(&self) -> &Path {
        &self.spool_path
    }

    /// Wait until the daemon has bound its socket.
    pub async fn wait_until_ready(&mut self, timeout: Duration) -> Result<(), HarnessError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Err(HarnessError::Exited(status));
            }
            if self.socket_path.exists() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(HarnessError::Timeout {
                    what: "server socket",
                    after: timeout,
                });
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Write a raw payload to the daemon socket.
    pub async fn send_raw(&self, payload: &[u8]) -> Result<(), HarnessError> {
        let mut stream = UnixStream::connect(&self.socket_path).await?;
        stream.write_all(payload).await?;
        stream.shutdown().await?;
        Ok(())
    }

    pub async fn send(&self, message: &Message) -> Result<(), HarnessError> {
        self.send_raw(&serde_json::to_vec(message)?).await
    }

    /// Number of messages currently persisted in the spool file.
    pub fn spooled(&self) -> Result<usize, HarnessError> {
        match std::fs::read_to_string(&self.spool_path) {
            Ok(contents) => Ok(contents.lines().filter(|line| !line.trim().is_empty()).count()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    /// Ask the daemon to stop with SIGTERM and wait up to `timeout` for it to exit.
    ///
    /// The process is killed if it is still running once the timeout passes.
    pub async fn terminate(mut self, timeout: Duration) -> Result<ExitStatus, HarnessError> {
        if let Some(pid) = self.child.id() {
            debug!(pid, "terminating server");
            kill(Pid::from_raw(pid as i32), Signal::SIGTERM)?;
        }
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(status) => Ok(status?),
            Err(_) => Err(HarnessError::Timeout {
                what: "server exit",
                after: timeout,
            }),
        }
    }

    /// Kill the daemon and wait for it to exit.
    pub async fn kill(mut self) -> Result<(), HarnessError> {
        self.child.kill().await?;
        Ok(())
    }
}
