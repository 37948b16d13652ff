//! ---
//! alerter_section: "05-daemon-runtime"
//! alerter_subsection: "module"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Termination signal handling."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::{debug, info};

/// Handlers for SIGINT, SIGTERM and SIGQUIT.
///
/// Install before the socket is bound: a signal arriving earlier takes the
/// default action and the spool is never stored.
pub struct Terminator {
    sigint: Signal,
    sigterm: Signal,
    sigquit: Signal,
}

impl Terminator {
    pub fn install() -> std::io::Result<Self> {
        let terminator = Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
            sigquit: signal(SignalKind::quit())?,
        };
        debug!("signal handler ready");
        Ok(terminator)
    }

    /// Wait for the first termination signal and return its name.
    pub async fn wait(mut self) -> &'static str {
        let received = tokio::select! {
            _ = self.sigint.recv() => "SIGINT",
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigquit.recv() => "SIGQUIT",
        };
        info!(signal = received, "termination requested");
        received
    }
}
