//! ---
//! alerter_section: "04-spool-persistence"
//! alerter_subsection: "module"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Exponential retry delay for spooled alerts."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
use std::time::Duration;

use tracing::info;

/// Upper bound for the retry delay, in seconds.
pub const MAX_BACKOFF_SECS: u64 = 86_400;

/// Retry delay that doubles after every failed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    seconds: u64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

impl Backoff {
    /// Start at one second.
    pub fn new() -> Self {
        Self { seconds: 1 }
    }

    /// Return to one second after a successful delivery.
    pub fn reset(&mut self) {
        self.seconds = 1;
    }

    /// Double the delay, never exceeding [`MAX_BACKOFF_SECS`].
    pub fn backoff(&mut self) {
        self.seconds = self.seconds.saturating_mul(2).min(MAX_BACKOFF_SECS);
        info!(backoff_secs = self.seconds, "increasing backoff");
    }

    /// Current delay in seconds.
    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    /// Current delay.
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_and_resets() {
        let mut backoff = Backoff::new();
        assert_eq!(backoff.seconds(), 1);
        backoff.backoff();
        backoff.backoff();
        assert_eq!(backoff.delay(), Duration::from_secs(4));
        backoff.reset();
        assert_eq!(backoff, Backoff::default());
    }

    #[test]
    fn capped_at_one_day() {
        let mut backoff = Backoff::new();
        for _ in 0..80 {
            backoff.backoff();
        }
        assert_eq!(backoff.seconds(), MAX_BACKOFF_SECS);
    }
}
