//! ---
//! alerter_section: "01-core-functionality"
//! alerter_subsection: "module"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Host identification for alert senders."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

const HOSTNAME_FILE: &str = "/etc/hostname";

/// Name of the local host, used as the sender of every alert.
///
/// `None` when `/etc/hostname` is unreadable or blank; there is no fallback.
pub fn hostname() -> Option<String> {
    read_hostname(Path::new(HOSTNAME_FILE))
}

fn read_hostname(path: &Path) -> Option<String> {
    let raw = fs::read_to_string(path).ok()?;
    let name = raw.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_owned())
    }
}
