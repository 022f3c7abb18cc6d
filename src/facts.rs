//! Host facts
//!
//! The fqdn is taken from, in order: the `--fqdn` flag, `hostname -f`,
//! `/etc/hostname`, `$HOSTNAME`, and finally `localhost`.

use modkit::Facts;
use std::fs;

use crate::runner;

const FALLBACK_FQDN: &str = "localhost";

/// Gather facts for this host
pub fn gather(fqdn_override: Option<&str>) -> Facts {
    let fqdn = fqdn_override
        .and_then(non_empty)
        .or_else(from_hostname_command)
        .or_else(from_hostname_file)
        .or_else(|| std::env::var("HOSTNAME").ok().and_then(|h| non_empty(&h)))
        .unwrap_or_else(|| FALLBACK_FQDN.to_string());

    log::debug!("Host fqdn: {fqdn}");
    Facts::new(fqdn)
}

fn from_hostname_command() -> Option<String> {
    match runner::run_capture("hostname", &["-f"]) {
        Ok(out) => non_empty(&out),
        Err(e) => {
            log::debug!("hostname -f unavailable: {e:#}");
            None
        }
    }
}

fn from_hostname_file() -> Option<String> {
    fs::read_to_string("/etc/hostname")
        .ok()
        .and_then(|content| content.lines().next().and_then(non_empty))
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
