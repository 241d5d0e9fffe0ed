//! Reporting-hostname selection.
//!
//! Tries the configured hostname first, then the build's `HOSTNAME`
//! environment variable. Shelling out to the OS for a hostname is
//! deliberately not done here; when neither source yields a valid name the
//! emission simply carries no hostname.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

const MAX_HOSTNAME_LEN: usize = 255;

/// Names that resolve to the local machine and carry no routing value.
const LOCAL_HOSTS: [&str; 4] = [
    "localhost",
    "localhost.localdomain",
    "localhost6.localdomain6",
    "ip6-localhost",
];

static RFC_1123_HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        "^(([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9\\-]*[a-zA-Z0-9])\\.)*\
         ([A-Za-z0-9]|[A-Za-z0-9][A-Za-z0-9\\-]*[A-Za-z0-9])$",
    )
    .expect("hostname pattern is valid")
});

/// Picks the hostname to report: the configured one when valid, otherwise
/// the `HOSTNAME` environment variable when valid, otherwise `None`.
#[must_use]
pub fn resolve_hostname(
    configured: Option<&str>,
    env: &HashMap<String, String>,
) -> Option<String> {
    if let Some(hostname) = configured {
        if is_valid_hostname(hostname) {
            tracing::debug!(hostname, "using configured hostname");
            return Some(hostname.to_string());
        }
    }
    if let Some(hostname) = env.get("HOSTNAME") {
        if is_valid_hostname(hostname) {
            tracing::debug!(hostname = %hostname, "using hostname from environment");
            return Some(hostname.clone());
        }
    }
    tracing::debug!("no valid hostname available, emissions carry none");
    None
}

/// Whether `hostname` is a usable reporting hostname: non-local, at most 255
/// characters, and RFC 1123 compliant.
#[must_use]
pub fn is_valid_hostname(hostname: &str) -> bool {
    if hostname.is_empty() {
        return false;
    }
    let lowered = hostname.to_lowercase();
    if LOCAL_HOSTS.contains(&lowered.as_str()) {
        tracing::debug!(hostname, "hostname is local");
        return false;
    }
    if hostname.len() > MAX_HOSTNAME_LEN {
        tracing::debug!(hostname, "hostname exceeds maximum length");
        return false;
    }
    RFC_1123_HOSTNAME.is_match(hostname)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn rejects_local_hostnames() {
        assert!(!is_valid_hostname("localhost"));
        assert!(!is_valid_hostname("LOCALHOST.localdomain"));
    }

    #[test]
    fn rejects_overlong_hostnames() {
        assert!(!is_valid_hostname(&"a".repeat(256)));
    }

    #[test]
    fn accepts_rfc_1123_names() {
        assert!(is_valid_hostname("build-agent-07.internal.example.com"));
        assert!(!is_valid_hostname("-leading-dash"));
        assert!(!is_valid_hostname(""));
    }

    #[test]
    fn configured_hostname_wins() {
        let env = env(&[("HOSTNAME", "agent-env")]);
        assert_eq!(
            resolve_hostname(Some("agent-cfg"), &env).as_deref(),
            Some("agent-cfg")
        );
    }

    #[test]
    fn invalid_configured_hostname_falls_back_to_env() {
        let env = env(&[("HOSTNAME", "agent-env")]);
        assert_eq!(
            resolve_hostname(Some("localhost"), &env).as_deref(),
            Some("agent-env")
        );
        assert_eq!(resolve_hostname(None, &env).as_deref(), Some("agent-env"));
    }

    #[test]
    fn no_source_yields_none() {
        assert_eq!(resolve_hostname(None, &env(&[])), None);
    }
}
