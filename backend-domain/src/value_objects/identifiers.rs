// Identifier value objects

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Orchestrator workflow identifier: `{host}_scan-{unix nanos}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn derive(web_url: &str, at: DateTime<Utc>) -> Self {
        let host = match extract_host(web_url) {
            Some(host) => sanitize_host(&host),
            None => sanitize_host(web_url),
        };
        let nanos = at
            .timestamp_nanos_opt()
            .unwrap_or_else(|| at.timestamp_micros().saturating_mul(1_000));
        Self(format!("{}_scan-{}", host, nanos))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn extract_host(web_url: &str) -> Option<String> {
    Url::parse(web_url.trim())
        .ok()
        .and_then(|url| url.host_str().map(str::to_owned))
}

fn sanitize_host(raw: &str) -> String {
    let sanitized: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();
    let sanitized = sanitized.trim_matches('-');
    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 3, 4, 5, 6).unwrap()
    }

    #[test]
    fn derive_uses_sanitized_hostname() {
        let id = WorkflowId::derive("https://user@App.Example.com:8443/login?x=1", instant());
        assert!(id.as_str().starts_with("app-example-com_scan-"));
    }

    #[test]
    fn distinct_hosts_or_instants_yield_distinct_ids() {
        let at = instant();
        let a = WorkflowId::derive("https://a.example.com", at);
        let b = WorkflowId::derive("https://b.example.com", at);
        let later = WorkflowId::derive("https://a.example.com", at + Duration::nanoseconds(1));
        assert_ne!(a, b);
        assert_ne!(a, later);
    }

    #[test]
    fn host_is_normalized_before_sanitizing() {
        let encoded = WorkflowId::derive("https://ex%61mple.com/", instant());
        assert!(encoded.as_str().starts_with("example-com_scan-"));
        let no_slashes = WorkflowId::derive("https:example.com", instant());
        assert!(no_slashes.as_str().starts_with("example-com_scan-"));
        let idn = WorkflowId::derive("https://b\u{fc}cher.example/", instant());
        assert!(idn.as_str().starts_with("xn--bcher-kva-example_scan-"));
    }

    #[test]
    fn unparseable_url_falls_back_to_raw_input() {
        let id = WorkflowId::derive("not a url", instant());
        assert!(id.as_str().starts_with("not-a-url_scan-"));
        let id = WorkflowId::derive("://", instant());
        assert!(id.as_str().starts_with("unknown_scan-"));
    }
}
