//! Core data types for domain availability checking.
//!
//! The result of a check is a closed classification ([`DomainStatus`]) rather
//! than a boolean: a transient failure must never read as "taken".

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default IANA RDAP bootstrap document for DNS.
pub const IANA_BOOTSTRAP_URL: &str = "https://data.iana.org/rdap/dns.json";

/// Result of a single domain availability check.
///
/// Constructed once per domain per resolution and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainResult {
    /// The fully-qualified name that was queried (e.g., "example.com")
    pub domain: String,

    /// Outcome of the check, carrying only the fields relevant to it
    #[serde(flatten)]
    pub status: DomainStatus,
}

/// Availability verdict for one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DomainStatus {
    /// Registry answered 404: the name can be registered
    Available,

    /// Registry answered 200: the name is registered
    Unavailable,

    /// The registry could not give a definitive answer; retry later
    Error {
        error_type: ErrorKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none", with = "optional_secs")]
        retry_after: Option<Duration>,
    },

    /// No RDAP server is known for the TLD
    Unsupported { tld: String },
}

/// Why a check ended in [`DomainStatus::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request ran out of time on every attempt
    Timeout,
    /// The registry kept answering 429
    RateLimit,
    /// Connection-level failure
    Network,
    /// Unexpected HTTP status; never retried
    HttpError,
}

/// Error type string reported for unsupported TLDs.
pub const TLD_UNSUPPORTED: &str = "tld_unsupported";

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Network => "network",
            ErrorKind::HttpError => "http_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DomainResult {
    pub fn available<D: Into<String>>(domain: D) -> Self {
        Self {
            domain: domain.into(),
            status: DomainStatus::Available,
        }
    }

    pub fn unavailable<D: Into<String>>(domain: D) -> Self {
        Self {
            domain: domain.into(),
            status: DomainStatus::Unavailable,
        }
    }

    pub fn error<D: Into<String>>(
        domain: D,
        error_type: ErrorKind,
        error_message: Option<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        Self {
            domain: domain.into(),
            status: DomainStatus::Error {
                error_type,
                error_message,
                retry_after,
            },
        }
    }

    pub fn unsupported<D: Into<String>, T: Into<String>>(domain: D, tld: T) -> Self {
        Self {
            domain: domain.into(),
            status: DomainStatus::Unsupported { tld: tld.into() },
        }
    }

    /// True only if the registry confirmed the name is free.
    pub fn is_available(&self) -> bool {
        matches!(self.status, DomainStatus::Available)
    }

    /// True for confirmed answers (available or taken).
    pub fn is_definitive(&self) -> bool {
        matches!(
            self.status,
            DomainStatus::Available | DomainStatus::Unavailable
        )
    }

    /// Error category string, present for `Error` and `Unsupported` results.
    pub fn error_type(&self) -> Option<&'static str> {
        match &self.status {
            DomainStatus::Error { error_type, .. } => Some(error_type.as_str()),
            DomainStatus::Unsupported { .. } => Some(TLD_UNSUPPORTED),
            _ => None,
        }
    }

    /// Human-readable detail for non-definitive results.
    pub fn error_message(&self) -> Option<String> {
        match &self.status {
            DomainStatus::Error { error_message, .. } => error_message.clone(),
            DomainStatus::Unsupported { tld } => Some(format!("TLD .{} not in RDAP bootstrap", tld)),
            _ => None,
        }
    }

    /// Server-advised wait before retrying, when known.
    pub fn retry_after(&self) -> Option<Duration> {
        match &self.status {
            DomainStatus::Error { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainStatus::Available => write!(f, "available"),
            DomainStatus::Unavailable => write!(f, "unavailable"),
            DomainStatus::Error { error_type, .. } => write!(f, "error ({})", error_type),
            DomainStatus::Unsupported { .. } => write!(f, "unsupported"),
        }
    }
}

/// Configuration for the resolution core.
///
/// Defaults are conservative enough for public registries: two requests in
/// flight per registry host, half a second between request starts.
#[derive(Debug, Clone)]
pub struct RdapConfig {
    /// Per-request timeout for registry queries
    pub timeout: Duration,

    /// Attempts per domain (including the first one)
    pub max_retries: u32,

    /// Concurrency ceiling per registry host
    pub max_concurrent_per_host: usize,

    /// Minimum spacing between request starts on one host
    pub min_delay_per_host: Duration,

    /// Where the TLD -> server mapping is published
    pub bootstrap_url: String,

    /// Timeout for the bootstrap fetch
    pub bootstrap_timeout: Duration,

    /// Cache lifetime when the bootstrap response has no max-age
    pub bootstrap_default_ttl: Duration,

    /// How long to wait after a failed automatic refresh before trying again
    pub bootstrap_retry_interval: Duration,

    /// Persisted bootstrap cache file
    pub cache_path: PathBuf,

    /// User-Agent sent with every request
    pub user_agent: String,
}

impl Default for RdapConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 3,
            max_concurrent_per_host: 2,
            min_delay_per_host: Duration::from_millis(500),
            bootstrap_url: IANA_BOOTSTRAP_URL.to_string(),
            bootstrap_timeout: Duration::from_secs(30),
            bootstrap_default_ttl: Duration::from_secs(24 * 3600),
            bootstrap_retry_interval: Duration::from_secs(60),
            cache_path: crate::config::default_cache_path(),
            user_agent: format!("internet-names/{} (RDAP)", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl RdapConfig {
    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set attempts per domain; at least one attempt is always made.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set the per-host concurrency ceiling (minimum 1).
    pub fn with_max_concurrent_per_host(mut self, max: usize) -> Self {
        self.max_concurrent_per_host = max.max(1);
        self
    }

    /// Set the minimum spacing between request starts on a host.
    pub fn with_min_delay_per_host(mut self, delay: Duration) -> Self {
        self.min_delay_per_host = delay;
        self
    }

    pub fn with_bootstrap_url<U: Into<String>>(mut self, url: U) -> Self {
        self.bootstrap_url = url.into();
        self
    }

    pub fn with_cache_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_path = path.into();
        self
    }

    pub fn with_bootstrap_retry_interval(mut self, interval: Duration) -> Self {
        self.bootstrap_retry_interval = interval;
        self
    }
}

/// Serialize `Option<Duration>` as fractional seconds.
pub(crate) mod optional_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(d)?;
        Ok(secs
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_types() {
        let unsupported = DomainResult::unsupported("example.zzz", "zzz");
        assert_eq!(unsupported.error_type(), Some("tld_unsupported"));
        assert_eq!(
            unsupported.error_message().as_deref(),
            Some("TLD .zzz not in RDAP bootstrap")
        );

        let limited = DomainResult::error(
            "example.com",
            ErrorKind::RateLimit,
            None,
            Some(Duration::from_secs(30)),
        );
        assert_eq!(limited.error_type(), Some("rate_limit"));
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(30)));
        assert!(!limited.is_definitive());

        assert_eq!(DomainResult::available("a.com").error_type(), None);
        assert!(DomainResult::unavailable("a.com").is_definitive());
    }

    #[test]
    fn test_serialized_shape() {
        let result = DomainResult::error(
            "example.com",
            ErrorKind::RateLimit,
            Some("Rate limited, please retry later".to_string()),
            Some(Duration::from_millis(1500)),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["domain"], "example.com");
        assert_eq!(json["status"], "error");
        assert_eq!(json["error_type"], "rate_limit");
        assert_eq!(json["retry_after"], 1.5);

        let available = serde_json::to_value(DomainResult::available("free.dev")).unwrap();
        assert_eq!(available, serde_json::json!({"domain": "free.dev", "status": "available"}));

        let back: DomainResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_config_builders_clamp() {
        let config = RdapConfig::default()
            .with_max_retries(0)
            .with_max_concurrent_per_host(0);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.max_concurrent_per_host, 1);

        let defaults = RdapConfig::default();
        assert_eq!(defaults.max_retries, 3);
        assert_eq!(defaults.max_concurrent_per_host, 2);
        assert_eq!(defaults.min_delay_per_host, Duration::from_millis(500));
        assert_eq!(defaults.timeout, Duration::from_secs(10));
    }
}
