//! RDAP (Registration Data Access Protocol) resolution.
//!
//! For each domain the client looks up the TLD's registry in the bootstrap
//! cache, waits on that registry host's rate limiter, queries
//! `{base}domain/{name}` and classifies the answer:
//!
//! | Response            | Result                                        |
//! |---------------------|-----------------------------------------------|
//! | 404                 | `Available`                                   |
//! | 200                 | `Unavailable`                                 |
//! | 429                 | retried, host backs off; `Error(rate_limit)`  |
//! | timeout             | retried with linear backoff; `Error(timeout)` |
//! | connection failure  | retried with linear backoff; `Error(network)` |
//! | anything else       | `Error(http_error)`, not retried              |
//! | TLD not in bootstrap| `Unsupported`, no request made                |

use crate::concurrent::{RateLimiterRegistry, RequestOutcome, MAX_RETRY_AFTER};
use crate::error::CheckError;
use crate::protocols::bootstrap::BootstrapCache;
use crate::protocols::transport::{HttpRequest, HttpTransport, ReqwestTransport};
use crate::types::{DomainResult, ErrorKind, RdapConfig};
use crate::utils::{extract_tld, normalize_base_url, truncate_chars};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Media type requested from registries.
pub const RDAP_ACCEPT: &str = "application/rdap+json";

/// Longest error text carried in a result.
const MAX_ERROR_MESSAGE: usize = 100;

/// Step of the linear backoff between retries of one domain.
const RETRY_STEP: Duration = Duration::from_millis(500);

/// Concurrent RDAP client with per-host rate limiting.
///
/// All state (transport, bootstrap cache, limiters) is owned by the client
/// and shared by its concurrent checks; independent clients don't interact.
#[derive(Clone)]
pub struct RdapClient {
    config: RdapConfig,
    transport: Arc<dyn HttpTransport>,
    bootstrap: Arc<BootstrapCache>,
    limiters: Arc<RateLimiterRegistry>,
}

impl RdapClient {
    /// Create a client that talks to the network through reqwest.
    pub fn new(config: RdapConfig) -> Result<Self, CheckError> {
        let transport = ReqwestTransport::new(config.timeout, &config.user_agent)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client over a custom transport, with its own cache and limiters.
    pub fn with_transport(config: RdapConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let bootstrap = Arc::new(BootstrapCache::new(&config, transport.clone()));
        let limiters = Arc::new(RateLimiterRegistry::from_config(&config));
        Self::with_parts(config, transport, bootstrap, limiters)
    }

    /// Create a client from explicitly shared parts.
    pub fn with_parts(
        config: RdapConfig,
        transport: Arc<dyn HttpTransport>,
        bootstrap: Arc<BootstrapCache>,
        limiters: Arc<RateLimiterRegistry>,
    ) -> Self {
        Self {
            config,
            transport,
            bootstrap,
            limiters,
        }
    }

    pub fn config(&self) -> &RdapConfig {
        &self.config
    }

    pub fn bootstrap(&self) -> &Arc<BootstrapCache> {
        &self.bootstrap
    }

    pub fn limiters(&self) -> &Arc<RateLimiterRegistry> {
        &self.limiters
    }

    /// Resolve one domain. Never fails: every outcome is a [`DomainResult`].
    pub async fn check_domain(&self, domain: &str) -> DomainResult {
        let domain = domain.trim();
        let tld = extract_tld(domain);

        let Some(server) = self.bootstrap.get_server(&tld).await else {
            debug!(domain, tld = %tld, "no RDAP server for TLD");
            return DomainResult::unsupported(domain, tld);
        };

        let base = normalize_base_url(&server);
        let url = format!("{}domain/{}", base, domain);
        let limiter = self.limiters.get_limiter(&base);
        let attempts = self.config.max_retries.max(1);

        let mut last_kind = ErrorKind::Network;
        let mut last_message: Option<String> = None;
        let mut last_retry_after: Option<Duration> = None;

        for attempt in 1..=attempts {
            let more_attempts = attempt < attempts;
            let permit = match limiter.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    return DomainResult::error(
                        domain,
                        ErrorKind::Network,
                        Some(truncate_chars(&e.to_string(), MAX_ERROR_MESSAGE)),
                        None,
                    )
                }
            };

            let request = HttpRequest::get(&url)
                .header("Accept", RDAP_ACCEPT)
                .timeout(self.config.timeout);

            match self.transport.get(request).await {
                Ok(response) => {
                    debug!(domain, attempt, status = response.status, "RDAP response");
                    match response.status {
                        404 => {
                            permit.release(RequestOutcome::Completed);
                            return DomainResult::available(domain);
                        }
                        200 => {
                            permit.release(RequestOutcome::Completed);
                            return DomainResult::unavailable(domain);
                        }
                        429 => {
                            let retry_after =
                                response.header("retry-after").and_then(parse_retry_after);
                            permit.release(RequestOutcome::RateLimited { retry_after });
                            last_kind = ErrorKind::RateLimit;
                            last_message = None;
                            last_retry_after = retry_after;

                            if more_attempts {
                                // On top of the limiter's own hold-back.
                                let wait = retry_after
                                    .filter(|d| !d.is_zero())
                                    .unwrap_or_else(|| linear_backoff(attempt));
                                tokio::time::sleep(wait).await;
                            }
                        }
                        status => {
                            permit.release(RequestOutcome::Completed);
                            return DomainResult::error(
                                domain,
                                ErrorKind::HttpError,
                                Some(format!("RDAP status {}", status)),
                                None,
                            );
                        }
                    }
                }
                Err(e) => {
                    permit.release(RequestOutcome::Completed);
                    debug!(domain, attempt, error = %e, "RDAP request failed");
                    if !e.is_retryable() {
                        return DomainResult::error(
                            domain,
                            ErrorKind::Network,
                            Some(truncate_chars(&e.to_string(), MAX_ERROR_MESSAGE)),
                            None,
                        );
                    }
                    if e.is_timeout() {
                        last_kind = ErrorKind::Timeout;
                        last_message = None;
                    } else {
                        last_kind = ErrorKind::Network;
                        last_message = Some(truncate_chars(&e.to_string(), MAX_ERROR_MESSAGE));
                    }

                    if more_attempts {
                        tokio::time::sleep(linear_backoff(attempt)).await;
                    }
                }
            }
        }

        let message = match last_kind {
            ErrorKind::Timeout => Some("Request timed out after retries".to_string()),
            ErrorKind::RateLimit => Some("Rate limited, please retry later".to_string()),
            _ => last_message,
        };
        DomainResult::error(domain, last_kind, message, last_retry_after)
    }

    /// Revalidate the bootstrap mapping; `true` only if new data was stored.
    pub async fn refresh_bootstrap(&self, force: bool) -> bool {
        self.bootstrap.refresh(force).await
    }

    pub async fn is_tld_supported(&self, tld: &str) -> bool {
        self.bootstrap.is_supported(tld).await
    }

    pub async fn list_supported_tlds(&self) -> Vec<String> {
        self.bootstrap.list_supported_tlds().await
    }

    /// Resolve many domains concurrently.
    ///
    /// Results come back in input order, one per input. Concurrency is bounded
    /// only by the per-host limiters.
    pub async fn check_domains<S: AsRef<str>>(&self, domains: &[S]) -> Vec<DomainResult> {
        join_all(domains.iter().map(|d| self.check_domain(d.as_ref()))).await
    }
}

fn linear_backoff(attempt: u32) -> Duration {
    RETRY_STEP * attempt
}

/// Parse a `Retry-After` header value.
///
/// Accepts delay-seconds (`"120"`) or an HTTP-date, which is converted to the
/// time remaining until that date (zero if it has passed). Values beyond
/// [`MAX_RETRY_AFTER`] are capped to it. Anything else yields `None`.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(secs) = value.parse::<f64>() {
        if !secs.is_finite() || secs < 0.0 {
            return None;
        }
        let wait = Duration::try_from_secs_f64(secs).unwrap_or(MAX_RETRY_AFTER);
        return Some(wait.min(MAX_RETRY_AFTER));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let remaining = date.with_timezone(&Utc) - Utc::now();
    Some(remaining.to_std().unwrap_or(Duration::ZERO).min(MAX_RETRY_AFTER))
}
