//! Per-registry-host rate limiting.
//!
//! Every RDAP registry host gets one [`HostRateLimiter`], created lazily by the
//! [`RateLimiterRegistry`] and shared by all concurrent queries to that host.
//! A limiter caps in-flight requests, spaces request starts by a minimum delay,
//! and holds new requests back after the host answers 429.
//!
//! Limiters on different hosts are independent, so registries are queried in
//! parallel, each at its own pace.

use crate::types::RdapConfig;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::error::CheckError;

/// Ceiling for the exponential backoff, in seconds.
const MAX_BACKOFF_SECS: u64 = 32;

/// Jitter applied to the exponential backoff (+/- this fraction).
const BACKOFF_JITTER: f64 = 0.25;

/// Longest hold-back a single rate-limit response can impose on a host.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// How a request that held a [`RatePermit`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Anything that was not a rate-limit response
    Completed,
    /// The host answered 429, optionally with a Retry-After value
    RateLimited { retry_after: Option<Duration> },
}

#[derive(Debug, Default)]
struct BackoffState {
    retry_after_until: Option<Instant>,
    consecutive_rate_limits: u32,
}

/// Concurrency cap, request spacing and backoff for one registry host.
#[derive(Debug)]
pub struct HostRateLimiter {
    host: String,
    max_concurrent: usize,
    min_delay: Duration,
    slots: Semaphore,
    /// Start time of the most recent granted request. Held for the whole
    /// timing check so two acquirers can't both pass the same gap.
    last_request: tokio::sync::Mutex<Option<Instant>>,
    backoff: Mutex<BackoffState>,
}

/// A granted request slot on a host.
///
/// Call [`RatePermit::release`] once the request finishes. Dropping the permit
/// without releasing frees the slot but leaves the backoff state untouched.
#[must_use = "a permit must be released with the request outcome"]
#[derive(Debug)]
pub struct RatePermit<'a> {
    limiter: &'a HostRateLimiter,
    _slot: SemaphorePermit<'a>,
}

impl HostRateLimiter {
    pub fn new<H: Into<String>>(host: H, max_concurrent: usize, min_delay: Duration) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            host: host.into(),
            max_concurrent,
            min_delay,
            slots: Semaphore::new(max_concurrent),
            last_request: tokio::sync::Mutex::new(None),
            backoff: Mutex::new(BackoffState::default()),
        }
    }

    /// Wait for permission to start a request on this host.
    ///
    /// Suspends until a concurrency slot is free, any Retry-After window has
    /// passed, and at least `min_delay` has elapsed since the previous start.
    pub async fn acquire(&self) -> Result<RatePermit<'_>, CheckError> {
        let slot = self.slots.acquire().await.map_err(|_| {
            CheckError::internal(format!("rate limiter for {} was closed", self.host))
        })?;

        let mut last_request = self.last_request.lock().await;
        loop {
            let now = Instant::now();
            let mut wait_until = self.backoff_state().retry_after_until.filter(|t| *t > now);

            if let Some(last) = *last_request {
                let ready = last + self.min_delay;
                if ready > now {
                    wait_until = Some(wait_until.map_or(ready, |t| t.max(ready)));
                }
            }

            match wait_until {
                // A release during the sleep may push the window further out,
                // so check again afterwards.
                Some(deadline) => sleep_until(deadline).await,
                None => break,
            }
        }
        *last_request = Some(Instant::now());

        Ok(RatePermit {
            limiter: self,
            _slot: slot,
        })
    }

    fn record(&self, outcome: RequestOutcome) {
        let mut state = self.backoff_state();
        match outcome {
            RequestOutcome::RateLimited { retry_after } => {
                state.consecutive_rate_limits = state.consecutive_rate_limits.saturating_add(1);
                let wait = retry_after
                    .unwrap_or_else(|| jittered_backoff(state.consecutive_rate_limits))
                    .min(MAX_RETRY_AFTER);
                let now = Instant::now();
                state.retry_after_until = Some(now.checked_add(wait).unwrap_or(now));
                debug!(
                    host = %self.host,
                    consecutive = state.consecutive_rate_limits,
                    wait_ms = wait.as_millis() as u64,
                    "rate limited, holding host back"
                );
            }
            RequestOutcome::Completed => {
                state.consecutive_rate_limits = 0;
            }
        }
    }

    fn backoff_state(&self) -> std::sync::MutexGuard<'_, BackoffState> {
        self.backoff.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Rate-limit responses seen since the last clean completion.
    pub fn consecutive_rate_limits(&self) -> u32 {
        self.backoff_state().consecutive_rate_limits
    }

    /// Instant before which no new request may start, if one is set.
    pub fn retry_after_until(&self) -> Option<Instant> {
        self.backoff_state().retry_after_until
    }

    /// Concurrency slots currently free.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }
}

impl RatePermit<'_> {
    /// Free the slot and feed the outcome into the host's backoff state.
    pub fn release(self, outcome: RequestOutcome) {
        self.limiter.record(outcome);
    }
}

/// Un-jittered backoff after `consecutive` rate limits: `min(2^n, 32)` seconds.
pub fn base_backoff(consecutive: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(consecutive).min(MAX_BACKOFF_SECS))
}

/// [`base_backoff`] perturbed uniformly by +/- 25%.
pub fn jittered_backoff(consecutive: u32) -> Duration {
    let base = base_backoff(consecutive).as_secs_f64();
    let factor = rand::thread_rng().gen_range(-BACKOFF_JITTER..=BACKOFF_JITTER);
    Duration::from_secs_f64((base * (1.0 + factor)).max(0.0))
}

/// Hands out one shared [`HostRateLimiter`] per registry host.
#[derive(Debug)]
pub struct RateLimiterRegistry {
    max_concurrent: usize,
    min_delay: Duration,
    limiters: Mutex<HashMap<String, Arc<HostRateLimiter>>>,
}

impl RateLimiterRegistry {
    pub fn new(max_concurrent: usize, min_delay: Duration) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            min_delay,
            limiters: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RdapConfig) -> Self {
        Self::new(config.max_concurrent_per_host, config.min_delay_per_host)
    }

    /// Get or create the limiter for the host of `url`.
    ///
    /// Lookup and creation happen under one lock, so concurrent callers for
    /// the same host always share a single limiter.
    pub fn get_limiter(&self, url: &str) -> Arc<HostRateLimiter> {
        let host = host_key(url);
        let mut limiters = self.limiters.lock().unwrap_or_else(PoisonError::into_inner);
        limiters
            .entry(host)
            .or_insert_with_key(|host| {
                debug!(host = %host, "creating rate limiter");
                Arc::new(HostRateLimiter::new(
                    host.clone(),
                    self.max_concurrent,
                    self.min_delay,
                ))
            })
            .clone()
    }

    /// Number of hosts seen so far.
    pub fn len(&self) -> usize {
        self.limiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lower-cased `host[:port]` of a URL, the unit of rate limiting.
pub fn host_key(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(parsed) => match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port).to_lowercase(),
            (Some(host), None) => host.to_lowercase(),
            (None, _) => url.to_lowercase(),
        },
        Err(_) => {
            let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
            rest.split('/').next().unwrap_or(rest).to_lowercase()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_host_key() {
        assert_eq!(
            host_key("https://RDAP.Verisign.com/com/v1/"),
            "rdap.verisign.com"
        );
        assert_eq!(
            host_key("http://127.0.0.1:8080/rdap/"),
            "127.0.0.1:8080"
        );
        assert_eq!(host_key("rdap.nic.example/path"), "rdap.nic.example");
    }

    #[test]
    fn test_base_backoff_doubles_to_ceiling() {
        let delays: Vec<u64> = (1..=7).map(|n| base_backoff(n).as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 8, 16, 32, 32, 32]);
        assert_eq!(base_backoff(u32::MAX).as_secs(), 32);
    }

    #[test]
    fn test_jitter_within_bounds() {
        for n in 1..=6 {
            let base = base_backoff(n).as_secs_f64();
            for _ in 0..50 {
                let d = jittered_backoff(n).as_secs_f64();
                assert!(d >= base * 0.75 - 1e-9 && d <= base * 1.25 + 1e-9, "{} vs {}", d, base);
            }
        }
    }

    #[test]
    fn test_registry_shares_limiter_per_host() {
        let registry = RateLimiterRegistry::new(2, Duration::from_millis(500));
        let a = registry.get_limiter("https://rdap.verisign.com/com/v1/");
        let b = registry.get_limiter("https://RDAP.VERISIGN.COM/net/v1/");
        let c = registry.get_limiter("https://rdap.nic.io/");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 2);
        assert_eq!(a.max_concurrent(), 2);
        assert_eq!(a.min_delay(), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_registry_concurrent_creation_is_atomic() {
        let registry = Arc::new(RateLimiterRegistry::new(2, Duration::ZERO));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.get_limiter("https://rdap.example.org/")
            }));
        }

        let mut limiters = Vec::new();
        for handle in handles {
            limiters.push(handle.await.unwrap());
        }
        assert_eq!(registry.len(), 1);
        assert!(limiters.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_delay_spaces_request_starts() {
        let limiter = HostRateLimiter::new("rdap.example", 4, Duration::from_millis(500));
        let origin = Instant::now();
        let mut starts = Vec::new();

        for _ in 0..4 {
            let permit = limiter.acquire().await.unwrap();
            starts.push(Instant::now() - origin);
            permit.release(RequestOutcome::Completed);
        }

        assert_eq!(starts[0], Duration::ZERO);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_never_exceeds_cap() {
        let limiter = Arc::new(HostRateLimiter::new("rdap.example", 2, Duration::ZERO));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = limiter.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let permit = limiter.acquire().await.unwrap();
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(1)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                permit.release(RequestOutcome::Completed);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(limiter.available_slots(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_retry_after_blocks_next_start() {
        let limiter = HostRateLimiter::new("rdap.example", 2, Duration::ZERO);

        let permit = limiter.acquire().await.unwrap();
        let limited_at = Instant::now();
        permit.release(RequestOutcome::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        });
        assert_eq!(limiter.consecutive_rate_limits(), 1);

        let permit = limiter.acquire().await.unwrap();
        assert!(Instant::now() - limited_at >= Duration::from_secs(7));
        permit.release(RequestOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_retry_after_is_capped() {
        let limiter = HostRateLimiter::new("rdap.example", 1, Duration::ZERO);

        let permit = limiter.acquire().await.unwrap();
        let limited_at = Instant::now();
        permit.release(RequestOutcome::RateLimited {
            retry_after: Some(Duration::MAX),
        });

        let until = limiter.retry_after_until().unwrap();
        assert_eq!(until - limited_at, MAX_RETRY_AFTER);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_grows_then_resets() {
        let limiter = HostRateLimiter::new("rdap.example", 1, Duration::ZERO);

        for expected in 1..=3u32 {
            let permit = limiter.acquire().await.unwrap();
            let released_at = Instant::now();
            permit.release(RequestOutcome::RateLimited { retry_after: None });
            assert_eq!(limiter.consecutive_rate_limits(), expected);

            let until = limiter.retry_after_until().unwrap();
            let wait = until - released_at;
            let base = base_backoff(expected);
            assert!(wait >= base.mul_f64(0.75) && wait <= base.mul_f64(1.25));
        }

        let permit = limiter.acquire().await.unwrap();
        permit.release(RequestOutcome::Completed);
        assert_eq!(limiter.consecutive_rate_limits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_permit_frees_slot() {
        let limiter = HostRateLimiter::new("rdap.example", 1, Duration::ZERO);
        {
            let _permit = limiter.acquire().await.unwrap();
            assert_eq!(limiter.available_slots(), 0);
        }
        assert_eq!(limiter.available_slots(), 1);
        assert_eq!(limiter.consecutive_rate_limits(), 0);
    }
}
