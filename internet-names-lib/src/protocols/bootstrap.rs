//! IANA RDAP bootstrap cache.
//!
//! The bootstrap document maps TLDs to the RDAP servers authoritative for
//! them. It is cached in a JSON file and revalidated with a conditional GET
//! once it expires (`Cache-Control: max-age`, 24 hours by default).
//!
//! Failure to reach or parse the bootstrap source never breaks lookups: the
//! last good mapping keeps serving. A TLD only comes back unsupported when no
//! mapping for it was ever obtained.

use crate::error::CheckError;
use crate::protocols::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::types::RdapConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Upper bound accepted for a server-provided max-age.
const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 3600);

/// One complete copy of the bootstrap mapping, as persisted on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapSnapshot {
    /// `Last-Modified` of the response this came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,

    /// `ETag` of the response this came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// After this instant the mapping must be revalidated
    pub expires_at: DateTime<Utc>,

    /// Lower-case TLD -> candidate base URLs, first one preferred
    pub services: BTreeMap<String, Vec<String>>,
}

impl BootstrapSnapshot {
    pub fn new(services: BTreeMap<String, Vec<String>>, ttl: Duration) -> Self {
        Self {
            last_modified: None,
            etag: None,
            expires_at: expiry_after(ttl),
            services,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// First candidate server for `tld` (case-insensitive).
    pub fn server_for(&self, tld: &str) -> Option<&str> {
        self.services
            .get(&tld.to_lowercase())
            .and_then(|urls| urls.first())
            .map(String::as_str)
    }
}

/// File-backed, periodically revalidated TLD -> RDAP server mapping.
pub struct BootstrapCache {
    source_url: String,
    path: PathBuf,
    fetch_timeout: Duration,
    default_ttl: Duration,
    retry_interval: Duration,
    transport: Arc<dyn HttpTransport>,
    current: RwLock<Option<Arc<BootstrapSnapshot>>>,
    refresh_lock: tokio::sync::Mutex<()>,
    last_failure: Mutex<Option<Instant>>,
    /// The cache file holds nothing newer than `current`; cleared on every
    /// refresh attempt so files written by other processes are picked up.
    disk_checked: AtomicBool,
}

impl BootstrapCache {
    pub fn new(config: &RdapConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            source_url: config.bootstrap_url.clone(),
            path: config.cache_path.clone(),
            fetch_timeout: config.bootstrap_timeout,
            default_ttl: config.bootstrap_default_ttl,
            retry_interval: config.bootstrap_retry_interval,
            transport,
            current: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
            last_failure: Mutex::new(None),
            disk_checked: AtomicBool::new(false),
        }
    }

    /// Location of the persisted cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// RDAP base URL for `tld`, refreshing first if the cache is missing or
    /// expired. `None` if the TLD has no known server.
    pub async fn get_server(&self, tld: &str) -> Option<String> {
        let snapshot = self.fresh_snapshot().await?;
        snapshot.server_for(tld).map(str::to_string)
    }

    pub async fn is_supported(&self, tld: &str) -> bool {
        self.get_server(tld).await.is_some()
    }

    /// All TLDs with a known server, sorted.
    pub async fn list_supported_tlds(&self) -> Vec<String> {
        match self.fresh_snapshot().await {
            Some(snapshot) => snapshot.services.keys().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Current mapping without triggering any network activity.
    pub fn snapshot(&self) -> Option<Arc<BootstrapSnapshot>> {
        self.load()
    }

    /// Revalidate the mapping against the bootstrap source.
    ///
    /// Without `force`, nothing is fetched while the cache is unexpired.
    /// Returns `true` only when new mapping data replaced the old one; a 304,
    /// an error status, unparseable or empty data and network failures all
    /// return `false` and leave the existing mapping intact.
    pub async fn refresh(&self, force: bool) -> bool {
        self.revalidate(force, false).await
    }

    /// `automatic` refreshes (triggered by lookups) are skipped for
    /// `retry_interval` after a failure; explicit ones always go out.
    async fn revalidate(&self, force: bool, automatic: bool) -> bool {
        let _guard = self.refresh_lock.lock().await;
        if automatic && self.failed_recently() {
            debug!("bootstrap refresh failed recently, serving cached data");
            return false;
        }

        self.disk_checked.store(false, Ordering::Relaxed);
        let cached = self.load();

        // Another caller (or process) may have refreshed while we waited.
        if !force && cached.as_ref().is_some_and(|c| !c.is_expired()) {
            return false;
        }

        let mut request = HttpRequest::get(&self.source_url)
            .header("Accept", "application/json")
            .timeout(self.fetch_timeout);
        if let Some(cached) = &cached {
            if let Some(last_modified) = cached.last_modified.as_deref().filter(|v| !v.is_empty()) {
                request = request.header("If-Modified-Since", last_modified);
            }
            if let Some(etag) = cached.etag.as_deref().filter(|v| !v.is_empty()) {
                request = request.header("If-None-Match", etag);
            }
        }

        let response = match self.transport.get(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %self.source_url, error = %e, "bootstrap fetch failed, keeping cached data");
                self.note_failure();
                return false;
            }
        };

        match response.status {
            304 => {
                match cached {
                    Some(cached) => {
                        let mut next = (*cached).clone();
                        next.expires_at = expiry_after(self.ttl_for(&response));
                        if let Some(etag) = response.header("etag") {
                            next.etag = Some(etag.to_string());
                        }
                        if let Some(last_modified) = response.header("last-modified") {
                            next.last_modified = Some(last_modified.to_string());
                        }
                        debug!(expires_at = %next.expires_at, "bootstrap not modified");
                        self.install(next);
                        self.clear_failure();
                    }
                    None => {
                        warn!("bootstrap answered 304 but no cached copy exists");
                        self.note_failure();
                    }
                }
                false
            }
            200 => match parse_services(&response.body) {
                Ok(services) if !services.is_empty() => {
                    info!(tlds = services.len(), "bootstrap mapping updated");
                    self.install(BootstrapSnapshot {
                        last_modified: response.header("last-modified").map(str::to_string),
                        etag: response.header("etag").map(str::to_string),
                        expires_at: expiry_after(self.ttl_for(&response)),
                        services,
                    });
                    self.clear_failure();
                    true
                }
                Ok(_) => {
                    warn!("bootstrap document has no services, keeping cached data");
                    self.note_failure();
                    false
                }
                Err(e) => {
                    warn!(error = %e, "bootstrap document unparseable, keeping cached data");
                    self.note_failure();
                    false
                }
            },
            status => {
                warn!(status, "bootstrap source returned unexpected status, keeping cached data");
                self.note_failure();
                false
            }
        }
    }

    /// Replace the whole mapping and persist it.
    ///
    /// Readers see either the old or the new snapshot, never a mix.
    pub fn replace(&self, snapshot: BootstrapSnapshot) {
        self.install(snapshot);
    }

    async fn fresh_snapshot(&self) -> Option<Arc<BootstrapSnapshot>> {
        let snapshot = self.load();
        if snapshot.as_ref().map_or(true, |s| s.is_expired()) {
            self.revalidate(false, true).await;
            return self.load();
        }
        snapshot
    }

    /// In-memory snapshot, falling back to (or superseded by a newer) file.
    fn load(&self) -> Option<Arc<BootstrapSnapshot>> {
        let in_memory = self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(snapshot) = &in_memory {
            if !snapshot.is_expired() {
                return in_memory;
            }
        }

        if self.disk_checked.load(Ordering::Relaxed) {
            return in_memory;
        }

        // Missing or expired in memory: another process may have refreshed
        // the file in the meantime.
        self.disk_checked.store(true, Ordering::Relaxed);
        match read_cache_file(&self.path) {
            Some(from_disk)
                if in_memory
                    .as_ref()
                    .map_or(true, |m| from_disk.expires_at > m.expires_at) =>
            {
                let from_disk = Arc::new(from_disk);
                *self.current.write().unwrap_or_else(PoisonError::into_inner) =
                    Some(from_disk.clone());
                Some(from_disk)
            }
            _ => in_memory,
        }
    }

    fn install(&self, snapshot: BootstrapSnapshot) {
        if let Err(e) = write_cache_file(&self.path, &snapshot) {
            warn!(error = %e, "could not persist bootstrap cache");
        }
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(snapshot));
        self.disk_checked.store(true, Ordering::Relaxed);
    }

    fn ttl_for(&self, response: &HttpResponse) -> Duration {
        response
            .header("cache-control")
            .and_then(parse_max_age)
            .filter(|secs| *secs > 0)
            .map(|secs| Duration::from_secs(secs).min(MAX_TTL))
            .unwrap_or(self.default_ttl)
    }

    fn failed_recently(&self) -> bool {
        let last_failure = *self.last_failure.lock().unwrap_or_else(PoisonError::into_inner);
        last_failure.is_some_and(|at| at.elapsed() < self.retry_interval)
    }

    fn note_failure(&self) {
        *self.last_failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    fn clear_failure(&self) {
        *self.last_failure.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

fn expiry_after(ttl: Duration) -> DateTime<Utc> {
    let now = Utc::now();
    chrono::Duration::from_std(ttl.min(MAX_TTL))
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(now)
}

/// `max-age` directive of a Cache-Control header, in seconds.
pub fn parse_max_age(cache_control: &str) -> Option<u64> {
    cache_control.split(',').find_map(|directive| {
        let directive = directive.trim().to_ascii_lowercase();
        directive
            .strip_prefix("max-age=")
            .and_then(|value| value.trim().parse::<u64>().ok())
    })
}

/// Parse the bootstrap document's `services` list into TLD -> URLs.
///
/// Format: `{"services": [[["com", "net"], ["https://rdap.verisign.com/com/v1/"]], ...]}`.
/// Malformed entries are skipped; a missing `services` array yields an empty map.
pub fn parse_services(body: &str) -> Result<BTreeMap<String, Vec<String>>, CheckError> {
    let json: serde_json::Value = serde_json::from_str(body)?;
    let mut services = BTreeMap::new();

    let Some(entries) = json.get("services").and_then(|s| s.as_array()) else {
        return Ok(services);
    };

    for entry in entries {
        let Some(pair) = entry.as_array().filter(|p| p.len() >= 2) else {
            continue;
        };
        let urls: Vec<String> = pair[1]
            .as_array()
            .map(|urls| {
                urls.iter()
                    .filter_map(|u| u.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if urls.is_empty() {
            continue;
        }

        if let Some(tlds) = pair[0].as_array() {
            for tld in tlds.iter().filter_map(|t| t.as_str()) {
                services.insert(tld.to_lowercase(), urls.clone());
            }
        }
    }

    Ok(services)
}

/// Read the persisted cache; any failure reads as "no cache".
fn read_cache_file(path: &Path) -> Option<BootstrapSnapshot> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "ignoring corrupt bootstrap cache");
            None
        }
    }
}

/// Write via a sibling temp file and rename, so the file is never half-written.
fn write_cache_file(path: &Path, snapshot: &BootstrapSnapshot) -> Result<(), CheckError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            CheckError::file_error(parent.to_string_lossy(), e.to_string())
        })?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "rdap_bootstrap.json".to_string());
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

    let content = serde_json::to_string_pretty(snapshot)?;
    fs::write(&tmp, content)
        .map_err(|e| CheckError::file_error(tmp.to_string_lossy(), e.to_string()))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        CheckError::file_error(path.to_string_lossy(), e.to_string())
    })
}
