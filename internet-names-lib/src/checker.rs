//! Main domain checker implementation.
//!
//! This module provides the `DomainChecker` struct, the entry point that
//! front ends use to resolve availability for one name, a batch, or a stream.

use crate::error::CheckError;
use crate::protocols::{BootstrapCache, HttpTransport, RdapClient};
use crate::report::AvailabilityReport;
use crate::types::{DomainResult, RdapConfig};
use crate::utils::expand_names;
use futures_util::stream::{FuturesUnordered, Stream};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info};

/// Most names accepted from a single input file.
const MAX_FILE_NAMES: usize = 5000;

/// Coordinates availability checks over a shared RDAP client.
///
/// Every checker owns its own bootstrap cache handle and rate limiters, so
/// two checkers in one process never throttle each other.
///
/// # Example
///
/// ```rust,no_run
/// use internet_names_lib::{DomainChecker, RdapConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let checker = DomainChecker::new(RdapConfig::default())?;
///     let result = checker.check_domain("example.com").await;
///     println!("{}: {}", result.domain, result.status);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct DomainChecker {
    client: RdapClient,
}

impl DomainChecker {
    /// Create a checker that queries registries over HTTPS.
    pub fn new(config: RdapConfig) -> Result<Self, CheckError> {
        Ok(Self {
            client: RdapClient::new(config)?,
        })
    }

    /// Create a checker over a custom transport.
    pub fn with_transport(config: RdapConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            client: RdapClient::with_transport(config, transport),
        }
    }

    /// Check availability of a single domain.
    ///
    /// Never fails: timeouts, rate limiting and unknown TLDs come back as
    /// [`DomainStatus`](crate::DomainStatus) variants.
    pub async fn check_domain(&self, domain: &str) -> DomainResult {
        self.client.check_domain(domain).await
    }

    /// Check many domains concurrently; results are in input order.
    pub async fn check_domains<S: AsRef<str>>(&self, domains: &[S]) -> Vec<DomainResult> {
        debug!(count = domains.len(), "checking domains");
        self.client.check_domains(domains).await
    }

    /// Expand bare names with `tlds` (see [`expand_names`]) and check them.
    pub async fn check_names<S: AsRef<str>>(
        &self,
        names: &[S],
        tlds: Option<&[String]>,
    ) -> Vec<DomainResult> {
        let domains = expand_names(names, tlds);
        self.check_domains(&domains).await
    }

    /// Check names and group the outcome into a report.
    pub async fn check_report<S: AsRef<str>>(
        &self,
        names: &[S],
        tlds: Option<&[String]>,
        only_available: bool,
    ) -> AvailabilityReport {
        let results = self.check_names(names, tlds).await;
        AvailabilityReport::from_results(&results, only_available)
    }

    /// Check domains and yield each result as soon as it completes.
    ///
    /// Items arrive in completion order, not input order.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use futures_util::StreamExt;
    /// use internet_names_lib::{DomainChecker, RdapConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let checker = DomainChecker::new(RdapConfig::default())?;
    ///     let domains = vec!["example.com".to_string(), "google.com".to_string()];
    ///
    ///     let mut stream = checker.check_domains_stream(&domains);
    ///     while let Some(result) = stream.next().await {
    ///         println!("{}: {}", result.domain, result.status);
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub fn check_domains_stream(
        &self,
        domains: &[String],
    ) -> Pin<Box<dyn Stream<Item = DomainResult> + Send + '_>> {
        let pending: FuturesUnordered<_> = domains
            .iter()
            .cloned()
            .map(|domain| async move { self.client.check_domain(&domain).await })
            .collect();

        Box::pin(pending)
    }

    /// Read names from a file (one per line) and check them.
    ///
    /// Blank lines and lines starting with `#` are skipped; bare names are
    /// expanded with `tlds` like [`check_names`](Self::check_names).
    pub async fn check_names_from_file<P: AsRef<Path>>(
        &self,
        path: P,
        tlds: Option<&[String]>,
    ) -> Result<Vec<DomainResult>, CheckError> {
        let names = read_names_file(path.as_ref())?;
        Ok(self.check_names(&names, tlds).await)
    }

    /// Refresh the TLD bootstrap registry.
    ///
    /// Without `force` nothing is fetched while the cached copy is fresh.
    /// Returns `true` only if new mapping data was stored; failures keep the
    /// previous mapping.
    pub async fn refresh_bootstrap(&self, force: bool) -> bool {
        let updated = self.client.refresh_bootstrap(force).await;
        info!(force, updated, "bootstrap refresh finished");
        updated
    }

    pub async fn is_tld_supported(&self, tld: &str) -> bool {
        self.client.is_tld_supported(tld).await
    }

    /// All TLDs with a known RDAP server, sorted.
    pub async fn list_supported_tlds(&self) -> Vec<String> {
        self.client.list_supported_tlds().await
    }

    /// Number of TLDs in the current mapping, without network activity.
    pub fn cached_tld_count(&self) -> Option<usize> {
        self.client
            .bootstrap()
            .snapshot()
            .map(|snapshot| snapshot.services.len())
    }

    pub fn bootstrap(&self) -> &Arc<BootstrapCache> {
        self.client.bootstrap()
    }

    /// Get the configuration this checker was built with.
    pub fn config(&self) -> &RdapConfig {
        self.client.config()
    }
}

/// Load names from a text file, skipping blanks and `#` comments.
pub fn read_names_file(path: &Path) -> Result<Vec<String>, CheckError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CheckError::file_error(path.display().to_string(), format!("Cannot read file: {}", e))
    })?;

    let names: Vec<String> = content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if names.is_empty() {
        return Err(CheckError::file_error(
            path.display().to_string(),
            "No names found in file",
        ));
    }
    if names.len() > MAX_FILE_NAMES {
        return Err(CheckError::file_error(
            path.display().to_string(),
            format!("Too many names ({}, limit {})", names.len(), MAX_FILE_NAMES),
        ));
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::testing::ScriptedTransport;
    use crate::protocols::HttpResponse;
    use crate::types::DomainStatus;
    use futures_util::StreamExt;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::{NamedTempFile, TempDir};

    const BOOTSTRAP: &str = "https://bootstrap.test/dns.json";

    fn bootstrap_body() -> String {
        serde_json::json!({
            "version": "1.0",
            "services": [
                [["com", "net"], ["https://rdap.verisign.test/com/v1/"]],
                [["io"], ["https://rdap.nic.test/io/"]]
            ]
        })
        .to_string()
    }

    fn checker(transport: ScriptedTransport) -> (TempDir, Arc<ScriptedTransport>, DomainChecker) {
        let dir = TempDir::new().unwrap();
        transport.route(BOOTSTRAP, HttpResponse::new(200).with_body(bootstrap_body()));
        let transport = Arc::new(transport);
        let config = RdapConfig::default()
            .with_bootstrap_url(BOOTSTRAP)
            .with_cache_path(dir.path().join("bootstrap.json"));
        let checker = DomainChecker::with_transport(config, transport.clone());
        (dir, transport, checker)
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_names_expands_and_resolves() {
        let transport = ScriptedTransport::new();
        transport.route("https://rdap.verisign.test/com/v1/domain/acme.com", HttpResponse::new(200));
        transport.route("https://rdap.verisign.test/", HttpResponse::new(404));
        transport.route("https://rdap.nic.test/", HttpResponse::new(404));
        let (_dir, transport, checker) = checker(transport);

        let tlds = vec!["com".to_string(), "io".to_string(), "zz".to_string()];
        let results = checker.check_names(&["acme", "acme.net"], Some(&tlds[..])).await;

        let names: Vec<&str> = results.iter().map(|r| r.domain.as_str()).collect();
        assert_eq!(names, vec!["acme.com", "acme.io", "acme.zz", "acme.net"]);
        assert_eq!(results[0].status, DomainStatus::Unavailable);
        assert!(results[1].is_available());
        assert_eq!(results[2].error_type(), Some("tld_unsupported"));
        assert!(results[3].is_available());

        // One bootstrap download shared by every lookup.
        let bootstrap_calls = transport
            .requests()
            .iter()
            .filter(|r| r.url == BOOTSTRAP)
            .count();
        assert_eq!(bootstrap_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_yields_every_result() {
        let transport = ScriptedTransport::with_latency(Duration::from_millis(100));
        transport.route("https://rdap.verisign.test/", HttpResponse::new(404));
        transport.route("https://rdap.nic.test/", HttpResponse::new(200));
        let (_dir, _transport, checker) = checker(transport);

        let domains: Vec<String> = vec!["a.com".into(), "b.io".into(), "c.net".into()];
        let mut stream = checker.check_domains_stream(&domains);

        let mut seen = Vec::new();
        while let Some(result) = stream.next().await {
            seen.push(result.domain);
        }
        seen.sort();
        assert_eq!(seen, vec!["a.com", "b.io", "c.net"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_supported_tlds() {
        let (_dir, _transport, checker) = checker(ScriptedTransport::new());

        assert!(checker.is_tld_supported("COM").await);
        assert!(!checker.is_tld_supported("zz").await);
        assert_eq!(checker.list_supported_tlds().await, vec!["com", "io", "net"]);
        // Already fresh: nothing new to store.
        assert!(!checker.refresh_bootstrap(false).await);
        assert_eq!(checker.cached_tld_count(), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_without_any_data() {
        let dir = TempDir::new().unwrap();
        let config = RdapConfig::default()
            .with_bootstrap_url(BOOTSTRAP)
            .with_cache_path(dir.path().join("bootstrap.json"));
        let checker = DomainChecker::with_transport(config, Arc::new(ScriptedTransport::new()));

        assert!(!checker.refresh_bootstrap(true).await);
        assert_eq!(checker.cached_tld_count(), None);
        assert!(checker.list_supported_tlds().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_report() {
        let transport = ScriptedTransport::new();
        transport.route("https://rdap.verisign.test/", HttpResponse::new(404));
        transport.route("https://rdap.nic.test/", HttpResponse::new(200));
        let (_dir, _transport, checker) = checker(transport);

        let tlds = vec!["com".to_string(), "io".to_string()];
        let report = checker.check_report(&["acme"], Some(&tlds[..]), false).await;
        assert_eq!(report.available_domains().collect::<Vec<_>>(), vec!["acme.com"]);
        assert_eq!(report.unavailable, Some(vec!["acme.io".to_string()]));
    }

    #[test]
    fn test_read_names_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# candidates").unwrap();
        writeln!(file, "acme").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  startup.io   # short one").unwrap();

        let names = read_names_file(file.path()).unwrap();
        assert_eq!(names, vec!["acme", "startup.io"]);
    }

    #[test]
    fn test_read_names_file_errors() {
        let empty = NamedTempFile::new().unwrap();
        assert!(matches!(
            read_names_file(empty.path()),
            Err(CheckError::File { .. })
        ));
        assert!(read_names_file(Path::new("/nonexistent/names.txt")).is_err());
    }
}
