// internet-names-lib/tests/integration.rs

//! Integration tests for internet-names-lib exports and core functionality

use async_trait::async_trait;
use internet_names_lib::{
    expand_names, read_names_file, AvailabilityReport, CheckError, DomainChecker, DomainResult, DomainStatus,
    HttpRequest, HttpResponse, HttpTransport, RdapConfig, DEFAULT_TLDS,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

const BOOTSTRAP_URL: &str = "https://bootstrap.test/rdap/dns.json";

/// Small in-memory registry: `taken` names answer 200, the rest 404.
struct FakeRegistry {
    taken: Vec<&'static str>,
    calls: AtomicUsize,
}

impl FakeRegistry {
    fn new(taken: Vec<&'static str>) -> Self {
        Self {
            taken,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl HttpTransport for FakeRegistry {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, CheckError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if request.url == BOOTSTRAP_URL {
            let body = serde_json::json!({
                "version": "1.0",
                "publication": "2025-01-01T00:00:00Z",
                "services": [
                    [["com", "net"], ["https://rdap.registry.test/com/v1/"]],
                    [["dev", "app"], ["https://rdap.registry.test/google"]]
                ]
            });
            return Ok(HttpResponse::new(200)
                .with_header("Cache-Control", "max-age=3600")
                .with_body(body.to_string()));
        }

        let name = request.url.rsplit('/').next().unwrap_or_default();
        let status = if self.taken.contains(&name) { 200 } else { 404 };
        Ok(HttpResponse::new(status))
    }
}

fn offline_checker(dir: &TempDir, registry: Arc<FakeRegistry>) -> DomainChecker {
    let config = RdapConfig::default()
        .with_bootstrap_url(BOOTSTRAP_URL)
        .with_cache_path(dir.path().join("rdap_bootstrap.json"))
        .with_min_delay_per_host(Duration::from_millis(10));
    DomainChecker::with_transport(config, registry)
}

#[test]
fn test_library_exports_work() {
    assert_eq!(DEFAULT_TLDS.len(), 8);
    assert_eq!(
        expand_names(&["brand"], None).first().map(String::as_str),
        Some("brand.com")
    );

    let report = AvailabilityReport::from_results(&[DomainResult::available("brand.com")], true);
    assert_eq!(report.summary.available, 1);
}

#[test]
fn test_read_names_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("names.txt");
    std::fs::write(&path, "brand\n# idea\nbrand.io\n").unwrap();

    let names = assert_ok!(read_names_file(&path));
    assert_eq!(names, vec!["brand", "brand.io"]);
    assert_err!(read_names_file(&dir.path().join("missing.txt")));
}

#[tokio::test]
async fn test_end_to_end_with_fake_registry() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(FakeRegistry::new(vec!["brand.com", "brand.dev"]));
    let checker = offline_checker(&dir, registry.clone());

    let tlds = vec!["com".to_string(), "dev".to_string(), "app".to_string(), "xyz".to_string()];
    let results = checker.check_names(&["brand", "other.net"], Some(&tlds[..])).await;

    let statuses: Vec<(&str, &DomainStatus)> =
        results.iter().map(|r| (r.domain.as_str(), &r.status)).collect();
    assert_eq!(
        statuses,
        vec![
            ("brand.com", &DomainStatus::Unavailable),
            ("brand.dev", &DomainStatus::Unavailable),
            ("brand.app", &DomainStatus::Available),
            ("brand.xyz", &DomainStatus::Unsupported { tld: "xyz".to_string() }),
            ("other.net", &DomainStatus::Available),
        ]
    );

    // Bootstrap persisted for the next process.
    assert!(dir.path().join("rdap_bootstrap.json").exists());
    // One bootstrap fetch plus four registry queries.
    assert_eq!(registry.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_second_checker_reuses_cache_file() {
    let dir = TempDir::new().unwrap();
    let first = offline_checker(&dir, Arc::new(FakeRegistry::new(vec![])));
    assert!(first.refresh_bootstrap(false).await);
    assert_eq!(first.cached_tld_count(), Some(4));

    let registry = Arc::new(FakeRegistry::new(vec![]));
    let second = offline_checker(&dir, registry.clone());
    assert!(second.is_tld_supported("net").await);
    assert_eq!(registry.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unreachable_bootstrap_reports_unsupported() {
    let dir = TempDir::new().unwrap();
    let config = RdapConfig::default()
        .with_bootstrap_url("http://127.0.0.1:9/dns.json")
        .with_cache_path(dir.path().join("rdap_bootstrap.json"))
        .with_timeout(Duration::from_secs(2));
    let checker = DomainChecker::new(config).unwrap();

    let result = checker.check_domain("example.com").await;
    assert_eq!(result.error_type(), Some("tld_unsupported"));
    assert!(!checker.refresh_bootstrap(true).await);
    assert_eq!(checker.cached_tld_count(), None);
}

// ============================================================
// Live network scenarios
// ============================================================

/// google.com must always be reported as taken.
#[tokio::test]
#[ignore]
async fn test_known_taken_domain_google_com() {
    let checker = DomainChecker::new(RdapConfig::default()).unwrap();
    let result = checker.check_domain("google.com").await;
    assert_eq!(
        result.status,
        DomainStatus::Unavailable,
        "google.com must be reported as TAKEN"
    );
}

/// A random 16-letter .com is practically guaranteed to be free.
#[tokio::test]
#[ignore]
async fn test_random_com_is_available() {
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    let label: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .filter(|c| c.is_ascii_lowercase())
        .take(16)
        .map(char::from)
        .collect();

    let checker = DomainChecker::new(RdapConfig::default()).unwrap();
    let result = checker.check_domain(&format!("{}.com", label)).await;
    assert!(result.is_available(), "got {:?}", result);
}

#[tokio::test]
#[ignore]
async fn test_unknown_tld_is_unsupported() {
    let checker = DomainChecker::new(RdapConfig::default()).unwrap();
    let result = checker.check_domain("example.nonexistenttld999").await;
    assert_eq!(result.error_type(), Some("tld_unsupported"));
}

/// Different registries are queried in parallel, not one after another.
#[tokio::test]
#[ignore]
async fn test_parallel_hosts() {
    let checker = DomainChecker::new(RdapConfig::default()).unwrap();
    checker.refresh_bootstrap(false).await;
    assert!(checker.cached_tld_count().is_some());

    let started = std::time::Instant::now();
    let results = checker
        .check_domains(&["google.com", "google.dev", "wikipedia.org"])
        .await;
    assert!(results.iter().all(|r| r.is_definitive()), "{:?}", results);
    assert!(started.elapsed() < Duration::from_secs(20));
}
