//! # Internet Names Library
//!
//! Domain availability checking over RDAP, with IANA bootstrap discovery and
//! per-registry rate limiting.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use internet_names_lib::{DomainChecker, RdapConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let checker = DomainChecker::new(RdapConfig::default())?;
//!     let results = checker.check_names(&["acme"], None).await;
//!
//!     for result in results {
//!         println!("{}: {}", result.domain, result.status);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Three-way answers**: available, taken, or a retryable error; a
//!   timeout or rate limit never reads as "taken"
//! - **Bootstrap Registry**: TLD -> RDAP server mapping cached on disk with
//!   HTTP revalidation
//! - **Per-host Rate Limiting**: concurrency ceiling, request spacing and
//!   `Retry-After`-aware backoff for each registry
//! - **Configurable**: TOML files, `INAMES_*` environment variables

// Re-export main public API types and functions
// This makes them available as internet_names_lib::TypeName
pub use checker::{read_names_file, DomainChecker};
pub use concurrent::{
    HostRateLimiter, RatePermit, RateLimiterRegistry, RequestOutcome, MAX_RETRY_AFTER,
};
pub use config::{
    default_cache_path, load_env_config, load_env_config_from, parse_duration_string,
    BootstrapSection, ConfigManager, DefaultsConfig, EnvConfig, FileConfig, RdapSection,
};
pub use error::CheckError;
pub use protocols::{
    parse_retry_after, BootstrapCache, BootstrapSnapshot, HttpRequest, HttpResponse,
    HttpTransport, RdapClient, ReqwestTransport,
};
pub use report::{AvailabilityReport, AvailableEntry, ReportError, ReportSummary, UnsupportedEntry};
pub use types::{DomainResult, DomainStatus, ErrorKind, RdapConfig, IANA_BOOTSTRAP_URL, TLD_UNSUPPORTED};
pub use utils::{expand_names, extract_tld, DEFAULT_TLDS};

// Internal modules - the items above are the public API
mod checker;
mod concurrent;
mod config;
mod error;
mod protocols;
mod report;
mod types;
mod utils;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, CheckError>;

// Library version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
