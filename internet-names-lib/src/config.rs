//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files and `INAMES_*`
//! environment variables, and layering them over [`RdapConfig`] defaults.

use crate::error::CheckError;
use crate::types::RdapConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const APP_DIR: &str = "internet-names";
const CACHE_FILE: &str = "rdap_bootstrap.json";

/// Configuration loaded from TOML files.
///
/// ```toml
/// [rdap]
/// timeout = "10s"
/// max_retries = 3
/// max_concurrent_per_host = 2
/// min_delay_per_host = "500ms"
///
/// [bootstrap]
/// url = "https://data.iana.org/rdap/dns.json"
/// cache_path = "/var/cache/internet-names/rdap_bootstrap.json"
///
/// [defaults]
/// tlds = ["com", "io", "dev"]
/// only_available = true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FileConfig {
    /// Registry query settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rdap: Option<RdapSection>,

    /// Bootstrap registry settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<BootstrapSection>,

    /// Defaults for the command-line front end
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RdapSection {
    /// Per-request timeout (e.g. "10s")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_per_host: Option<usize>,

    /// Minimum spacing between request starts to one host (e.g. "500ms")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_delay_per_host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BootstrapSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Cache lifetime when the source sends no `max-age`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_ttl: Option<String>,

    /// How long to wait after a failed refresh before trying again
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_interval: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<PathBuf>,
}

/// Default values that map to CLI options.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DefaultsConfig {
    /// TLDs combined with bare names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tlds: Option<Vec<String>>,

    /// Only report available names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub only_available: Option<bool>,
}

impl FileConfig {
    /// Overlay the values set in this file onto `config`.
    pub fn apply_to(&self, mut config: RdapConfig) -> RdapConfig {
        if let Some(rdap) = &self.rdap {
            if let Some(timeout) = rdap.timeout.as_deref().and_then(parse_duration_string) {
                config = config.with_timeout(timeout);
            }
            if let Some(retries) = rdap.max_retries {
                config = config.with_max_retries(retries);
            }
            if let Some(max) = rdap.max_concurrent_per_host {
                config = config.with_max_concurrent_per_host(max);
            }
            if let Some(delay) = rdap
                .min_delay_per_host
                .as_deref()
                .and_then(parse_duration_string)
            {
                config = config.with_min_delay_per_host(delay);
            }
            if let Some(user_agent) = &rdap.user_agent {
                config.user_agent = user_agent.clone();
            }
        }

        if let Some(bootstrap) = &self.bootstrap {
            if let Some(url) = &bootstrap.url {
                config = config.with_bootstrap_url(url.clone());
            }
            if let Some(timeout) = bootstrap.timeout.as_deref().and_then(parse_duration_string) {
                config.bootstrap_timeout = timeout;
            }
            if let Some(ttl) = bootstrap
                .default_ttl
                .as_deref()
                .and_then(parse_duration_string)
            {
                config.bootstrap_default_ttl = ttl;
            }
            if let Some(interval) = bootstrap
                .retry_interval
                .as_deref()
                .and_then(parse_duration_string)
            {
                config = config.with_bootstrap_retry_interval(interval);
            }
            if let Some(path) = &bootstrap.cache_path {
                config = config.with_cache_path(path.clone());
            }
        }

        config
    }
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Report which files were merged at info level rather than debug
    pub verbose: bool,
}

impl ConfigManager {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load and validate configuration from a specific file.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, CheckError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(CheckError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            CheckError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            CheckError::config(format!(
                "Failed to parse TOML configuration {}: {}",
                path.display(),
                e
            ))
        })?;

        self.validate_config(&config)?;

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config < `~/.internet-names.toml` < `./internet-names.toml`.
    /// A file that exists but fails to parse or validate is an error.
    pub fn discover_and_load(&self) -> Result<FileConfig, CheckError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            let config = self.load_file(&path)?;
            merged_config = self.merge_configs(merged_config, config);
            loaded_files.push(path);
        }

        for path in &loaded_files {
            if self.verbose {
                info!(path = %path.display(), "loaded config file");
            } else {
                debug!(path = %path.display(), "loaded config file");
            }
        }

        Ok(merged_config)
    }

    fn get_local_config_path(&self) -> Option<PathBuf> {
        let path = Path::new("./internet-names.toml");
        path.exists().then(|| path.to_path_buf())
    }

    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        let path = Path::new(&home).join(".internet-names.toml");
        path.exists().then_some(path)
    }

    /// Get the XDG configuration file path.
    ///
    /// Follows the XDG Base Directory Specification.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join(APP_DIR).join("config.toml");
        path.exists().then_some(path)
    }

    /// Merge two configurations with proper precedence.
    ///
    /// Values from `higher` take precedence over values from `lower`.
    pub fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            rdap: match (lower.rdap, higher.rdap) {
                (Some(lower), Some(higher)) => Some(RdapSection {
                    timeout: higher.timeout.or(lower.timeout),
                    max_retries: higher.max_retries.or(lower.max_retries),
                    max_concurrent_per_host: higher
                        .max_concurrent_per_host
                        .or(lower.max_concurrent_per_host),
                    min_delay_per_host: higher.min_delay_per_host.or(lower.min_delay_per_host),
                    user_agent: higher.user_agent.or(lower.user_agent),
                }),
                (lower, higher) => higher.or(lower),
            },
            bootstrap: match (lower.bootstrap, higher.bootstrap) {
                (Some(lower), Some(higher)) => Some(BootstrapSection {
                    url: higher.url.or(lower.url),
                    timeout: higher.timeout.or(lower.timeout),
                    default_ttl: higher.default_ttl.or(lower.default_ttl),
                    retry_interval: higher.retry_interval.or(lower.retry_interval),
                    cache_path: higher.cache_path.or(lower.cache_path),
                }),
                (lower, higher) => higher.or(lower),
            },
            defaults: match (lower.defaults, higher.defaults) {
                (Some(lower), Some(higher)) => Some(DefaultsConfig {
                    tlds: higher.tlds.or(lower.tlds),
                    only_available: higher.only_available.or(lower.only_available),
                }),
                (lower, higher) => higher.or(lower),
            },
        }
    }

    /// Validate a configuration for common issues.
    pub fn validate_config(&self, config: &FileConfig) -> Result<(), CheckError> {
        if let Some(rdap) = &config.rdap {
            if let Some(retries) = rdap.max_retries {
                validate_retries(retries)?;
            }
            if let Some(max) = rdap.max_concurrent_per_host {
                validate_concurrency(max)?;
            }
            validate_duration_field("rdap.timeout", rdap.timeout.as_deref())?;
            validate_duration_field("rdap.min_delay_per_host", rdap.min_delay_per_host.as_deref())?;
        }

        if let Some(bootstrap) = &config.bootstrap {
            if let Some(url) = &bootstrap.url {
                validate_url(url)?;
            }
            validate_duration_field("bootstrap.timeout", bootstrap.timeout.as_deref())?;
            validate_duration_field("bootstrap.default_ttl", bootstrap.default_ttl.as_deref())?;
            validate_duration_field(
                "bootstrap.retry_interval",
                bootstrap.retry_interval.as_deref(),
            )?;
        }

        if let Some(tlds) = config.defaults.as_ref().and_then(|d| d.tlds.as_ref()) {
            if tlds.is_empty() {
                return Err(CheckError::config("defaults.tlds cannot be an empty list"));
            }
            for tld in tlds {
                validate_tld(tld)?;
            }
        }

        Ok(())
    }
}

pub fn validate_retries(retries: u32) -> Result<(), CheckError> {
    if !(1..=10).contains(&retries) {
        return Err(CheckError::config("max_retries must be between 1 and 10"));
    }
    Ok(())
}

pub fn validate_concurrency(max: usize) -> Result<(), CheckError> {
    if !(1..=50).contains(&max) {
        return Err(CheckError::config(
            "max_concurrent_per_host must be between 1 and 50",
        ));
    }
    Ok(())
}

fn validate_url(url: &str) -> Result<(), CheckError> {
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(CheckError::config(format!(
            "Invalid bootstrap URL '{}': must start with http:// or https://",
            url
        )))
    }
}

fn validate_tld(tld: &str) -> Result<(), CheckError> {
    let tld = tld.trim_start_matches('.');
    if tld.is_empty() || !tld.chars().all(|c| c.is_alphanumeric() || c == '-') {
        return Err(CheckError::config(format!("Invalid TLD '{}'", tld)));
    }
    Ok(())
}

fn validate_duration_field(field: &str, value: Option<&str>) -> Result<(), CheckError> {
    match value {
        Some(text) if parse_duration_string(text).is_none() => Err(CheckError::config(format!(
            "Invalid duration '{}' for {}. Use a format like '500ms', '10s', '2m'",
            text, field
        ))),
        _ => Ok(()),
    }
}

/// Environment variable configuration that mirrors CLI options.
///
/// Values come from `INAMES_*` variables; each is already validated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub max_concurrent: Option<usize>,
    pub min_delay: Option<Duration>,
    pub bootstrap_url: Option<String>,
    pub cache_path: Option<PathBuf>,
    pub tlds: Option<Vec<String>>,
}

impl EnvConfig {
    /// Overlay the values set in the environment onto `config`.
    pub fn apply_to(&self, mut config: RdapConfig) -> RdapConfig {
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        if let Some(retries) = self.max_retries {
            config = config.with_max_retries(retries);
        }
        if let Some(max) = self.max_concurrent {
            config = config.with_max_concurrent_per_host(max);
        }
        if let Some(delay) = self.min_delay {
            config = config.with_min_delay_per_host(delay);
        }
        if let Some(url) = &self.bootstrap_url {
            config = config.with_bootstrap_url(url.clone());
        }
        if let Some(path) = &self.cache_path {
            config = config.with_cache_path(path.clone());
        }
        config
    }
}

/// Load configuration from `INAMES_*` environment variables.
///
/// Invalid values are logged as warnings and ignored.
pub fn load_env_config() -> EnvConfig {
    load_env_config_from(|name| env::var(name).ok())
}

/// Same as [`load_env_config`] with an explicit variable lookup.
pub fn load_env_config_from<F>(lookup: F) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut env_config = EnvConfig::default();
    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(val) = var("INAMES_TIMEOUT") {
        match parse_duration_string(&val) {
            Some(timeout) => env_config.timeout = Some(timeout),
            None => warn!("Invalid INAMES_TIMEOUT='{}', use a format like '10s'", val),
        }
    }

    if let Some(val) = var("INAMES_MAX_RETRIES") {
        match val.trim().parse::<u32>() {
            Ok(retries) if validate_retries(retries).is_ok() => {
                env_config.max_retries = Some(retries)
            }
            _ => warn!("Invalid INAMES_MAX_RETRIES='{}', must be 1-10", val),
        }
    }

    if let Some(val) = var("INAMES_MAX_CONCURRENT") {
        match val.trim().parse::<usize>() {
            Ok(max) if validate_concurrency(max).is_ok() => env_config.max_concurrent = Some(max),
            _ => warn!("Invalid INAMES_MAX_CONCURRENT='{}', must be 1-50", val),
        }
    }

    if let Some(val) = var("INAMES_MIN_DELAY") {
        match parse_duration_string(&val) {
            Some(delay) => env_config.min_delay = Some(delay),
            None => warn!("Invalid INAMES_MIN_DELAY='{}', use a format like '500ms'", val),
        }
    }

    if let Some(val) = var("INAMES_BOOTSTRAP_URL") {
        match validate_url(val.trim()) {
            Ok(()) => env_config.bootstrap_url = Some(val.trim().to_string()),
            Err(e) => warn!("Ignoring INAMES_BOOTSTRAP_URL: {}", e),
        }
    }

    if let Some(val) = var("INAMES_CACHE_PATH") {
        env_config.cache_path = Some(PathBuf::from(val.trim()));
    }

    // INAMES_TLDS - comma-separated TLD list
    if let Some(val) = var("INAMES_TLDS") {
        let tlds: Vec<String> = val
            .split(',')
            .map(|s| s.trim().trim_start_matches('.').to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !tlds.is_empty() {
            env_config.tlds = Some(tlds);
        }
    }

    debug!(?env_config, "environment configuration");
    env_config
}

/// Parse a duration like "500ms", "10s", "2m" or "1h". A bare number is
/// seconds.
pub fn parse_duration_string(text: &str) -> Option<Duration> {
    let text = text.trim().to_lowercase();

    let (number, unit_ms) = if let Some(n) = text.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = text.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = text.strip_suffix('m') {
        (n, 60_000)
    } else if let Some(n) = text.strip_suffix('h') {
        (n, 3_600_000)
    } else {
        (text.as_str(), 1_000)
    };

    number
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(unit_ms))
        .map(Duration::from_millis)
}

/// Default location of the bootstrap cache file.
///
/// `$XDG_CACHE_HOME`, then `%APPDATA%` on Windows, then `~/.cache`, falling
/// back to the system temp directory.
pub fn default_cache_path() -> PathBuf {
    let base = env::var_os("XDG_CACHE_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            if cfg!(windows) {
                env::var_os("APPDATA").map(PathBuf::from)
            } else {
                None
            }
        })
        .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".cache")))
        .unwrap_or_else(env::temp_dir);

    base.join(APP_DIR).join(CACHE_FILE)
}
