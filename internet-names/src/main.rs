//! Internet Names CLI Application
//!
//! A command-line interface for checking domain availability over RDAP.
//! This CLI application provides a user-friendly interface to the internet-names-lib library.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::error::ErrorKind as ClapErrorKind;
use clap::Parser;
use futures_util::StreamExt;
use internet_names_lib::{
    expand_names, load_env_config, parse_duration_string, read_names_file, AvailabilityReport,
    CheckError, ConfigManager, DomainChecker, FileConfig, RdapConfig,
};
use serde_json::json;
use std::path::PathBuf;
use std::process;
use std::time::{Duration, Instant};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for internet-names
#[derive(Parser, Debug)]
#[command(name = "internet-names")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check domain availability over RDAP")]
#[command(
    long_about = "Check domain availability over RDAP, discovering each TLD's registry from the IANA bootstrap.\n\nAnswers are available, taken, or a retryable error: a timeout or rate limit is never reported as taken."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Names to check (bare names are combined with each TLD, FQDNs are checked as-is)
    #[arg(value_name = "NAMES", help_heading = "Domain Selection")]
    pub names: Vec<String>,

    /// TLDs for bare names (comma-separated or multiple -t flags)
    #[arg(short = 't', long = "tld", value_name = "TLD", value_delimiter = ',', action = clap::ArgAction::Append, help_heading = "Domain Selection")]
    pub tlds: Option<Vec<String>>,

    /// Input file with names (one per line, # comments)
    #[arg(
        short = 'f',
        long = "file",
        value_name = "FILE",
        help_heading = "Domain Selection"
    )]
    pub file: Option<PathBuf>,

    /// Output results as a JSON report
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Only report available names
    #[arg(long = "only-available", help_heading = "Output Format")]
    pub only_available: bool,

    /// List every TLD with a known RDAP server and exit
    #[arg(long = "list-tlds", help_heading = "Bootstrap")]
    pub list_tlds: bool,

    /// Report whether a TLD has a known RDAP server and exit
    #[arg(long = "supports", value_name = "TLD", help_heading = "Bootstrap")]
    pub supports: Option<String>,

    /// Refresh the cached IANA bootstrap registry and exit
    #[arg(long = "refresh-bootstrap", help_heading = "Bootstrap")]
    pub refresh_bootstrap: bool,

    /// With --refresh-bootstrap, fetch even if the cache is fresh
    #[arg(long = "force", requires = "refresh_bootstrap", help_heading = "Bootstrap")]
    pub force: bool,

    /// Bootstrap document URL
    #[arg(long = "bootstrap-url", value_name = "URL", help_heading = "Bootstrap")]
    pub bootstrap_url: Option<String>,

    /// Bootstrap cache file
    #[arg(long = "cache-path", value_name = "FILE", help_heading = "Bootstrap")]
    pub cache_path: Option<PathBuf>,

    /// Per-request timeout (e.g. 10s, 1500ms)
    #[arg(long = "timeout", value_name = "DURATION", value_parser = parse_duration_arg, help_heading = "Performance")]
    pub timeout: Option<Duration>,

    /// Attempts per domain (1-10)
    #[arg(long = "retries", value_name = "N", value_parser = clap::value_parser!(u32).range(1..=10), help_heading = "Performance")]
    pub retries: Option<u32>,

    /// Requests in flight per registry host (1-50)
    #[arg(long = "max-concurrent", value_name = "N", value_parser = clap::value_parser!(u32).range(1..=50), help_heading = "Performance")]
    pub max_concurrent: Option<u32>,

    /// Minimum spacing between requests to one registry host (e.g. 500ms)
    #[arg(long = "min-delay", value_name = "DURATION", value_parser = parse_duration_arg, help_heading = "Performance")]
    pub min_delay: Option<Duration>,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<PathBuf>,

    /// Verbose logging (RUST_LOG overrides)
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

fn parse_duration_arg(value: &str) -> Result<Duration, String> {
    parse_duration_string(value)
        .ok_or_else(|| format!("invalid duration '{}', use a format like '500ms', '10s', '2m'", value))
}

/// Settings that shape the run but not the resolution core.
#[derive(Debug, Default)]
struct RunSettings {
    tlds: Option<Vec<String>>,
    only_available: bool,
}

#[tokio::main]
async fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                process::exit(1);
            }
        },
    };

    init_tracing(args.verbose);

    // Validate arguments
    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Log to stderr so stdout stays parseable.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "internet_names=debug,internet_names_lib=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    let standalone = args.list_tlds || args.supports.is_some() || args.refresh_bootstrap;

    let modes = [args.list_tlds, args.supports.is_some(), args.refresh_bootstrap]
        .iter()
        .filter(|&&x| x)
        .count();
    if modes > 1 {
        return Err(
            "Use only one of --list-tlds, --supports, --refresh-bootstrap".to_string(),
        );
    }

    if !standalone && args.names.is_empty() && args.file.is_none() {
        return Err("You must specify names to check or a file with --file".to_string());
    }

    if let Some(url) = &args.bootstrap_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(format!(
                "Invalid --bootstrap-url '{}': must start with http:// or https://",
                url
            ));
        }
    }

    Ok(())
}

/// Build the effective configuration: defaults < config files < environment < flags.
fn build_config(args: &Args) -> Result<(RdapConfig, RunSettings), CheckError> {
    let manager = ConfigManager::new(args.verbose);
    let file_config: FileConfig = match &args.config {
        Some(path) => manager.load_file(path)?,
        None => manager.discover_and_load()?,
    };
    let env_config = load_env_config();

    let mut config = env_config.apply_to(file_config.apply_to(RdapConfig::default()));
    let mut settings = RunSettings {
        tlds: file_config.defaults.as_ref().and_then(|d| d.tlds.clone()),
        only_available: file_config
            .defaults
            .as_ref()
            .and_then(|d| d.only_available)
            .unwrap_or(false),
    };
    if env_config.tlds.is_some() {
        settings.tlds = env_config.tlds.clone();
    }

    if let Some(timeout) = args.timeout {
        config = config.with_timeout(timeout);
    }
    if let Some(retries) = args.retries {
        config = config.with_max_retries(retries);
    }
    if let Some(max) = args.max_concurrent {
        config = config.with_max_concurrent_per_host(max as usize);
    }
    if let Some(delay) = args.min_delay {
        config = config.with_min_delay_per_host(delay);
    }
    if let Some(url) = &args.bootstrap_url {
        config = config.with_bootstrap_url(url.clone());
    }
    if let Some(path) = &args.cache_path {
        config = config.with_cache_path(path.clone());
    }
    if let Some(tlds) = &args.tlds {
        settings.tlds = Some(tlds.clone());
    }
    if args.only_available {
        settings.only_available = true;
    }

    debug!(?config, ?settings, "effective configuration");
    Ok((config, settings))
}

async fn run(args: Args) -> Result<(), CheckError> {
    let (config, settings) = build_config(&args)?;
    let checker = DomainChecker::new(config)?;

    if args.refresh_bootstrap {
        return run_refresh(&checker, &args).await;
    }
    if args.list_tlds {
        let tlds = checker.list_supported_tlds().await;
        if args.json {
            print_json(&json!({ "count": tlds.len(), "tlds": tlds }))?;
        } else {
            ui::print_tld_list(&tlds);
        }
        return Ok(());
    }
    if let Some(tld) = &args.supports {
        let tld = tld.trim().trim_start_matches('.').to_lowercase();
        let supported = checker.is_tld_supported(&tld).await;
        if args.json {
            print_json(&json!({ "tld": tld, "supported": supported }))?;
        } else {
            ui::print_support(&tld, supported);
        }
        return Ok(());
    }

    let mut names = args.names.clone();
    if let Some(file) = &args.file {
        names.extend(read_names_file(file)?);
    }
    let domains = expand_names(&names, settings.tlds.as_deref());
    if domains.is_empty() {
        return Err(CheckError::invalid_domain(
            names.join(" "),
            "No valid domain names after expansion",
        ));
    }

    if args.json {
        let results = checker.check_domains(&domains).await;
        let report = AvailabilityReport::from_results(&results, settings.only_available);
        print_json(&report)
    } else {
        run_streaming_check(&checker, &domains, settings.only_available).await;
        Ok(())
    }
}

async fn run_refresh(checker: &DomainChecker, args: &Args) -> Result<(), CheckError> {
    let spinner = (!args.json).then(|| ui::Spinner::start("Refreshing RDAP bootstrap...".to_string()));
    let updated = checker.refresh_bootstrap(args.force).await;
    if let Some(spinner) = spinner {
        spinner.stop().await;
    }

    let count = checker.cached_tld_count().ok_or_else(|| {
        CheckError::bootstrap(format!(
            "No RDAP bootstrap data available from {}",
            checker.config().bootstrap_url
        ))
    })?;
    let path = checker.bootstrap().path().display().to_string();
    if args.json {
        print_json(&json!({ "updated": updated, "tlds": count, "cachePath": path }))
    } else {
        ui::print_refresh(updated, count, &path);
        Ok(())
    }
}

/// Print results as they complete, then a summary.
async fn run_streaming_check(checker: &DomainChecker, domains: &[String], only_available: bool) {
    ui::print_header(domains.len(), checker.config());

    let start_time = Instant::now();
    let total = domains.len();
    let mut results = Vec::with_capacity(total);

    let mut stream = checker.check_domains_stream(domains);
    while let Some(result) = stream.next().await {
        let counter = (total > 1).then_some((results.len() + 1, total));
        if !only_available || result.is_available() {
            ui::print_result(&result, counter);
        }
        results.push(result);
    }

    if total > 1 {
        let report = AvailabilityReport::from_results(&results, false);
        println!();
        ui::print_summary(&report.summary, start_time.elapsed());
        if report.has_errors() || report.summary.unsupported > 0 {
            println!();
            ui::print_error_summary(&ui::ErrorStats::from_results(&results));
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CheckError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("internet-names").chain(argv.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_requires_names_or_mode() {
        assert!(validate_args(&args(&[])).is_err());
        assert!(validate_args(&args(&["acme"])).is_ok());
        assert!(validate_args(&args(&["--list-tlds"])).is_ok());
        assert!(validate_args(&args(&["--supports", "com"])).is_ok());
        assert!(validate_args(&args(&["--list-tlds", "--refresh-bootstrap"])).is_err());
    }

    #[test]
    fn test_flag_parsing() {
        let parsed = args(&[
            "acme",
            "-t",
            "com,io",
            "-t",
            "dev",
            "--timeout",
            "1500ms",
            "--retries",
            "5",
            "--max-concurrent",
            "4",
        ]);
        assert_eq!(
            parsed.tlds,
            Some(vec!["com".to_string(), "io".to_string(), "dev".to_string()])
        );
        assert_eq!(parsed.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(parsed.retries, Some(5));
        assert_eq!(parsed.max_concurrent, Some(4));
    }

    #[test]
    fn test_out_of_range_flags_rejected() {
        let parse = |argv: &[&str]| {
            Args::try_parse_from(std::iter::once("internet-names").chain(argv.iter().copied()))
        };
        assert!(parse(&["acme", "--retries", "0"]).is_err());
        assert!(parse(&["acme", "--max-concurrent", "51"]).is_err());
        assert!(parse(&["acme", "--timeout", "soon"]).is_err());
        assert!(parse(&["acme", "--force"]).is_err());
    }

    #[test]
    fn test_bad_bootstrap_url() {
        assert!(validate_args(&args(&["acme", "--bootstrap-url", "ftp://x"])).is_err());
    }
}
