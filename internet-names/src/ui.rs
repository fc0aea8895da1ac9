//! Human-readable display logic for the internet-names CLI.
//!
//! Colored result lines, progress counters, headers, summaries and the
//! spinner shown while the bootstrap registry downloads. Uses only the
//! `console` crate.

use console::{pad_str, style, Alignment, Term};
use internet_names_lib::{DomainResult, DomainStatus, ErrorKind, RdapConfig, ReportSummary};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ── Spinner ──────────────────────────────────────────────────────────────────

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// An async braille-dot spinner that writes to stderr so stdout stays clean.
///
/// Does nothing when stderr is not a terminal.
pub struct Spinner {
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl Spinner {
    pub fn start(message: String) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let term = Term::stderr();
        if !term.is_term() {
            return Self {
                running,
                handle: None,
            };
        }

        let running_clone = running.clone();
        let handle = tokio::spawn(async move {
            let mut idx = 0usize;
            while running_clone.load(Ordering::Relaxed) {
                let frame = SPINNER_FRAMES[idx % SPINNER_FRAMES.len()];
                let _ = term.clear_line();
                let _ = term.write_str(&format!("{} {}", style(frame).cyan(), message));
                idx += 1;
                tokio::time::sleep(Duration::from_millis(80)).await;
            }
            let _ = term.clear_line();
        });

        Self {
            running,
            handle: Some(handle),
        }
    }

    /// Stop the spinner and clear the line.
    pub async fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.await;
        }
    }
}

// ── Header ───────────────────────────────────────────────────────────────────

pub fn print_header(domain_count: usize, config: &RdapConfig) {
    println!(
        "{} {} {}",
        style("internet-names").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!(
            "· checking {} domain{}",
            domain_count,
            plural(domain_count)
        ))
        .dim(),
    );
    println!(
        "{}",
        style(format!(
            "{} per registry | {}ms spacing | {} attempt{}",
            config.max_concurrent_per_host,
            config.min_delay_per_host.as_millis(),
            config.max_retries,
            plural(config.max_retries as usize),
        ))
        .dim()
    );
    println!();
}

// ── Single result line ───────────────────────────────────────────────────────

/// Print one result with colors and alignment.
///
/// If `counter` is Some((current, total)), a progress prefix like `[3/8]` is shown.
pub fn print_result(result: &DomainResult, counter: Option<(usize, usize)>) {
    let padded_domain = pad_str(&result.domain, 30, Alignment::Left, Some(".."));
    let prefix = match counter {
        Some((cur, total)) => format!("{} ", style(format!("[{}/{}]", cur, total)).dim()),
        None => String::new(),
    };

    let verdict = match &result.status {
        DomainStatus::Available => style("AVAILABLE").green().bold().to_string(),
        DomainStatus::Unavailable => style("TAKEN").red().bold().to_string(),
        DomainStatus::Error { .. } => format!(
            "{}  {}",
            style("UNKNOWN").yellow(),
            style(brief_error(result)).dim()
        ),
        DomainStatus::Unsupported { tld } => format!(
            "{}  {}",
            style("UNSUPPORTED").magenta(),
            style(format!("(no RDAP server for .{})", tld)).dim()
        ),
    };

    println!("  {}{}  {}", prefix, style(&padded_domain).white(), verdict);
}

// ── Summary ──────────────────────────────────────────────────────────────────

pub fn print_summary(summary: &ReportSummary, duration: Duration) {
    println!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    println!(
        "  {} domain{} in {:.1}s  {}  {}  {}  {}  {}  {}",
        style(summary.checked).bold(),
        plural(summary.checked),
        duration.as_secs_f64(),
        style("|").dim(),
        style(format!("{} available", summary.available)).green(),
        style("|").dim(),
        style(format!("{} taken", summary.unavailable)).red(),
        style("|").dim(),
        style(format!("{} unknown", summary.errors + summary.unsupported)).yellow(),
    );
    if let Some(shortest) = &summary.shortest_available {
        println!(
            "  {} {}",
            style("Shortest available:").dim(),
            style(&shortest.domain).green().bold()
        );
    }
}

// ── Error summary ────────────────────────────────────────────────────────────

/// Domains that got no definitive answer, by cause.
#[derive(Debug, Default)]
pub struct ErrorStats {
    pub timeouts: Vec<String>,
    pub rate_limited: Vec<String>,
    pub network_errors: Vec<String>,
    pub http_errors: Vec<String>,
    pub unsupported: Vec<String>,
    /// Longest Retry-After seen, if any registry sent one
    pub retry_after: Option<Duration>,
}

impl ErrorStats {
    pub fn from_results(results: &[DomainResult]) -> Self {
        let mut stats = Self::default();
        for result in results {
            let domain = result.domain.clone();
            match &result.status {
                DomainStatus::Error {
                    error_type,
                    retry_after,
                    ..
                } => {
                    match error_type {
                        ErrorKind::Timeout => stats.timeouts.push(domain),
                        ErrorKind::RateLimit => stats.rate_limited.push(domain),
                        ErrorKind::Network => stats.network_errors.push(domain),
                        ErrorKind::HttpError => stats.http_errors.push(domain),
                    }
                    if let Some(wait) = retry_after {
                        stats.retry_after = stats.retry_after.max(Some(*wait));
                    }
                }
                DomainStatus::Unsupported { .. } => stats.unsupported.push(domain),
                DomainStatus::Available | DomainStatus::Unavailable => {}
            }
        }
        stats
    }

    pub fn has_errors(&self) -> bool {
        !self.timeouts.is_empty()
            || !self.rate_limited.is_empty()
            || !self.network_errors.is_empty()
            || !self.http_errors.is_empty()
            || !self.unsupported.is_empty()
    }
}

pub fn print_error_summary(error_stats: &ErrorStats) {
    if !error_stats.has_errors() {
        return;
    }

    println!(
        "  {}",
        style("Some domains could not be checked:").yellow()
    );

    let rows: [(&str, &Vec<String>); 5] = [
        ("timeout", &error_stats.timeouts),
        ("rate limited", &error_stats.rate_limited),
        ("network error", &error_stats.network_errors),
        ("registry error", &error_stats.http_errors),
        ("unsupported TLD", &error_stats.unsupported),
    ];
    for (label, domains) in rows {
        if !domains.is_empty() {
            println!(
                "  {} {} {}: {}",
                style("•").dim(),
                domains.len(),
                label,
                format_list(domains, 5),
            );
        }
    }

    if let Some(wait) = error_stats.retry_after {
        println!(
            "  {} {}",
            style("•").dim(),
            style(format!("Registry asked to retry after {:.0}s", wait.as_secs_f64())).dim(),
        );
    }
}

// ── Bootstrap commands ───────────────────────────────────────────────────────

pub fn print_tld_list(tlds: &[String]) {
    if tlds.is_empty() {
        println!("{}", style("No RDAP bootstrap data available").yellow());
        return;
    }
    println!(
        "{}",
        style(format!("{} TLDs with an RDAP server:", tlds.len())).bold()
    );
    for chunk in tlds.chunks(10) {
        println!("  {}", chunk.join(" "));
    }
}

pub fn print_support(tld: &str, supported: bool) {
    if supported {
        println!(".{} {}", tld, style("is supported").green());
    } else {
        println!(".{} {}", tld, style("has no known RDAP server").yellow());
    }
}

pub fn print_refresh(updated: bool, count: usize, path: &str) {
    let note = if updated {
        "updated"
    } else {
        "unchanged"
    };
    println!(
        "{} {} TLDs cached at {} ({})",
        style("✓").green().bold(),
        count,
        style(path).dim(),
        note
    );
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn format_list(domains: &[String], max_show: usize) -> String {
    if domains.len() <= max_show {
        domains.join(", ")
    } else {
        let shown = &domains[..max_show];
        let remaining = domains.len() - max_show;
        format!("{}, ... and {} more", shown.join(", "), remaining)
    }
}

/// A brief reason for a result without a definitive answer.
fn brief_error(result: &DomainResult) -> String {
    match (&result.status, result.retry_after()) {
        (DomainStatus::Error { error_type: ErrorKind::RateLimit, .. }, Some(wait)) => {
            format!("(rate limited, retry in {:.0}s)", wait.as_secs_f64())
        }
        (DomainStatus::Error { error_type, .. }, _) => match error_type {
            ErrorKind::Timeout => "(timeout)".to_string(),
            ErrorKind::RateLimit => "(rate limited)".to_string(),
            ErrorKind::Network => "(network error)".to_string(),
            ErrorKind::HttpError => result
                .error_message()
                .map(|m| format!("({})", m))
                .unwrap_or_else(|| "(registry error)".to_string()),
        },
        _ => "(unknown status)".to_string(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
