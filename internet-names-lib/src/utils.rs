//! Utility functions for domain name handling.
//!
//! Helpers shared by the bootstrap lookup, the RDAP client and the
//! name-expansion front end.

use std::collections::HashSet;

/// TLDs a bare name is combined with when the caller gives none.
pub const DEFAULT_TLDS: &[&str] = &["com", "io", "ai", "co", "app", "dev", "net", "org"];

/// Return the lower-cased text after the last dot, or `""` if there is none.
///
/// Only single-label TLDs are recognised: `example.co.uk` yields `uk`, which
/// is how the RDAP bootstrap registry keys its entries.
pub fn extract_tld(domain: &str) -> String {
    domain
        .rsplit_once('.')
        .map(|(_, tld)| tld.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Ensure an RDAP base URL ends with `/` so paths can be appended.
pub fn normalize_base_url(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

/// Truncate to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Expand user input into the list of fully-qualified names to check.
///
/// - Entries are trimmed and empty ones skipped
/// - Entries containing a dot are taken as full domains
/// - Bare names are combined with every TLD in `tlds` (or [`DEFAULT_TLDS`])
/// - Duplicates are dropped, keeping the first occurrence
pub fn expand_names<S: AsRef<str>>(names: &[S], tlds: Option<&[String]>) -> Vec<String> {
    let tlds: Vec<&str> = match tlds {
        Some(list) => list
            .iter()
            .map(|t| t.trim().trim_start_matches('.'))
            .filter(|t| !t.is_empty())
            .collect(),
        None => DEFAULT_TLDS.to_vec(),
    };

    let mut results: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut push = |domain: String| {
        if seen.insert(domain.clone()) {
            results.push(domain);
        }
    };

    for name in names {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.contains('.') {
            push(trimmed.to_string());
        } else {
            for tld in &tlds {
                push(format!("{}.{}", trimmed, tld));
            }
        }
    }

    results
}
