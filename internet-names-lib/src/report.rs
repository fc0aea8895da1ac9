//! Aggregated view over a batch of [`DomainResult`]s.
//!
//! Groups results by outcome so front ends can print or serialize one
//! document per run. Transient errors are kept apart from unavailable names.

use crate::types::{DomainResult, DomainStatus};
use serde::Serialize;
use std::time::Duration;

/// One available name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailableEntry {
    pub domain: String,
}

/// A check that ended without a definitive answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportError {
    pub domain: String,
    /// Stable error type (`timeout`, `rate_limit`, `network`, `http_error`)
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "crate::types::optional_secs"
    )]
    pub retry_after: Option<Duration>,
}

/// A name whose TLD has no RDAP server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnsupportedEntry {
    pub domain: String,
    pub tld: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub checked: usize,
    pub available: usize,
    pub unavailable: usize,
    pub errors: usize,
    pub unsupported: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortest_available: Option<AvailableEntry>,
}

/// Results of one batch, grouped by outcome.
///
/// With `only_available` the `unavailable`, `errors` and `unsupported` lists
/// are left out of the serialized form; the summary still counts them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AvailabilityReport {
    pub available: Vec<AvailableEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ReportError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsupported: Option<Vec<UnsupportedEntry>>,
    pub summary: ReportSummary,
}

impl AvailabilityReport {
    pub fn from_results(results: &[DomainResult], only_available: bool) -> Self {
        let mut available = Vec::new();
        let mut unavailable = Vec::new();
        let mut errors = Vec::new();
        let mut unsupported = Vec::new();

        for result in results {
            match &result.status {
                DomainStatus::Available => available.push(AvailableEntry {
                    domain: result.domain.clone(),
                }),
                DomainStatus::Unavailable => unavailable.push(result.domain.clone()),
                DomainStatus::Error {
                    error_type,
                    error_message,
                    retry_after,
                } => errors.push(ReportError {
                    domain: result.domain.clone(),
                    error: error_type.as_str(),
                    message: error_message.clone(),
                    retry_after: *retry_after,
                }),
                DomainStatus::Unsupported { tld } => unsupported.push(UnsupportedEntry {
                    domain: result.domain.clone(),
                    tld: tld.clone(),
                }),
            }
        }

        // First of the shortest wins on ties.
        let shortest_available = available
            .iter()
            .min_by_key(|entry| entry.domain.chars().count())
            .cloned();

        let summary = ReportSummary {
            checked: results.len(),
            available: available.len(),
            unavailable: unavailable.len(),
            errors: errors.len(),
            unsupported: unsupported.len(),
            shortest_available,
        };

        if only_available {
            return Self {
                available,
                summary,
                ..Default::default()
            };
        }

        Self {
            available,
            unavailable: Some(unavailable),
            errors: (!errors.is_empty()).then_some(errors),
            unsupported: (!unsupported.is_empty()).then_some(unsupported),
            summary,
        }
    }

    /// Names that can be registered, in check order.
    pub fn available_domains(&self) -> impl Iterator<Item = &str> {
        self.available.iter().map(|entry| entry.domain.as_str())
    }

    /// True if any check failed transiently and is worth retrying.
    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0
    }
}
