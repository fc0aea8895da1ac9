//! Error handling for the resolution core.
//!
//! Domain-level outcomes (taken, available, rate limited, ...) are never errors;
//! they are reported as [`DomainResult`](crate::DomainResult) data. This type
//! covers what can go wrong around them: transport failures, bootstrap and
//! configuration problems, and file I/O.

use std::fmt;
use std::time::Duration;

/// Main error type for the library.
#[derive(Debug, Clone)]
pub enum CheckError {
    /// Invalid domain name format
    InvalidDomain { domain: String, reason: String },

    /// Connection-level failures (DNS, refused, reset, TLS, ...)
    Network {
        message: String,
        source: Option<String>,
    },

    /// A request exceeded its timeout
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// Bootstrap document fetch or lookup failures
    Bootstrap { message: String },

    /// JSON/TOML parsing errors
    Parse { message: String },

    /// Configuration errors (invalid settings, etc.)
    Config { message: String },

    /// File I/O errors for the cache or config files
    File { path: String, message: String },

    /// Anything that doesn't fit above
    Internal { message: String },
}

impl CheckError {
    /// Create a new invalid domain error.
    pub fn invalid_domain<D: Into<String>, R: Into<String>>(domain: D, reason: R) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a new network error.
    pub fn network<M: Into<String>>(message: M) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new bootstrap error.
    pub fn bootstrap<M: Into<String>>(message: M) -> Self {
        Self::Bootstrap {
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::File {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True if this error came from a request running out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this error suggests the operation should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDomain { domain, reason } => {
                write!(f, "Invalid domain '{}': {}", domain, reason)
            }
            Self::Network { message, source } => {
                if let Some(source) = source {
                    write!(f, "Network error: {} ({})", message, source)
                } else {
                    write!(f, "Network error: {}", message)
                }
            }
            Self::Timeout {
                operation,
                duration,
            } => {
                write!(f, "Timeout after {:?} during: {}", duration, operation)
            }
            Self::Bootstrap { message } => write!(f, "Bootstrap error: {}", message),
            Self::Parse { message } => write!(f, "Parse error: {}", message),
            Self::Config { message } => write!(f, "Configuration error: {}", message),
            Self::File { path, message } => write!(f, "File error at '{}': {}", path, message),
            Self::Internal { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for CheckError {}

impl From<reqwest::Error> for CheckError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not report the configured limit; callers that know
            // it build the error themselves.
            Self::timeout("HTTP request", Duration::ZERO)
        } else if err.is_connect() {
            Self::network_with_source("Connection failed", err.to_string())
        } else {
            Self::network_with_source("HTTP request failed", err.to_string())
        }
    }
}

impl From<serde_json::Error> for CheckError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            message: format!("JSON parsing failed: {}", err),
        }
    }
}

impl From<toml::de::Error> for CheckError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config {
            message: format!("Failed to parse TOML configuration: {}", err),
        }
    }
}

impl From<std::io::Error> for CheckError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}
