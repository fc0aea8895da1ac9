//! HTTP transport used by the bootstrap cache and the RDAP client.
//!
//! Both components talk to the network only through [`HttpTransport`], which
//! is handed to them at construction. Production code uses
//! [`ReqwestTransport`]; tests substitute a scripted implementation.

use crate::error::CheckError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// A GET request with optional extra headers and timeout override.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get<U: Into<String>>(url: U) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Look up a request header (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status, headers and body of a completed request.
///
/// Header names are stored lower-cased.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn with_header<K: AsRef<str>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body<B: Into<String>>(mut self, body: B) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a response header (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Minimal async HTTP GET abstraction.
///
/// Implementations must report an exceeded timeout as
/// [`CheckError::Timeout`] and any other connection-level failure as
/// [`CheckError::Network`]; HTTP error statuses are *not* errors.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, CheckError>;
}

/// [`HttpTransport`] backed by a pooled `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Build a client with a default request timeout and User-Agent.
    ///
    /// Connections are pooled and reused per host by reqwest.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, CheckError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .pool_max_idle_per_host(20)
            .build()
            .map_err(|e| {
                CheckError::network_with_source("Failed to create HTTP client", e.to_string())
            })?;

        Ok(Self { client, timeout })
    }

    fn map_error(&self, err: reqwest::Error, url: &str, timeout: Duration) -> CheckError {
        if err.is_timeout() {
            CheckError::timeout(format!("GET {}", url), timeout)
        } else {
            CheckError::from(err)
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, CheckError> {
        let timeout = request.timeout.unwrap_or(self.timeout);
        let mut builder = self.client.get(&request.url).timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.map_error(e, &request.url, timeout))?;

        let mut result = HttpResponse::new(response.status().as_u16());
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                result = result.with_header(name.as_str(), value);
            }
        }

        result.body = response
            .text()
            .await
            .map_err(|e| self.map_error(e, &request.url, timeout))?;

        Ok(result)
    }
}
