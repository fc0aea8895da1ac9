//! Network-facing components used to resolve domain availability.
//!
//! This module contains the HTTP transport seam, the RDAP bootstrap cache
//! that maps TLDs to registry servers, and the RDAP client itself.

/// RDAP bootstrap registry (TLD -> server) with disk cache
pub mod bootstrap;

/// RDAP query client
pub mod rdap;

/// HTTP transport abstraction
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use bootstrap::{BootstrapCache, BootstrapSnapshot};
pub use rdap::{parse_retry_after, RdapClient};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
