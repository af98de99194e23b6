//! DNS resolution with per-address classification.
//!
//! Resolution goes through the [`Resolver`] trait so callers can substitute
//! their own lookup. [`SystemResolver`] uses the host's resolver
//! configuration. Results are never cached between calls.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::LookupIpStrategy;
use hickory_resolver::TokioResolver;
use thiserror::Error;

use crate::classify::{classify, Classification};

/// Why a hostname could not be resolved. Always a rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("DNS lookup for {host} failed: {message}")]
    Lookup { host: String, message: String },

    #[error("DNS lookup for {host} timed out after {timeout:?}")]
    Timeout { host: String, timeout: Duration },

    #[error("DNS lookup for {host} returned no addresses")]
    NoAddresses { host: String },
}

impl ResolveError {
    pub fn lookup(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Lookup {
            host: host.into(),
            message: message.into(),
        }
    }
}

/// Source of hostname → address answers.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Return every IPv4 and IPv6 address for `host`.
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError>;
}

/// Resolver backed by the system configuration (`/etc/resolv.conf`, hosts file).
///
/// A fresh resolver is built for each lookup, so no answer outlives the call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        let mut builder =
            TokioResolver::builder_tokio().map_err(|e| ResolveError::lookup(host, e.to_string()))?;
        builder.options_mut().ip_strategy = LookupIpStrategy::Ipv4AndIpv6;
        let resolver = builder.build();

        let response = resolver
            .lookup_ip(host)
            .await
            .map_err(|e| ResolveError::lookup(host, e.to_string()))?;

        Ok(response.iter().collect())
    }
}

/// Fixed host → addresses table. Unknown hosts fail like NXDOMAIN.
///
/// Useful for tests and for deployments that pin a small set of upstreams.
///
/// ```
/// use coverguard::StaticResolver;
///
/// let resolver = StaticResolver::new()
///     .with_host("covers.example.org", &["93.184.216.34".parse().unwrap()]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the answer for `host`. Matching is case-insensitive.
    pub fn with_host(mut self, host: &str, addrs: &[IpAddr]) -> Self {
        self.hosts.insert(host.to_lowercase(), addrs.to_vec());
        self
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        self.hosts
            .get(&host.to_lowercase())
            .cloned()
            .ok_or_else(|| ResolveError::lookup(host, "no record found"))
    }
}

/// Resolve `host` and classify every address it resolves to.
///
/// The lookup is bounded by `timeout`. Dropping the returned future cancels
/// it. The caller decides what to do with non-public entries; a hostname is
/// only acceptable if every entry is [`Classification::Public`].
///
/// # Errors
///
/// Resolver failure, timeout and an empty answer are all errors.
pub async fn resolve_and_classify(
    resolver: &dyn Resolver,
    host: &str,
    timeout: Duration,
) -> Result<Vec<(IpAddr, Classification)>, ResolveError> {
    let addrs = tokio::time::timeout(timeout, resolver.lookup(host))
        .await
        .map_err(|_| ResolveError::Timeout {
            host: host.to_string(),
            timeout,
        })??;

    if addrs.is_empty() {
        return Err(ResolveError::NoAddresses {
            host: host.to_string(),
        });
    }

    tracing::trace!(host, ?addrs, "resolved");

    Ok(addrs.into_iter().map(|ip| (ip, classify(ip))).collect())
}
