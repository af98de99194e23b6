//! Validation options and their builder.
//!
//! ## Immutability
//!
//! Once built via [`OptionsBuilder::build()`], [`Options`] cannot be modified.
//! Build them once at start-up and share them between requests.
//!
//! ## Tightening only
//!
//! Options can add schemes, hostnames and CIDR ranges to what is blocked, but
//! nothing here can re-allow an address the built-in tables reject:
//!
//! ```rust
//! use coverguard::Options;
//!
//! let options = Options::builder()
//!     .allowed_schemes(["https"])
//!     .block_host("*.corp.example.com")
//!     .block_cidr("203.0.113.0/24")
//!     .build()
//!     .unwrap();
//!
//! assert!(options.allowed_schemes().contains("HTTPS"));
//! assert!(!options.allowed_schemes().contains("http"));
//! ```

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::time::Duration;

use ipnet::IpNet;
use thiserror::Error;

use crate::blocklist::matches_hostname_pattern;

/// Default bound on a single DNS resolution.
pub const DEFAULT_DNS_TIMEOUT: Duration = Duration::from_secs(5);

/// Default maximum accepted URL length, in bytes.
pub const DEFAULT_MAX_URL_LEN: usize = 8192;

/// Set of URL schemes a caller is willing to fetch. Case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedSchemes(BTreeSet<String>);

impl AllowedSchemes {
    /// Build a set from any list of scheme names.
    pub fn new<I, S>(schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            schemes
                .into_iter()
                .map(|s| s.as_ref().to_ascii_lowercase())
                .collect(),
        )
    }

    /// `{http, https}`.
    pub fn http_and_https() -> Self {
        Self::new(["http", "https"])
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.0.contains(&scheme.to_ascii_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for AllowedSchemes {
    fn default() -> Self {
        Self::http_and_https()
    }
}

impl<S: AsRef<str>> FromIterator<S> for AllowedSchemes {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Errors from [`OptionsBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    #[error("invalid CIDR '{cidr}': {message}")]
    InvalidCidr { cidr: String, message: String },

    #[error("at least one scheme must be allowed")]
    NoSchemes,

    #[error("DNS timeout must be greater than zero")]
    ZeroTimeout,
}

/// Immutable validation settings.
///
/// The default allows `http` and `https`, bounds DNS resolution to five
/// seconds and adds no extra block rules.
#[derive(Debug, Clone)]
pub struct Options {
    allowed_schemes: AllowedSchemes,
    dns_timeout: Duration,
    max_url_len: usize,
    blocked_hosts: Vec<String>,
    blocked_cidrs: Vec<IpNet>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            allowed_schemes: AllowedSchemes::default(),
            dns_timeout: DEFAULT_DNS_TIMEOUT,
            max_url_len: DEFAULT_MAX_URL_LEN,
            blocked_hosts: Vec::new(),
            blocked_cidrs: Vec::new(),
        }
    }
}

impl Options {
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    pub fn allowed_schemes(&self) -> &AllowedSchemes {
        &self.allowed_schemes
    }

    pub fn dns_timeout(&self) -> Duration {
        self.dns_timeout
    }

    pub fn max_url_len(&self) -> usize {
        self.max_url_len
    }

    /// Return the configured pattern a (normalized) hostname matches, if any.
    pub(crate) fn blocked_host_rule(&self, host: &str) -> Option<&str> {
        self.blocked_hosts
            .iter()
            .find(|pattern| matches_hostname_pattern(host, pattern))
            .map(String::as_str)
    }

    /// Return the configured CIDR an address falls into, if any.
    ///
    /// IPv4-mapped IPv6 addresses are also checked against IPv4 ranges.
    pub(crate) fn blocked_cidr(&self, ip: IpAddr) -> Option<&IpNet> {
        let mapped = match ip {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4),
            IpAddr::V4(_) => None,
        };

        self.blocked_cidrs
            .iter()
            .find(|net| net.contains(&ip) || mapped.is_some_and(|v4| net.contains(&v4)))
    }
}

/// Builder for [`Options`]. Each method consumes `self`.
#[derive(Debug, Clone)]
pub struct OptionsBuilder {
    allowed_schemes: AllowedSchemes,
    dns_timeout: Duration,
    max_url_len: usize,
    blocked_hosts: Vec<String>,
    blocked_cidrs: Vec<String>,
}

impl Default for OptionsBuilder {
    fn default() -> Self {
        Self {
            allowed_schemes: AllowedSchemes::default(),
            dns_timeout: DEFAULT_DNS_TIMEOUT,
            max_url_len: DEFAULT_MAX_URL_LEN,
            blocked_hosts: Vec::new(),
            blocked_cidrs: Vec::new(),
        }
    }
}

impl OptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the allowed schemes.
    pub fn allowed_schemes<I, S>(mut self, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_schemes = AllowedSchemes::new(schemes);
        self
    }

    /// Bound on each DNS resolution. Expiry is a rejection.
    pub fn dns_timeout(mut self, timeout: Duration) -> Self {
        self.dns_timeout = timeout;
        self
    }

    /// Longer input is rejected without being parsed.
    pub fn max_url_len(mut self, len: usize) -> Self {
        self.max_url_len = len;
        self
    }

    /// Block a hostname or pattern in addition to the built-in list.
    ///
    /// Supports wildcards: `*.internal.example.com`
    pub fn block_host(mut self, pattern: &str) -> Self {
        self.blocked_hosts.push(pattern.to_lowercase());
        self
    }

    /// Block an IP range (CIDR notation) in addition to the built-in tables.
    pub fn block_cidr(mut self, cidr: &str) -> Self {
        self.blocked_cidrs.push(cidr.to_string());
        self
    }

    /// Build the options.
    ///
    /// # Errors
    ///
    /// Fails on an unparseable CIDR, an empty scheme set or a zero timeout.
    pub fn build(self) -> Result<Options, OptionsError> {
        if self.allowed_schemes.is_empty() {
            return Err(OptionsError::NoSchemes);
        }
        if self.dns_timeout.is_zero() {
            return Err(OptionsError::ZeroTimeout);
        }

        let blocked_cidrs = self
            .blocked_cidrs
            .iter()
            .map(|cidr| {
                cidr.parse::<IpNet>()
                    .map(|net| net.trunc())
                    .map_err(|e| OptionsError::InvalidCidr {
                        cidr: cidr.clone(),
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Options {
            allowed_schemes: self.allowed_schemes,
            dns_timeout: self.dns_timeout,
            max_url_len: self.max_url_len,
            blocked_hosts: self.blocked_hosts,
            blocked_cidrs,
        })
    }
}
