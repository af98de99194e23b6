//! URL validation with DNS resolution.

use std::net::IpAddr;
use std::sync::Arc;

use tokio::runtime::RuntimeFlavor;
use tracing::{debug, trace};

use crate::blocklist::is_hostname_blocked;
use crate::classify::{classify, Classification};
use crate::error::Error;
use crate::options::Options;
use crate::resolve::{resolve_and_classify, Resolver, SystemResolver};
use crate::safe_url::ParsedUrl;

/// Longest prefix of a rejected URL that is logged.
const LOG_URL_LEN: usize = 256;

/// Validates URLs against a fixed set of [`Options`] and a [`Resolver`].
///
/// Cheap to share: wrap it in an `Arc` or clone it. Calls are independent of
/// each other and nothing is cached between them.
#[derive(Clone)]
pub struct Validator {
    options: Options,
    resolver: Arc<dyn Resolver>,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl Validator {
    /// Validator using the system resolver.
    pub fn new(options: Options) -> Self {
        Self::with_resolver(options, SystemResolver)
    }

    /// Validator using a caller-supplied resolver.
    pub fn with_resolver(options: Options, resolver: impl Resolver + 'static) -> Self {
        Self {
            options,
            resolver: Arc::new(resolver),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Validate a URL, resolve DNS, and check every address.
    ///
    /// Steps, stopping at the first failure:
    /// 1. Parse the URL and check its scheme
    /// 2. Check the hostname against the blocklists
    /// 3. Classify the literal address, or resolve the hostname and classify
    ///    every address it resolves to
    ///
    /// # Errors
    ///
    /// [`Error::InvalidUrl`] for malformed input, a forbidden scheme or a
    /// failed lookup; [`Error::Ssrf`] for a blocked hostname or address.
    pub async fn validate(&self, raw: &str) -> Result<ParsedUrl, Error> {
        let result = self.check(raw).await;
        match &result {
            Ok(parsed) => trace!(
                url = truncate(raw, LOG_URL_LEN),
                host = parsed.host(),
                addrs = ?parsed.addrs(),
                "URL accepted"
            ),
            Err(e) => debug!(url = truncate(raw, LOG_URL_LEN), error = %e, "URL rejected"),
        }
        result
    }

    /// Blocking version of [`Validator::validate`].
    ///
    /// Works inside and outside of a Tokio runtime. Prefer the async version
    /// when possible.
    pub fn validate_sync(&self, raw: &str) -> Result<ParsedUrl, Error> {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(self.validate(raw)))
            }
            // block_in_place panics on a current-thread runtime
            Ok(_) => std::thread::scope(|scope| {
                scope
                    .spawn(|| self.block_on_fresh_runtime(raw))
                    .join()
                    .unwrap_or_else(|_| Err(Error::invalid_url(raw, "validation thread panicked")))
            }),
            Err(_) => self.block_on_fresh_runtime(raw),
        }
    }

    fn block_on_fresh_runtime(&self, raw: &str) -> Result<ParsedUrl, Error> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::invalid_url(raw, format!("failed to start runtime: {}", e)))?;
        rt.block_on(self.validate(raw))
    }

    async fn check(&self, raw: &str) -> Result<ParsedUrl, Error> {
        if raw.len() > self.options.max_url_len() {
            return Err(Error::invalid_url(
                truncate(raw, self.options.max_url_len()),
                format!("URL longer than {} bytes", self.options.max_url_len()),
            ));
        }

        let parsed = ParsedUrl::parse(raw, self.options.allowed_schemes())?;
        let host = parsed.host();

        if let Some(blocked) = is_hostname_blocked(host) {
            return Err(Error::hostname_blocked(
                raw,
                host,
                format!("blocked hostname: {}", blocked),
            ));
        }

        if let Some(rule) = self.options.blocked_host_rule(host) {
            return Err(Error::hostname_blocked(
                raw,
                host,
                format!("blocked hostname: matches rule {}", rule),
            ));
        }

        let addrs = match parsed.literal_ip() {
            Some(ip) => {
                self.check_ip(raw, host, ip, classify(ip))?;
                vec![ip]
            }
            None => {
                let classified =
                    resolve_and_classify(self.resolver.as_ref(), host, self.options.dns_timeout())
                        .await
                        .map_err(|e| Error::invalid_url(raw, e.to_string()))?;

                // one bad address rejects the whole host
                for &(ip, class) in &classified {
                    self.check_ip(raw, host, ip, class)?;
                }
                classified.into_iter().map(|(ip, _)| ip).collect()
            }
        };

        Ok(parsed.with_addrs(addrs))
    }

    fn check_ip(
        &self,
        raw: &str,
        host: &str,
        ip: IpAddr,
        class: Classification,
    ) -> Result<(), Error> {
        if !class.is_public() {
            return Err(Error::ip_blocked(
                raw,
                host,
                ip,
                format!("{} address {} not allowed", class, ip),
            ));
        }

        if let Some(net) = self.options.blocked_cidr(ip) {
            return Err(Error::ip_blocked(
                raw,
                host,
                ip,
                format!("address {} blocked by rule {}", ip, net),
            ));
        }

        Ok(())
    }
}

/// Validate a URL with the system resolver.
///
/// This is the primary entry point for SSRF protection.
///
/// # Example
///
/// ```rust,no_run
/// use coverguard::{validate, Options};
///
/// # async fn example() -> Result<(), coverguard::Error> {
/// let url = validate("https://covers.example.org/b/id/42-L.jpg", &Options::default()).await?;
/// println!("Safe to connect to {} ({:?})", url.host(), url.addrs());
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// See [`Validator::validate`].
pub async fn validate(url: &str, options: &Options) -> Result<ParsedUrl, Error> {
    Validator::new(options.clone()).validate(url).await
}

/// Synchronous version of [`validate`].
///
/// This blocks the current thread while performing DNS resolution.
pub fn validate_sync(url: &str, options: &Options) -> Result<ParsedUrl, Error> {
    Validator::new(options.clone()).validate_sync(url)
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
