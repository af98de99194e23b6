//! URL parsing, scheme gate and hostname normalization.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use url::{Host, Url};

use crate::blocklist::normalize_hostname;
use crate::classify::parse_strict_ipv4;
use crate::options::AllowedSchemes;
use crate::Error;

/// A parsed and normalized URL.
///
/// [`ParsedUrl::parse`] performs the syntactic checks only. A `ParsedUrl`
/// returned by [`validate`](crate::validate) has also passed the hostname
/// blocklist and the address checks, and [`ParsedUrl::addrs`] holds every
/// address that was verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    inner: Url,
    host: String,
    literal_ip: Option<IpAddr>,
    addrs: Vec<IpAddr>,
}

impl ParsedUrl {
    /// Parse and normalize a URL string.
    ///
    /// This performs:
    /// - Scheme validation against `allowed` (case-insensitive)
    /// - Rejection of control characters and surrounding whitespace
    /// - Rejection of userinfo (user:pass@)
    /// - Rejection of non-standard IP formats (octal, decimal, hexadecimal, short-form)
    /// - Hostname normalization (lowercase, no brackets, no trailing dot)
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the URL is malformed or uses a
    /// forbidden scheme.
    pub fn parse(input: &str, allowed: &AllowedSchemes) -> Result<Self, Error> {
        if input.is_empty() {
            return Err(Error::invalid_url(input, "empty URL"));
        }

        // the url crate silently strips these, so the input would be ambiguous
        if input.chars().any(char::is_control) {
            return Err(Error::invalid_url(input, "control characters not allowed"));
        }
        if input.trim() != input {
            return Err(Error::invalid_url(
                input,
                "leading or trailing whitespace not allowed",
            ));
        }

        // Must run on the raw text: Url::parse rewrites these host forms
        reject_non_standard_ip_in_raw_url(input)?;

        let url = Url::parse(input).map_err(|e| Error::invalid_url(input, e.to_string()))?;

        if !allowed.contains(url.scheme()) {
            return Err(Error::invalid_url(
                input,
                format!("scheme '{}' not allowed", url.scheme()),
            ));
        }

        if !url.username().is_empty() || url.password().is_some() {
            return Err(Error::invalid_url(
                input,
                "userinfo (user:pass@) not allowed",
            ));
        }

        let (host, literal_ip) = match url.host() {
            None => return Err(Error::invalid_url(input, "URL must have a host")),
            Some(Host::Ipv4(v4)) => ipv4_host(v4, input)?,
            Some(Host::Ipv6(v6)) => (v6.to_string(), Some(IpAddr::V6(v6))),
            Some(Host::Domain(domain)) => domain_host(domain, input)?,
        };

        if host.is_empty() {
            return Err(Error::invalid_url(input, "empty hostname"));
        }

        Ok(Self {
            inner: url,
            host,
            literal_ip,
            addrs: Vec::new(),
        })
    }

    pub(crate) fn with_addrs(mut self, addrs: Vec<IpAddr>) -> Self {
        self.addrs = addrs;
        self
    }

    /// Lower-case scheme.
    pub fn scheme(&self) -> &str {
        self.inner.scheme()
    }

    /// Normalized hostname: lower case, IPv6 without brackets, no trailing dot.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The address, if the hostname is itself an IP literal.
    pub fn literal_ip(&self) -> Option<IpAddr> {
        self.literal_ip
    }

    /// Explicit port, or the scheme's default (80 for http, 443 for https).
    pub fn port(&self) -> Option<u16> {
        self.inner.port_or_known_default()
    }

    pub fn path(&self) -> &str {
        self.inner.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.inner.query()
    }

    /// Get the full URL as a string.
    pub fn as_str(&self) -> &str {
        self.inner.as_str()
    }

    pub fn is_https(&self) -> bool {
        self.inner.scheme() == "https"
    }

    /// Addresses that passed validation: the literal address, or every
    /// address DNS returned. Empty on a URL that was only parsed.
    ///
    /// Connecting to one of these instead of resolving again closes the
    /// DNS-rebinding window between validation and fetch.
    pub fn addrs(&self) -> &[IpAddr] {
        &self.addrs
    }

    /// [`ParsedUrl::addrs`] paired with the port. Empty if the scheme has no
    /// known default port and none was given.
    pub fn socket_addrs(&self) -> Vec<SocketAddr> {
        match self.port() {
            Some(port) => self
                .addrs
                .iter()
                .map(|&ip| SocketAddr::new(ip, port))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Get the underlying URL.
    pub fn into_url(self) -> Url {
        self.inner
    }
}

/// Normalize a domain host. Hosts of non-special schemes are opaque to the
/// url crate, so numeric text is re-checked here.
fn domain_host(domain: &str, input: &str) -> Result<(String, Option<IpAddr>), Error> {
    let host = normalize_hostname(domain);

    if host.contains(':') {
        let ip = host
            .parse::<IpAddr>()
            .map_err(|_| Error::invalid_url(input, "invalid IPv6 hostname"))?;
        return Ok((host, Some(ip)));
    }

    if !host.is_empty() && host.chars().all(|c| c.is_ascii_digit() || c == '.') {
        let v4 = parse_strict_ipv4(&host)
            .ok_or_else(|| Error::invalid_url(input, "non-standard IPv4 encoding not allowed"))?;
        return Ok((host, Some(IpAddr::V4(v4))));
    }

    Ok((host, None))
}

/// An IPv4 host must be spelled in the input exactly as its dotted quad.
///
/// The url crate maps non-ASCII digits (full-width `０`, ideographic full
/// stops) before reading the host as IPv4, so the raw-text check cannot see
/// octal, hex or short forms written with them.
fn ipv4_host(v4: Ipv4Addr, input: &str) -> Result<(String, Option<IpAddr>), Error> {
    let canonical = v4.to_string();
    let raw = raw_host(input).unwrap_or_default();
    if raw.strip_suffix('.').unwrap_or(&raw) != canonical {
        return Err(Error::invalid_url(
            input,
            "non-standard IPv4 encoding not allowed",
        ));
    }
    Ok((canonical, Some(IpAddr::V4(v4))))
}

/// Reject non-standard IP address formats (octal, decimal, hex) in the raw URL.
/// This must be done BEFORE url::Url::parse because it normalizes these formats.
fn reject_non_standard_ip_in_raw_url(url: &str) -> Result<(), Error> {
    match raw_host(url) {
        Some(host) => check_non_standard_ip(&host, url),
        None => Ok(()),
    }
}

/// Lower-cased host text of the raw URL, port and userinfo removed.
fn raw_host(url: &str) -> Option<String> {
    // Format: scheme:[//][userinfo@]host[:port][/path]
    let url_lower = url.to_lowercase();
    let (_, after_scheme) = url_lower.split_once(':')?;

    // the url crate treats backslashes like slashes and tolerates any number
    let after_slashes = after_scheme.trim_start_matches(['/', '\\']);

    let host_end = after_slashes
        .find(['/', '\\', '?', '#'])
        .unwrap_or(after_slashes.len());

    let authority = &after_slashes[..host_end];

    let host_with_port = authority
        .rfind('@')
        .map(|i| &authority[i + 1..])
        .unwrap_or(authority);

    // Be careful with IPv6 brackets when removing port
    let host = if host_with_port.starts_with('[') {
        host_with_port
            .find(']')
            .map(|i| &host_with_port[..=i])
            .unwrap_or(host_with_port)
    } else {
        host_with_port
            .rfind(':')
            .map(|i| &host_with_port[..i])
            .unwrap_or(host_with_port)
    };

    Some(host.to_string())
}

/// Check if a host string contains non-standard IP encoding.
fn check_non_standard_ip(host: &str, original_url: &str) -> Result<(), Error> {
    if host.starts_with('[') {
        return Ok(());
    }

    if host.contains('%') {
        return Err(Error::invalid_url(
            original_url,
            "percent-encoded hostname not allowed",
        ));
    }

    let host = host.strip_suffix('.').unwrap_or(host);
    let parts: Vec<&str> = host.split('.').collect();

    // the url crate only reads a host as IPv4 when its last label is a number
    let ends_in_number = parts.last().is_some_and(|last| is_numeric_label(last));
    if ends_in_number && parts.iter().any(|part| part.starts_with("0x")) {
        return Err(Error::invalid_url(
            original_url,
            "hexadecimal IP encoding not allowed",
        ));
    }

    let all_numeric = parts
        .iter()
        .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    if !all_numeric || parse_strict_ipv4(host).is_some() {
        return Ok(());
    }

    let reason = match parts.len() {
        // 2130706433 = 127.0.0.1
        1 => "decimal IP encoding not allowed",
        // 127.1 = 127.0.0.1, 127.0.1 = 127.0.0.1
        2 | 3 => "short-form IP encoding not allowed",
        // 0177.0.0.1 = 127.0.0.1
        4 if parts.iter().any(|p| p.len() > 1 && p.starts_with('0')) => {
            "octal IP encoding not allowed"
        }
        _ => "non-standard IPv4 encoding not allowed",
    };
    Err(Error::invalid_url(original_url, reason))
}

fn is_numeric_label(label: &str) -> bool {
    match label.strip_prefix("0x") {
        Some(hex) => hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => !label.is_empty() && label.chars().all(|c| c.is_ascii_digit()),
    }
}
