//! Hostname normalization and the built-in hostname blocklist.

/// Hostnames that are always blocked (checked before DNS resolution).
///
/// Subdomains of an entry are blocked too.
pub const BLOCKED_HOSTNAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "metadata",
    "metadata.google.internal",
    "metadata.goog",
    "metadata.azure.internal",
    "instance-data",              // AWS alternate (EC2-Classic)
    "instance-data.ec2.internal", // AWS, VPC resolver form
];

/// Normalize a hostname: lowercase, strip IPv6 brackets, drop a trailing dot.
///
/// ```
/// use coverguard::normalize_hostname;
///
/// assert_eq!(normalize_hostname("[::1]"), "::1");
/// assert_eq!(normalize_hostname("Example.COM."), "example.com");
/// ```
pub fn normalize_hostname(host: &str) -> String {
    let mut normalized = host.to_lowercase();

    if let Some(inner) = normalized
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
    {
        normalized = inner.to_string();
    }

    // FQDN notation
    if normalized.ends_with('.') {
        normalized.pop();
    }

    normalized
}

/// Check if a hostname is blocked. Returns the matching blocklist entry.
pub fn is_hostname_blocked(host: &str) -> Option<&'static str> {
    let host_lower = host.to_lowercase();
    BLOCKED_HOSTNAMES
        .iter()
        .copied()
        .find(|blocked| is_same_or_subdomain(&host_lower, blocked))
}

/// Match a lower-case hostname against a pattern (supports a leading `*.`).
pub(crate) fn matches_hostname_pattern(host: &str, pattern: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(suffix) => is_same_or_subdomain(host, suffix),
        None => host == pattern,
    }
}

fn is_same_or_subdomain(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
