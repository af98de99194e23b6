//! Classification of single IP addresses against the reserved-range tables.
//!
//! Both address families are described by an ordered table of
//! `(network, prefix length, classification)` rows. The first row containing
//! the address decides its [`Classification`]; an address matched by no row
//! is [`Classification::Public`].

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// What kind of address an IP is, as far as outbound requests are concerned.
///
/// Only [`Classification::Public`] is ever allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Globally routable address.
    Public,
    /// `0.0.0.0/8` or `::`.
    Unspecified,
    /// `127.0.0.0/8` or `::1`.
    Loopback,
    /// `169.254.0.0/16` or `fe80::/10`. Includes the cloud metadata address.
    LinkLocal,
    /// RFC 1918: `10.0.0.0/8`, `172.16.0.0/12`, `192.168.0.0/16`.
    PrivateRange,
    /// `fc00::/7`.
    UniqueLocal,
    /// `100.64.0.0/10` shared address space.
    CarrierGradeNat,
    /// `198.18.0.0/15`.
    Benchmarking,
    /// Everything from `224.0.0.0` upwards, and `ff00::/8`.
    MulticastOrReserved,
    /// Text that is not a strictly formatted address. Never allowed.
    Malformed,
}

impl Classification {
    /// Whether an outbound request to an address of this kind is permitted.
    pub fn is_public(self) -> bool {
        self == Self::Public
    }

    /// Stable lower-case tag, suitable for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Unspecified => "unspecified",
            Self::Loopback => "loopback",
            Self::LinkLocal => "link-local",
            Self::PrivateRange => "private-range",
            Self::UniqueLocal => "unique-local",
            Self::CarrierGradeNat => "carrier-grade-nat",
            Self::Benchmarking => "benchmarking",
            Self::MulticastOrReserved => "multicast-or-reserved",
            Self::Malformed => "malformed",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the IPv4 range table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Ipv4Range {
    network: u32,
    prefix: u8,
    class: Classification,
}

impl Ipv4Range {
    const fn new(octets: [u8; 4], prefix: u8, class: Classification) -> Self {
        Self {
            network: u32::from_be_bytes(octets),
            prefix,
            class,
        }
    }

    fn mask(&self) -> u32 {
        match self.prefix {
            0 => 0,
            p => u32::MAX << (32 - u32::from(p)),
        }
    }

    fn contains(&self, ip: Ipv4Addr) -> bool {
        u32::from(ip) & self.mask() == self.network
    }
}

#[cfg(test)]
impl Ipv4Range {
    /// First address of the range.
    pub(crate) fn first(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network)
    }

    /// Last address of the range.
    pub(crate) fn last(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network | !self.mask())
    }

    pub(crate) fn class(&self) -> Classification {
        self.class
    }
}

/// One row of the IPv6 range table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Ipv6Range {
    network: u128,
    prefix: u8,
    class: Classification,
}

impl Ipv6Range {
    const fn new(segments: [u16; 8], prefix: u8, class: Classification) -> Self {
        let mut network = 0u128;
        let mut i = 0;
        while i < 8 {
            network = (network << 16) | segments[i] as u128;
            i += 1;
        }
        Self {
            network,
            prefix,
            class,
        }
    }

    fn mask(&self) -> u128 {
        match self.prefix {
            0 => 0,
            p => u128::MAX << (128 - u32::from(p)),
        }
    }

    fn contains(&self, ip: Ipv6Addr) -> bool {
        u128::from(ip) & self.mask() == self.network
    }
}

use Classification::*;

/// Disallowed IPv4 ranges. Every address outside these rows is public.
pub(crate) const IPV4_RANGES: &[Ipv4Range] = &[
    Ipv4Range::new([0, 0, 0, 0], 8, Unspecified),
    Ipv4Range::new([127, 0, 0, 0], 8, Loopback),
    Ipv4Range::new([10, 0, 0, 0], 8, PrivateRange),
    Ipv4Range::new([172, 16, 0, 0], 12, PrivateRange),
    Ipv4Range::new([192, 168, 0, 0], 16, PrivateRange),
    Ipv4Range::new([169, 254, 0, 0], 16, LinkLocal),
    Ipv4Range::new([100, 64, 0, 0], 10, CarrierGradeNat),
    Ipv4Range::new([198, 18, 0, 0], 15, Benchmarking),
    // 224.0.0.0 and above: multicast, class E and broadcast
    Ipv4Range::new([224, 0, 0, 0], 3, MulticastOrReserved),
];

/// Disallowed IPv6 ranges. IPv4-mapped and IPv4-compatible addresses are
/// handled before and after this table respectively.
pub(crate) const IPV6_RANGES: &[Ipv6Range] = &[
    Ipv6Range::new([0, 0, 0, 0, 0, 0, 0, 0], 128, Unspecified),
    Ipv6Range::new([0, 0, 0, 0, 0, 0, 0, 1], 128, Loopback),
    Ipv6Range::new([0xfc00, 0, 0, 0, 0, 0, 0, 0], 7, UniqueLocal),
    Ipv6Range::new([0xfe80, 0, 0, 0, 0, 0, 0, 0], 10, LinkLocal),
    Ipv6Range::new([0xff00, 0, 0, 0, 0, 0, 0, 0], 8, MulticastOrReserved),
];

/// Classify an IP address.
pub fn classify(ip: IpAddr) -> Classification {
    match ip {
        IpAddr::V4(v4) => classify_ipv4(v4),
        IpAddr::V6(v6) => classify_ipv6(v6),
    }
}

/// Classify an IPv4 address against the IPv4 range table.
pub fn classify_ipv4(ip: Ipv4Addr) -> Classification {
    IPV4_RANGES
        .iter()
        .find(|range| range.contains(ip))
        .map_or(Public, |range| range.class)
}

/// Classify an IPv6 address.
///
/// `::ffff:a.b.c.d` is judged by its embedded IPv4 address, as is the
/// deprecated IPv4-compatible form `::a.b.c.d`.
///
/// Translation prefixes are not unwrapped: NAT64 (`64:ff9b::/96`), 6to4
/// (`2002::/16`) and SIIT (`::ffff:0:0:0/96`) addresses classify as
/// [`Classification::Public`] even when the IPv4 they carry is not. Reaching
/// that IPv4 needs a translator on the path.
pub fn classify_ipv6(ip: Ipv6Addr) -> Classification {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return classify_ipv4(v4);
    }

    if let Some(range) = IPV6_RANGES.iter().find(|range| range.contains(ip)) {
        return range.class;
    }

    // :: and ::1 were matched above, so whatever is left in ::/96 embeds IPv4
    let bits = u128::from(ip);
    if bits >> 32 == 0 {
        return classify_ipv4(Ipv4Addr::from(bits as u32));
    }

    Public
}

/// Classify an address given as text.
///
/// IPv4 must be exactly four dot-separated decimal integers in `0..=255`
/// without leading zeros. IPv6 may be bracketed and is case-insensitive.
/// Anything else is [`Classification::Malformed`].
pub fn classify_str(input: &str) -> Classification {
    let text = if input.starts_with('[') {
        match input.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            Some(inner) => inner,
            None => return Malformed,
        }
    } else {
        input
    };

    if text.contains(':') {
        return match text.to_ascii_lowercase().parse::<Ipv6Addr>() {
            Ok(v6) => classify_ipv6(v6),
            Err(_) => Malformed,
        };
    }

    match parse_strict_ipv4(text) {
        Some(v4) => classify_ipv4(v4),
        None => Malformed,
    }
}

/// Parse dotted-quad IPv4 text, refusing every lenient form.
pub(crate) fn parse_strict_ipv4(text: &str) -> Option<Ipv4Addr> {
    let mut octets = [0u8; 4];
    let mut parts = text.split('.');

    for octet in octets.iter_mut() {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        // a leading zero reads as octal to some parsers
        if part.len() > 1 && part.starts_with('0') {
            return None;
        }
        *octet = part.parse().ok()?;
    }

    if parts.next().is_some() {
        return None;
    }

    Some(Ipv4Addr::from(octets))
}
