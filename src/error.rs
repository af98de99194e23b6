//! Error types for coverguard.

use std::net::IpAddr;
use thiserror::Error;

/// Message suitable for showing to whoever supplied the URL.
const PUBLIC_MESSAGE: &str = "cannot fetch this URL";

/// Errors that can occur during URL validation.
///
/// Both kinds are terminal; nothing is retried internally. The `Display`
/// output names the exact reason and is meant for internal logs only. Use
/// [`Error::public_message`] for anything shown to the requester.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed URL, forbidden scheme, or a DNS lookup that failed or timed out.
    #[error("Invalid URL: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Blocked hostname or an address outside public space.
    #[error("SSRF blocked: {host} - {reason}")]
    Ssrf {
        url: String,
        host: String,
        /// The offending address, if the rejection was about one.
        ip: Option<IpAddr>,
        reason: String,
    },
}

impl Error {
    pub(crate) fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn hostname_blocked(
        url: impl Into<String>,
        host: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Ssrf {
            url: url.into(),
            host: host.into(),
            ip: None,
            reason: reason.into(),
        }
    }

    pub(crate) fn ip_blocked(
        url: impl Into<String>,
        host: impl Into<String>,
        ip: IpAddr,
        reason: impl Into<String>,
    ) -> Self {
        Self::Ssrf {
            url: url.into(),
            host: host.into(),
            ip: Some(ip),
            reason: reason.into(),
        }
    }

    /// Whether this is an SSRF rejection rather than a malformed input.
    pub fn is_ssrf(&self) -> bool {
        matches!(self, Self::Ssrf { .. })
    }

    /// The detailed reason. Log it, don't return it to the requester.
    pub fn reason(&self) -> &str {
        match self {
            Self::InvalidUrl { reason, .. } | Self::Ssrf { reason, .. } => reason,
        }
    }

    /// Generic message that reveals nothing about the internal network.
    pub fn public_message(&self) -> &'static str {
        PUBLIC_MESSAGE
    }
}
