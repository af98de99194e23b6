//! # coverguard
//!
//! SSRF-safe validation of remote URLs, such as cover images a server is asked
//! to proxy.
//!
//! `coverguard` validates a URL and every address its hostname resolves to
//! before the server fetches it. It does not make HTTP requests itself: it
//! tells you whether a URL is safe to fetch and which addresses were checked.
//!
//! Everything is fail-closed. Malformed input, ambiguous numeric hosts, DNS
//! failures and timeouts are all rejections.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use coverguard::{validate, Options};
//!
//! # async fn example() -> Result<(), coverguard::Error> {
//! let options = Options::default(); // http and https
//! let url = validate("https://covers.example.org/b/id/42-L.jpg", &options).await?;
//! println!("Safe to connect to {} via {:?}", url.host(), url.socket_addrs());
//! # Ok(())
//! # }
//! ```
//!
//! ## DNS rebinding
//!
//! The addresses validated here are not necessarily the ones a later,
//! separate fetch connects to if it resolves the hostname again. Connect to
//! one of [`ParsedUrl::socket_addrs`] to close that window.

mod blocklist;
mod classify;
mod error;
mod options;
mod resolve;
mod safe_url;
mod validate;

pub use blocklist::{is_hostname_blocked, normalize_hostname, BLOCKED_HOSTNAMES};
pub use classify::{classify, classify_ipv4, classify_ipv6, classify_str, Classification};
pub use error::Error;
pub use options::{
    AllowedSchemes, Options, OptionsBuilder, OptionsError, DEFAULT_DNS_TIMEOUT,
    DEFAULT_MAX_URL_LEN,
};
pub use resolve::{resolve_and_classify, ResolveError, Resolver, StaticResolver, SystemResolver};
pub use safe_url::ParsedUrl;
pub use validate::{validate, validate_sync, Validator};

/// Re-exported so custom [`Resolver`] implementations need no extra dependency.
pub use async_trait::async_trait;
