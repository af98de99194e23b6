//! End-to-end behaviour of `Validator::validate` against a stub resolver.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use coverguard::{AllowedSchemes, Error, Options, ParsedUrl, StaticResolver, Validator};

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn resolver() -> StaticResolver {
    StaticResolver::new()
        .with_host("covers.openlibrary.example", &[ip("93.184.216.34")])
        .with_host(
            "images.bookshop.example",
            &[ip("93.184.216.34"), ip("169.254.169.254")],
        )
        .with_host("printer.lan.example", &[ip("192.168.1.20")])
}

fn validator() -> Validator {
    Validator::with_resolver(Options::default(), resolver())
}

fn validator_for(schemes: &[&str]) -> Validator {
    let options = Options::builder()
        .allowed_schemes(schemes.iter().copied())
        .build()
        .unwrap();
    Validator::with_resolver(options, resolver())
}

async fn check(url: &str) -> Result<ParsedUrl, Error> {
    validator().validate(url).await
}

#[tokio::test]
async fn non_http_schemes_are_invalid() {
    for url in [
        "ftp://example.com",
        "file:///etc/passwd",
        "gopher://example.com/",
        "javascript:alert(1)",
        "data:image/png;base64,AAAA",
        "ws://covers.openlibrary.example/",
    ] {
        let err = check(url).await.unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }), "{url}: {err}");
    }
}

#[tokio::test]
async fn disallowed_ipv4_literals_are_ssrf() {
    for addr in [
        "127.0.0.1",
        "127.255.255.254",
        "10.0.0.1",
        "0.0.0.0",
        "0.1.2.3",
        "172.16.0.0",
        "172.20.10.1",
        "172.31.255.255",
        "192.168.0.1",
        "169.254.0.1",
        "169.254.169.254",
        "100.64.0.1",
        "100.127.255.255",
        "198.18.0.1",
        "198.19.255.255",
        "224.0.0.1",
        "239.255.255.250",
        "240.0.0.1",
        "255.255.255.255",
    ] {
        let err = check(&format!("http://{addr}/cover.jpg")).await.unwrap_err();
        assert!(err.is_ssrf(), "{addr}: {err}");
    }
}

#[tokio::test]
async fn public_ipv4_literals_pass() {
    for addr in [
        "8.8.8.8",
        "172.15.255.255",
        "172.32.0.0",
        "100.63.255.255",
        "100.128.0.0",
        "198.17.255.255",
        "198.20.0.0",
        "223.255.255.255",
        "1.1.1.1",
    ] {
        let url = check(&format!("http://{addr}/cover.jpg")).await.unwrap();
        assert_eq!(url.addrs(), &[ip(addr)], "{addr}");
    }
}

#[tokio::test]
async fn private_172_boundaries() {
    assert!(check("http://172.15.255.255/").await.is_ok());
    assert!(check("http://172.16.0.0/").await.unwrap_err().is_ssrf());
    assert!(check("http://172.31.255.255/").await.unwrap_err().is_ssrf());
    assert!(check("http://172.32.0.0/").await.is_ok());
    assert!(check("http://169.254.169.254/").await.unwrap_err().is_ssrf());
}

#[tokio::test]
async fn ipv6_literals() {
    assert!(check("http://[::1]/").await.unwrap_err().is_ssrf());
    assert!(check("http://[::]/").await.unwrap_err().is_ssrf());
    assert!(check("http://[::ffff:127.0.0.1]/").await.unwrap_err().is_ssrf());
    assert!(check("http://[fe80::1]/").await.unwrap_err().is_ssrf());
    assert!(check("http://[fd12:3456:789a::1]/").await.unwrap_err().is_ssrf());

    let url = check("https://[2001:4860:4860::8888]/").await.unwrap();
    assert_eq!(url.host(), "2001:4860:4860::8888");
}

#[tokio::test]
async fn blocked_hostnames_fail_for_any_scheme() {
    let err = validator_for(&["http"])
        .validate("http://localhost/x")
        .await
        .unwrap_err();
    assert!(err.is_ssrf());

    let err = validator_for(&["https"])
        .validate("https://metadata.google.internal/")
        .await
        .unwrap_err();
    assert!(err.is_ssrf());

    for host in ["metadata", "metadata.goog", "metadata.azure.internal", "instance-data"] {
        let err = check(&format!("http://{host}/")).await.unwrap_err();
        assert!(err.is_ssrf(), "{host}");
    }
}

#[tokio::test]
async fn hostname_resolving_to_metadata_is_rejected() {
    let err = check("https://images.bookshop.example/covers/9780261103573.jpg")
        .await
        .unwrap_err();
    match err {
        Error::Ssrf { host, ip: offending, .. } => {
            assert_eq!(host, "images.bookshop.example");
            assert_eq!(offending, Some(ip("169.254.169.254")));
        }
        other => panic!("expected SSRF rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn hostname_resolving_to_private_range_is_rejected() {
    assert!(check("http://printer.lan.example/").await.unwrap_err().is_ssrf());
}

#[tokio::test]
async fn unresolvable_hostname_is_invalid_url() {
    let err = check("https://missing.example/").await.unwrap_err();
    assert!(matches!(err, Error::InvalidUrl { .. }));
}

#[tokio::test]
async fn accepted_url_carries_components() {
    let url = check("HTTPS://Covers.OpenLibrary.Example:8443/b/isbn/0385472579-M.jpg?x=1")
        .await
        .unwrap();
    assert_eq!(url.scheme(), "https");
    assert_eq!(url.host(), "covers.openlibrary.example");
    assert_eq!(url.port(), Some(8443));
    assert_eq!(url.path(), "/b/isbn/0385472579-M.jpg");
    assert_eq!(url.query(), Some("x=1"));
    assert_eq!(
        url.socket_addrs(),
        vec!["93.184.216.34:8443".parse::<SocketAddr>().unwrap()]
    );
}

#[tokio::test]
async fn malformed_input_is_a_typed_error() {
    let long = format!("https://covers.openlibrary.example/{}", "x".repeat(100_000));
    for input in [
        "",
        " ",
        "\u{0}",
        "http://\u{1b}[31mred/",
        "http://exa\nmple.com/",
        "http://[::1/",
        "http://256.256.256.256/",
        "://",
        "http:",
        long.as_str(),
    ] {
        assert!(check(input).await.is_err(), "{input:?}");
    }
}

#[tokio::test]
async fn ipv4_host_must_be_a_plain_dotted_quad() {
    for url in [
        "http://\u{ff10}\u{ff11}\u{ff10}.8.8.8/",
        "http://\u{ff10}x08080808/",
        "http://8.8.\u{ff18}/",
    ] {
        let err = check(url).await.unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }), "{url:?}: {err}");
    }
    assert!(check("http://8.8.8.8./").await.is_ok());
}

#[tokio::test]
async fn public_message_is_generic() {
    let err = check("http://10.0.0.1/").await.unwrap_err();
    assert_eq!(err.public_message(), "cannot fetch this URL");
    assert!(err.to_string().contains("10.0.0.1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn literal_results_are_deterministic_under_concurrency() {
    let inputs = [
        "http://8.8.8.8/",
        "http://127.0.0.1/",
        "http://172.16.0.0/",
        "http://[::ffff:10.0.0.1]/",
        "ftp://8.8.8.8/",
        "http://0x7f000001/",
    ];

    let validator = Arc::new(validator());
    let expected: Vec<_> = {
        let mut out = Vec::new();
        for input in inputs {
            out.push(validator.validate(input).await);
        }
        out
    };

    let mut handles = Vec::new();
    for _ in 0..16 {
        let validator = Arc::clone(&validator);
        handles.push(tokio::spawn(async move {
            let mut out = Vec::new();
            for input in inputs {
                out.push(validator.validate(input).await);
            }
            out
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), expected);
    }
}

#[test]
fn allowed_schemes_are_per_validator() {
    let http_only = validator_for(&["http"]);
    let https_only = validator_for(&["https"]);

    assert!(http_only.validate_sync("http://8.8.8.8/").is_ok());
    assert!(https_only.validate_sync("http://8.8.8.8/").is_err());
    assert_eq!(
        https_only.options().allowed_schemes(),
        &AllowedSchemes::new(["https"])
    );
}
