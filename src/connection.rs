//! Transport security detection.
//!
//! Cookies issued over TLS must carry `Secure`, cookies issued over plain HTTP
//! must not. A TLS acceptor (or a test) marks the connection by inserting
//! [`TlsConnection`] into the request extensions.

use axum::http::{Extensions, HeaderMap, Uri};

const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Request extension set by the TLS acceptor for connections it terminated.
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsConnection;

/// Whether the request arrived over TLS.
///
/// `X-Forwarded-Proto` is only honoured when `trust_forwarded_proto` is set,
/// i.e. when the gateway runs behind a proxy that overwrites the header.
pub fn is_tls(
    headers: &HeaderMap,
    extensions: &Extensions,
    uri: &Uri,
    trust_forwarded_proto: bool,
) -> bool {
    if extensions.get::<TlsConnection>().is_some() {
        return true;
    }

    if uri.scheme_str() == Some("https") {
        return true;
    }

    trust_forwarded_proto
        && headers
            .get(FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_plain_http() {
        let uri: Uri = "/oauth/login".parse().unwrap();
        assert!(!is_tls(&HeaderMap::new(), &Extensions::new(), &uri, true));
    }

    #[test]
    fn test_tls_marker() {
        let mut extensions = Extensions::new();
        extensions.insert(TlsConnection);
        let uri: Uri = "/".parse().unwrap();
        assert!(is_tls(&HeaderMap::new(), &extensions, &uri, false));
    }

    #[test]
    fn test_https_scheme() {
        let uri: Uri = "https://auth.example.com/oauth".parse().unwrap();
        assert!(is_tls(&HeaderMap::new(), &Extensions::new(), &uri, false));
    }

    #[test]
    fn test_forwarded_proto_requires_trust() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_PROTO, HeaderValue::from_static("https, http"));
        let uri: Uri = "/".parse().unwrap();

        assert!(!is_tls(&headers, &Extensions::new(), &uri, false));
        assert!(is_tls(&headers, &Extensions::new(), &uri, true));

        headers.insert(FORWARDED_PROTO, HeaderValue::from_static("http"));
        assert!(!is_tls(&headers, &Extensions::new(), &uri, true));
    }
}
