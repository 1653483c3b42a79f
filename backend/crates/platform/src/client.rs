//! Client identification utilities
//!
//! Derives a stable caller identity from request headers for per-caller
//! rate limiting.

use http::HeaderMap;
use std::net::IpAddr;

/// Caller key used when no address can be determined
pub const UNKNOWN_CALLER: &str = "unknown";

/// Extract client IP address from headers
///
/// Checks X-Forwarded-For header first (for reverse proxy setups),
/// then falls back to direct connection IP.
///
/// ## Arguments
/// * `headers` - HTTP request headers
/// * `direct_ip` - Direct connection IP address
///
/// ## Returns
/// The client IP address, or None if not determinable
pub fn extract_client_ip(headers: &HeaderMap, direct_ip: Option<IpAddr>) -> Option<IpAddr> {
    // Check X-Forwarded-For header (first IP in the list)
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first_ip) = xff.split(',').next() {
            if let Ok(ip) = first_ip.trim().parse::<IpAddr>() {
                return Some(ip);
            }
        }
    }
    direct_ip
}

/// Rate-limit scope key for the caller behind a request
///
/// X-Forwarded-For is client-controlled unless a proxy rewrites it. With
/// `trust_forwarded` off only the peer address identifies the caller.
pub fn caller_key(
    headers: &HeaderMap,
    direct_ip: Option<IpAddr>,
    trust_forwarded: bool,
) -> String {
    let ip = if trust_forwarded {
        extract_client_ip(headers, direct_ip)
    } else {
        direct_ip
    };
    ip.map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_CALLER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_extract_client_ip_xff() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("192.168.1.1, 10.0.0.1"),
        );

        let ip = extract_client_ip(&headers, None);
        assert_eq!(ip, Some("192.168.1.1".parse().unwrap()));
    }

    #[test]
    fn test_extract_client_ip_direct() {
        let headers = HeaderMap::new();
        let direct: IpAddr = "127.0.0.1".parse().unwrap();

        let ip = extract_client_ip(&headers, Some(direct));
        assert_eq!(ip, Some(direct));
    }

    #[test]
    fn test_garbage_xff_falls_back_to_direct() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));
        let direct: IpAddr = "10.1.1.1".parse().unwrap();

        assert_eq!(extract_client_ip(&headers, Some(direct)), Some(direct));
    }

    #[test]
    fn test_caller_key_unknown() {
        assert_eq!(caller_key(&HeaderMap::new(), None, true), UNKNOWN_CALLER);
    }

    #[test]
    fn test_caller_key_ipv6() {
        let direct: IpAddr = "::1".parse().unwrap();
        assert_eq!(caller_key(&HeaderMap::new(), Some(direct), true), "::1");
    }

    #[test]
    fn test_untrusted_forwarded_for_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("192.168.1.1"));
        let direct: IpAddr = "10.0.0.7".parse().unwrap();

        assert_eq!(caller_key(&headers, Some(direct), true), "192.168.1.1");
        assert_eq!(caller_key(&headers, Some(direct), false), "10.0.0.7");
        assert_eq!(caller_key(&headers, None, false), UNKNOWN_CALLER);
    }
}
