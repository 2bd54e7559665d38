pub mod auth;
pub mod rbac;

pub use auth::{auth_middleware, AuthUser, CurrentUser};

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use std::net::SocketAddr;

use crate::services::RequestContext;

// Identity headers carried between trusted internal services.
pub const HEADER_USER_ID: &str = "X-User-ID";
pub const HEADER_USER_ROLES: &str = "X-User-Roles";
pub const HEADER_SCOPE_TYPE: &str = "X-Scope-Type";
pub const HEADER_ORGANIZATION_ID: &str = "X-Organization-ID";
pub const HEADER_CLIENT_ID: &str = "X-Client-ID";

/// Resolve the client IP: first element of `X-Forwarded-For`, then
/// `X-Real-IP`, then the remote address.
pub fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|value| value.to_str().ok()) {
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    remote.map(|addr| addr.ip().to_string()).unwrap_or_default()
}

/// Caller metadata for audit records, extracted from the request.
pub fn request_context<B>(req: &Request<B>) -> RequestContext {
    let remote = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let user_agent = req
        .headers()
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();

    RequestContext {
        source_ip: client_ip(req.headers(), remote),
        user_agent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn remote() -> Option<SocketAddr> {
        Some("192.0.2.7:443".parse().expect("socket addr"))
    }

    #[test]
    fn forwarded_for_wins_and_takes_first_element() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.5, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers, remote()), "203.0.113.5");
    }

    #[test]
    fn real_ip_is_the_second_choice() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers, remote()), "198.51.100.2");
    }

    #[test]
    fn remote_address_is_the_fallback() {
        assert_eq!(client_ip(&HeaderMap::new(), remote()), "192.0.2.7");
        assert_eq!(client_ip(&HeaderMap::new(), None), "");
    }
}
