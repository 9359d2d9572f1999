//! Host/Origin admission policy for the HTTP transports.
//!
//! Loopback binds only ever see local clients, so requests are checked
//! against a loopback allow-list to block DNS-rebinding. Any other bind
//! (typically `0.0.0.0` behind a reverse proxy that rewrites `Host`) gets
//! no header checks at all. This is a binary switch, not a trust model.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

const LOOPBACK_HOSTS: [&str; 3] = ["127.0.0.1", "localhost", "::1"];

/// Admission policy derived once from the bind host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPolicy {
    pub rebinding_protection: bool,
    pub allowed_hosts: Vec<String>,
    pub allowed_origins: Vec<String>,
}

impl SecurityPolicy {
    /// Derives the policy for a listener bound to `bind_host`.
    pub fn derive(bind_host: &str) -> Self {
        if is_loopback(bind_host) {
            Self {
                rebinding_protection: true,
                allowed_hosts: vec![
                    "localhost:*".to_string(),
                    "127.0.0.1:*".to_string(),
                    "[::1]:*".to_string(),
                ],
                allowed_origins: vec![
                    "http://localhost:*".to_string(),
                    "http://127.0.0.1:*".to_string(),
                    "http://[::1]:*".to_string(),
                ],
            }
        } else {
            Self::open()
        }
    }

    /// A policy that admits every request.
    pub fn open() -> Self {
        Self {
            rebinding_protection: false,
            allowed_hosts: Vec::new(),
            allowed_origins: Vec::new(),
        }
    }

    pub fn allows_host(&self, host: &str) -> bool {
        !self.rebinding_protection || matches_any(&self.allowed_hosts, host)
    }

    pub fn allows_origin(&self, origin: &str) -> bool {
        !self.rebinding_protection || matches_any(&self.allowed_origins, origin)
    }
}

fn is_loopback(host: &str) -> bool {
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    LOOPBACK_HOSTS.contains(&host)
}

fn matches_any(patterns: &[String], value: &str) -> bool {
    patterns.iter().any(|p| matches_pattern(p, value))
}

/// Exact match, or `prefix:*` matching `prefix:<port>`.
fn matches_pattern(pattern: &str, value: &str) -> bool {
    if pattern == value {
        return true;
    }
    let Some(prefix) = pattern.strip_suffix(":*") else {
        return false;
    };
    value
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix(':'))
        .is_some_and(|port| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
}

/// Axum middleware enforcing the policy on every request.
///
/// Rejects a bad `Host` with 421 and a bad `Origin` with 403. Requests
/// without an `Origin` header are not browser-initiated and pass.
pub async fn enforce(
    State(policy): State<Arc<SecurityPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    if !policy.rebinding_protection {
        return next.run(request).await;
    }

    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()));

    if !host.as_deref().is_some_and(|h| policy.allows_host(h)) {
        tracing::warn!(host = ?host, "rejected request with invalid Host header");
        return (StatusCode::MISDIRECTED_REQUEST, "Invalid Host header").into_response();
    }

    if let Some(origin) = request.headers().get(header::ORIGIN) {
        let allowed = origin.to_str().is_ok_and(|o| policy.allows_origin(o));
        if !allowed {
            tracing::warn!(origin = ?origin, "rejected request with invalid Origin header");
            return (StatusCode::FORBIDDEN, "Invalid Origin header").into_response();
        }
    }

    next.run(request).await
}
