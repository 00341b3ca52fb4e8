//! Append-only audit trail of completed mutating requests.

use std::net::IpAddr;

use axum::http::{HeaderMap, Method, StatusCode};
use ipnet::IpNet;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::extractor::AuthUser;
use crate::db;

/// Caller-supplied labels naming what a route does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditLabel {
    pub action: &'static str,
    pub resource: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub user_id: Uuid,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<String>,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Request data captured before the handler runs.
#[derive(Debug, Clone)]
pub struct AuditCapture {
    pub method: Method,
    pub resource_id: Option<String>,
    pub body: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditCapture {
    pub fn new(
        method: Method,
        headers: &HeaderMap,
        resource_id: Option<String>,
        body: &[u8],
        peer_addr: Option<IpAddr>,
        trusted_proxies: &[IpNet],
    ) -> Self {
        let body = if body.is_empty() {
            None
        } else {
            serde_json::from_slice::<serde_json::Value>(body)
                .ok()
                .map(redact)
        };

        let user_agent = headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Self {
            method,
            resource_id,
            body,
            ip_address: Some(client_ip(headers, peer_addr, trusted_proxies)),
            user_agent,
        }
    }

    /// Build the row for `user`. The body counts as old values for PUT/PATCH
    /// and as new values for POST/PUT/PATCH.
    pub fn into_record(self, user: &AuthUser, label: AuditLabel) -> AuditRecord {
        let is_update = self.method == Method::PUT || self.method == Method::PATCH;
        let is_write = is_update || self.method == Method::POST;

        AuditRecord {
            user_id: user.user_id,
            action: label.action.to_string(),
            resource: label.resource.to_string(),
            resource_id: self.resource_id,
            old_values: if is_update { self.body.clone() } else { None },
            new_values: if is_write { self.body } else { None },
            ip_address: self.ip_address,
            user_agent: self.user_agent,
        }
    }
}

/// Body keys never written to the audit trail.
const REDACTED_KEYS: &[&str] = &["password", "current_password", "new_password", "token"];

fn redact(mut body: serde_json::Value) -> serde_json::Value {
    if let Some(map) = body.as_object_mut() {
        for key in REDACTED_KEYS {
            if let Some(value) = map.get_mut(*key) {
                *value = serde_json::Value::String("[redacted]".to_string());
            }
        }
    }
    body
}

/// Only successful requests made by a known user are recorded.
pub fn should_record(status: StatusCode, user: Option<&AuthUser>) -> bool {
    user.is_some() && status.as_u16() < 400
}

/// Insert the record. Failures are logged and swallowed.
pub async fn record(pool: &PgPool, record: AuditRecord) {
    if let Err(e) = db::audit::insert(pool, &record).await {
        tracing::error!(
            action = %record.action,
            resource = %record.resource,
            "Failed to write audit log: {e}"
        );
    }
}

/// Client address. `X-Forwarded-For` is only trusted when the direct peer is a
/// configured proxy.
pub fn client_ip(headers: &HeaderMap, peer_addr: Option<IpAddr>, trusted_proxies: &[IpNet]) -> String {
    let peer = peer_addr.unwrap_or(IpAddr::from([127, 0, 0, 1]));

    if !trusted_proxies.is_empty() && trusted_proxies.iter().any(|net| net.contains(&peer)) {
        if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
            // First (leftmost) address that isn't one of our proxies
            for ip_str in xff.split(',').map(|s| s.trim()) {
                if let Ok(ip) = ip_str.parse::<IpAddr>() {
                    if !trusted_proxies.iter().any(|net| net.contains(&ip)) {
                        return ip.to_string();
                    }
                }
            }
        }
    }

    peer.to_string()
}
