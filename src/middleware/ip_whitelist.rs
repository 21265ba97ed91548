use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use super::{Flow, Guard, RequestInfo};

/// Comma-separated allowlist of client IPs. Empty means disabled.
pub struct IpWhitelist {
    allowed: Vec<String>,
}

impl IpWhitelist {
    pub fn parse(list: &str) -> Self {
        Self {
            allowed: list
                .split(',')
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.allowed.is_empty()
    }
}

impl Guard for IpWhitelist {
    fn inspect(&self, request: &RequestInfo, _headers: &mut HeaderMap) -> Flow {
        if !self.is_enabled() {
            return Flow::Continue;
        }

        match request.client_ip() {
            Some(ip) if self.allowed.contains(&ip) => Flow::Continue,
            ip => {
                tracing::info!(
                    ip = ip.as_deref().unwrap_or("unknown"),
                    path = request.path,
                    "rejected request from non-whitelisted address"
                );
                Flow::Halt((StatusCode::FORBIDDEN, "Forbidden").into_response())
            }
        }
    }
}
