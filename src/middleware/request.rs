use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::{Request, header};

/// The parts of a request the guards care about, copied out once per request.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub host: Option<String>,
    pub forwarded_proto: Option<String>,
    pub forwarded_for: Option<String>,
    pub https_scheme: bool,
    pub path: String,
    pub path_and_query: String,
    pub peer_ip: Option<IpAddr>,
}

fn header_str<B>(request: &Request<B>, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RequestInfo {
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let uri = request.uri();
        let host = header_str(request, header::HOST.as_str())
            .or_else(|| uri.authority().map(|a| a.to_string()));

        Self {
            host,
            forwarded_proto: header_str(request, "x-forwarded-proto"),
            forwarded_for: header_str(request, "x-forwarded-for"),
            https_scheme: uri.scheme_str() == Some("https"),
            path: uri.path().to_string(),
            path_and_query: uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| uri.path().to_string()),
            peer_ip: request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip()),
        }
    }

    /// Host without any `:port` suffix. Bracketed IPv6 literals keep their brackets.
    pub fn hostname(&self) -> Option<&str> {
        let host = self.host.as_deref()?;
        if host.starts_with('[') {
            return host.find(']').map(|end| &host[..=end]);
        }
        match host.rsplit_once(':') {
            Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
                Some(name)
            }
            _ => Some(host),
        }
    }

    /// True when the client reached us over TLS, directly or via a proxy.
    pub fn is_https(&self) -> bool {
        if self.https_scheme {
            return true;
        }
        // Chained proxies append; the first entry is the client-facing hop.
        self.forwarded_proto
            .as_deref()
            .and_then(|proto| proto.split(',').next())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
    }

    /// Client address: first `x-forwarded-for` entry, else the socket peer.
    /// Forwarded values containing anything but IP characters are discarded.
    pub fn client_ip(&self) -> Option<String> {
        let forwarded = self
            .forwarded_for
            .as_deref()
            .and_then(|xff| xff.split(',').next())
            .map(str::trim)
            .filter(|ip| {
                !ip.is_empty()
                    && ip.len() <= 45
                    && ip.bytes().all(|b| {
                        b.is_ascii_hexdigit()
                            || b == b'.'
                            || b == b':'
                            || b == b'['
                            || b == b']'
                            || b == b'%'
                    })
            })
            .map(str::to_string);

        forwarded.or_else(|| self.peer_ip.map(canonical_ip))
    }
}

/// IPv4-mapped IPv6 peers (`::ffff:1.2.3.4`) are reported in dotted form.
fn canonical_ip(ip: IpAddr) -> String {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string(),
        },
        IpAddr::V4(v4) => v4.to_string(),
    }
}
