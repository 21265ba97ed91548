//! Request guards run as a single chain in front of every route.
//!
//! Each guard looks at a read-only [`RequestInfo`] and either lets the request
//! continue or halts it with a response. Guards can also stage response
//! headers; those are applied to whatever response ends up being returned.

pub mod force_https;
pub mod ip_whitelist;
pub mod request;
pub mod security_headers;
pub mod sourcemap;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

pub use force_https::ForceHttps;
pub use ip_whitelist::IpWhitelist;
pub use request::RequestInfo;
pub use security_headers::SecurityHeaders;
pub use sourcemap::SourcemapSuppression;

pub enum Flow {
    Continue,
    Halt(Response),
}

pub trait Guard: Send + Sync {
    fn inspect(&self, request: &RequestInfo, headers: &mut HeaderMap) -> Flow;
}

/// Runs `inner` unless the request path is one of `paths` (exact match).
pub struct Except<G> {
    paths: Vec<String>,
    inner: G,
}

pub fn except<G: Guard>(paths: &[&str], inner: G) -> Except<G> {
    Except {
        paths: paths.iter().map(|p| p.to_string()).collect(),
        inner,
    }
}

impl<G: Guard> Guard for Except<G> {
    fn inspect(&self, request: &RequestInfo, headers: &mut HeaderMap) -> Flow {
        if self.paths.iter().any(|p| *p == request.path) {
            return Flow::Continue;
        }
        self.inner.inspect(request, headers)
    }
}

#[derive(Clone)]
pub struct GuardChain {
    guards: Arc<[Box<dyn Guard>]>,
}

impl GuardChain {
    pub fn new(guards: Vec<Box<dyn Guard>>) -> Self {
        Self {
            guards: guards.into(),
        }
    }

    /// First guard to halt wins; later guards are not consulted.
    pub fn evaluate(&self, request: &RequestInfo, headers: &mut HeaderMap) -> Flow {
        for guard in self.guards.iter() {
            if let Flow::Halt(response) = guard.inspect(request, headers) {
                return Flow::Halt(response);
            }
        }
        Flow::Continue
    }
}

/// Axum middleware entry point, mounted with `from_fn_with_state`.
pub async fn guard_chain(State(chain): State<GuardChain>, request: Request, next: Next) -> Response {
    let info = RequestInfo::from_request(&request);
    let mut staged = HeaderMap::new();

    let mut response = match chain.evaluate(&info, &mut staged) {
        Flow::Continue => next.run(request).await,
        Flow::Halt(response) => response,
    };
    response.headers_mut().extend(staged);
    response
}
