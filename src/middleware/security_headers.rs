use axum::http::{HeaderMap, HeaderValue, header};

use super::{Flow, Guard, RequestInfo};

/// Flags XSS protection on every response.
pub struct SecurityHeaders;

impl Guard for SecurityHeaders {
    fn inspect(&self, _request: &RequestInfo, headers: &mut HeaderMap) -> Flow {
        headers.insert(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        );
        Flow::Continue
    }
}
