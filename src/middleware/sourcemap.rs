use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use super::{Flow, Guard, RequestInfo};

/// Answers `*.map` requests with an empty 200 so sourcemaps never leave the server.
pub struct SourcemapSuppression;

fn is_sourcemap(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 4 && bytes[bytes.len() - 4..].eq_ignore_ascii_case(b".map")
}

impl Guard for SourcemapSuppression {
    fn inspect(&self, request: &RequestInfo, _headers: &mut HeaderMap) -> Flow {
        if is_sourcemap(&request.path) {
            Flow::Halt(StatusCode::OK.into_response())
        } else {
            Flow::Continue
        }
    }
}
