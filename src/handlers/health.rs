use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let reachable = state.redis.ping().await;
    let link = state.redis.link_status().await;

    let status = if reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let label = if reachable { "ok" } else { "degraded" };

    (
        status,
        axum::Json(serde_json::json!({
            "status": label,
            "redis": link,
            "mode": state.config.mode.to_string(),
        })),
    )
}
