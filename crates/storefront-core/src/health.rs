use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Handler for `GET /healthz`: liveness check.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Build a `GET /readyz` response from named dependency checks.
///
/// 200 when every check passed, 503 otherwise. The body lists each check as
/// `"ok"` or `"unavailable"`.
pub fn readiness(checks: &[(&'static str, bool)]) -> Response {
    let ready = checks.iter().all(|(_, ok)| *ok);
    let body: serde_json::Map<String, serde_json::Value> = checks
        .iter()
        .map(|(name, ok)| {
            let state = if *ok { "ok" } else { "unavailable" };
            ((*name).to_owned(), serde_json::Value::from(state))
        })
        .collect();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}
