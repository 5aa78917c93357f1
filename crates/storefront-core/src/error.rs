use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Uniform JSON error body: `{"kind": "UPPER_SNAKE", "message": "..."}`.
pub fn json_error(status: StatusCode, kind: &str, message: impl Into<String>) -> Response {
    let body = serde_json::json!({
        "kind": kind,
        "message": message.into(),
    });
    (status, axum::Json(body)).into_response()
}
