use axum::http::StatusCode;
use axum_test::TestServer;
use deadpool_redis::Runtime;
use sea_orm::DatabaseConnection;
use serde_json::json;
use uuid::Uuid;

use storefront::domain::notification::ChannelPolicy;
use storefront::router::build_router;
use storefront::state::AppState;
use storefront_auth_types::session::SessionSecret;
use storefront_testing::auth::{TEST_JWT_SECRET, TestSession};

use crate::helpers::token_issuer;

/// Router with no live backing services: the database is disconnected and
/// Redis points at a closed port.
fn server() -> TestServer {
    let redis = deadpool_redis::Config::from_url("redis://127.0.0.1:1")
        .create_pool(Some(Runtime::Tokio1))
        .unwrap();
    let state = AppState {
        db: DatabaseConnection::Disconnected,
        redis,
        session_secret: SessionSecret::new(TEST_JWT_SECRET),
        tokens: token_issuer(),
        channels: ChannelPolicy::default(),
    };
    TestServer::new(build_router(state)).unwrap()
}

#[tokio::test]
async fn should_answer_liveness_without_dependencies() {
    let response = server().get("/healthz").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn should_report_unready_when_dependencies_are_down() {
    let response = server().get("/readyz").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = response.json();
    assert_eq!(body["database"], "unavailable");
    assert_eq!(body["redis"], "unavailable");
}

#[tokio::test]
async fn should_reject_cart_access_without_token() {
    let response = server().get("/cart").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["kind"], "INVALID_TOKEN");
}

#[tokio::test]
async fn should_reject_forged_token() {
    let response = server()
        .get("/orders")
        .authorization_bearer("not-a-jwt")
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn should_forbid_status_change_by_customer() {
    let session = TestSession::customer(Uuid::new_v4());
    let response = server()
        .patch(&format!("/orders/{}", Uuid::new_v4()))
        .authorization_bearer(session.token())
        .json(&json!({ "status": "cancelled" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    let body: serde_json::Value = response.json();
    assert_eq!(body["kind"], "FORBIDDEN");
}

#[tokio::test]
async fn should_require_shipping_address_at_checkout() {
    let session = TestSession::customer(Uuid::new_v4());
    let response = server()
        .post("/orders")
        .authorization_bearer(session.token())
        .json(&json!({ "shipping_address": "  " }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn should_reject_malformed_identifier_before_lookup() {
    let response = server()
        .post("/auth/login")
        .json(&json!({ "identifier": "not an identifier", "password": "whatever" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["kind"], "INVALID_INPUT");
}

#[tokio::test]
async fn should_render_malformed_json_as_invalid_input() {
    let response = server()
        .post("/auth/login")
        .content_type("application/json")
        .bytes("{not json".into())
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["kind"], "INVALID_INPUT");
}

#[tokio::test]
async fn should_render_missing_field_as_invalid_input() {
    let response = server()
        .post("/auth/login")
        .json(&json!({ "identifier": "ada@example.com" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["kind"], "INVALID_INPUT");
}

#[tokio::test]
async fn should_render_bad_path_and_query_as_invalid_input() {
    let session = TestSession::customer(Uuid::new_v4());

    let response = server()
        .get("/orders/not-a-uuid")
        .authorization_bearer(session.token())
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["kind"], "INVALID_INPUT");

    let response = server()
        .get("/orders?page=first")
        .authorization_bearer(session.token())
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["kind"], "INVALID_INPUT");
}

#[tokio::test]
async fn should_echo_request_id() {
    let response = server().get("/healthz").await;
    let id = response.header("x-request-id");
    assert!(!id.is_empty());
}
