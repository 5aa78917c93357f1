use axum::extract::State;
use axum::response::Response;

use storefront_core::health::readiness;

use crate::state::AppState;

/// Ready when both Postgres and Redis answer a ping.
pub async fn readyz(State(state): State<AppState>) -> Response {
    let store = state.ephemeral_store();
    let (db, redis) = tokio::join!(state.db.ping(), store.ping());
    readiness(&[("database", db.is_ok()), ("redis", redis)])
}
