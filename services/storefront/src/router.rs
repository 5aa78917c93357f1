use axum::{
    Router,
    routing::{get, patch, post},
};
use tower_http::trace::TraceLayer;

use storefront_core::health::healthz;
use storefront_core::middleware::{propagate_request_id_layer, request_id_layer};

use crate::handlers::{
    auth::{login, register, request_otp, verify_otp},
    cart::{add_cart_item, clear_cart, get_cart, remove_cart_item, update_cart_item},
    health::readyz,
    orders::{checkout, get_order, list_orders, update_order_status},
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Identity
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/otp/request", post(request_otp))
        .route("/auth/otp/verify", post(verify_otp))
        // Cart
        .route("/cart", get(get_cart).post(add_cart_item).delete(clear_cart))
        .route(
            "/cart/items/{item_id}",
            patch(update_cart_item).delete(remove_cart_item),
        )
        // Orders
        .route("/orders", post(checkout).get(list_orders))
        .route("/orders/{order_id}", get(get_order).patch(update_order_status))
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(request_id_layer())
        .with_state(state)
}
