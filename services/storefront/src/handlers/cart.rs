use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_extra::extract::WithRejection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storefront_auth_types::session::Session;

use crate::domain::types::{Cart, CartLine};
use crate::error::StorefrontError;
use crate::handlers::{JsonBody, PathParam};
use crate::state::AppState;
use crate::usecase::cart::AddItemInput;

#[derive(Serialize)]
pub struct CartResponse {
    pub id: Uuid,
    pub items: Vec<CartLineResponse>,
    pub total: Decimal,
}

#[derive(Serialize)]
pub struct CartLineResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

impl From<&CartLine> for CartLineResponse {
    fn from(line: &CartLine) -> Self {
        Self {
            id: line.id,
            product_id: line.product_id,
            variant_id: line.variant_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            subtotal: line.subtotal(),
        }
    }
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        Self {
            id: cart.id,
            total: cart.total(),
            items: cart.items.iter().map(CartLineResponse::from).collect(),
        }
    }
}

// ── GET /cart ────────────────────────────────────────────────────────────────

pub async fn get_cart(
    session: Session,
    State(state): State<AppState>,
) -> Result<Json<CartResponse>, StorefrontError> {
    let cart = state.cart_manager().get(session.user_id).await?;
    Ok(Json(cart.into()))
}

// ── POST /cart ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

pub async fn add_cart_item(
    session: Session,
    State(state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<AddCartItemRequest>,
) -> Result<(StatusCode, Json<CartResponse>), StorefrontError> {
    let cart = state
        .cart_manager()
        .add_item(
            session.user_id,
            AddItemInput {
                product_id: body.product_id,
                variant_id: body.variant_id,
                quantity: body.quantity,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(cart.into())))
}

// ── DELETE /cart ─────────────────────────────────────────────────────────────

pub async fn clear_cart(
    session: Session,
    State(state): State<AppState>,
) -> Result<StatusCode, StorefrontError> {
    state.cart_manager().clear(session.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── PATCH /cart/items/{item_id} ──────────────────────────────────────────────

#[derive(Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

pub async fn update_cart_item(
    session: Session,
    State(state): State<AppState>,
    WithRejection(Path(item_id), _): PathParam<Uuid>,
    WithRejection(Json(body), _): JsonBody<UpdateCartItemRequest>,
) -> Result<Json<CartResponse>, StorefrontError> {
    let cart = state
        .cart_manager()
        .update_item(session.user_id, item_id, body.quantity)
        .await?;
    Ok(Json(cart.into()))
}

// ── DELETE /cart/items/{item_id} ─────────────────────────────────────────────

pub async fn remove_cart_item(
    session: Session,
    State(state): State<AppState>,
    WithRejection(Path(item_id), _): PathParam<Uuid>,
) -> Result<Json<CartResponse>, StorefrontError> {
    let cart = state
        .cart_manager()
        .remove_item(session.user_id, item_id)
        .await?;
    Ok(Json(cart.into()))
}
