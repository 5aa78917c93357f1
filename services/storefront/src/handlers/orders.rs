use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storefront_auth_types::session::Session;
use storefront_domain::order::{OrderStatus, PaymentMethod};
use storefront_domain::pagination::{Page, PageRequest};

use crate::domain::types::Order;
use crate::error::StorefrontError;
use crate::handlers::{JsonBody, PathParam, QueryParams};
use crate::state::AppState;
use crate::usecase::checkout::{CheckoutInput, CheckoutUseCase};
use crate::usecase::order::{
    Actor, GetOrderUseCase, ListOrdersUseCase, UpdateOrderStatusUseCase,
};

fn actor(session: &Session) -> Actor {
    Actor {
        user_id: session.user_id,
        role: session.role,
    }
}

// ── POST /orders ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: String,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

#[derive(Serialize)]
pub struct CustomerResponse {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    #[serde(flatten)]
    pub order: Order,
    pub customer: CustomerResponse,
}

pub async fn checkout(
    session: Session,
    State(state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), StorefrontError> {
    let usecase = CheckoutUseCase {
        users: state.user_repo(),
        carts: state.cart_repo(),
        catalog: state.catalog_repo(),
        orders: state.order_repo(),
        cache: state.ephemeral_store(),
        queue: state.notification_queue(),
    };
    let output = usecase
        .execute(CheckoutInput {
            user_id: session.user_id,
            shipping_address: body.shipping_address,
            payment_method: body.payment_method,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            order: output.order,
            customer: CustomerResponse {
                id: output.customer.id,
                name: output.customer.name,
                email: output.customer.email,
                phone: output.customer.phone,
            },
        }),
    ))
}

// ── GET /orders ──────────────────────────────────────────────────────────────

pub async fn list_orders(
    session: Session,
    State(state): State<AppState>,
    WithRejection(Query(page), _): QueryParams<PageRequest>,
) -> Result<Json<Page<Order>>, StorefrontError> {
    let usecase = ListOrdersUseCase {
        orders: state.order_repo(),
    };
    let page = usecase.execute(actor(&session), page).await?;
    Ok(Json(page))
}

// ── GET /orders/{order_id} ───────────────────────────────────────────────────

pub async fn get_order(
    session: Session,
    State(state): State<AppState>,
    WithRejection(Path(order_id), _): PathParam<Uuid>,
) -> Result<Json<Order>, StorefrontError> {
    let usecase = GetOrderUseCase {
        orders: state.order_repo(),
    };
    let order = usecase.execute(actor(&session), order_id).await?;
    Ok(Json(order))
}

// ── PATCH /orders/{order_id} ─────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

pub async fn update_order_status(
    session: Session,
    State(state): State<AppState>,
    WithRejection(Path(order_id), _): PathParam<Uuid>,
    WithRejection(Json(body), _): JsonBody<UpdateOrderStatusRequest>,
) -> Result<Json<Order>, StorefrontError> {
    let usecase = UpdateOrderStatusUseCase {
        orders: state.order_repo(),
    };
    let order = usecase
        .execute(actor(&session), order_id, body.status)
        .await?;
    Ok(Json(order))
}
