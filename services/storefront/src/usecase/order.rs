use uuid::Uuid;

use storefront_domain::order::OrderStatus;
use storefront_domain::pagination::{Page, PageRequest};
use storefront_domain::user::UserRole;

use crate::domain::repository::OrderRepository;
use crate::domain::types::Order;
use crate::error::StorefrontError;

/// Authenticated caller of an order query.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: UserRole,
}

// ── ListOrders ───────────────────────────────────────────────────────────────

pub struct ListOrdersUseCase<O: OrderRepository> {
    pub orders: O,
}

impl<O: OrderRepository> ListOrdersUseCase<O> {
    /// Admins see every order; customers only their own.
    pub async fn execute(
        &self,
        actor: Actor,
        page: PageRequest,
    ) -> Result<Page<Order>, StorefrontError> {
        let owner = (!actor.role.is_admin()).then_some(actor.user_id);
        self.orders.list(owner, page.clamped()).await
    }
}

// ── GetOrder ─────────────────────────────────────────────────────────────────

pub struct GetOrderUseCase<O: OrderRepository> {
    pub orders: O,
}

impl<O: OrderRepository> GetOrderUseCase<O> {
    pub async fn execute(&self, actor: Actor, order_id: Uuid) -> Result<Order, StorefrontError> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(StorefrontError::OrderNotFound)?;
        if !actor.role.is_admin() && order.user_id != actor.user_id {
            return Err(StorefrontError::Forbidden);
        }
        Ok(order)
    }
}

// ── UpdateOrderStatus ────────────────────────────────────────────────────────

pub struct UpdateOrderStatusUseCase<O: OrderRepository> {
    pub orders: O,
}

impl<O: OrderRepository> UpdateOrderStatusUseCase<O> {
    pub async fn execute(
        &self,
        actor: Actor,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<Order, StorefrontError> {
        if !actor.role.is_admin() {
            return Err(StorefrontError::Forbidden);
        }
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(StorefrontError::OrderNotFound)?;

        if !order.status.can_transition_to(status) {
            return Err(StorefrontError::InvalidInput(format!(
                "cannot change order status from {} to {}",
                order.status, status
            )));
        }

        let updated = self
            .orders
            .update_status(order_id, order.status, status)
            .await?
            .ok_or_else(|| {
                StorefrontError::InvalidInput("order status changed concurrently, retry".into())
            })?;

        tracing::info!(
            order_id = %order_id,
            from = order.status.as_str(),
            to = status.as_str(),
            admin_id = %actor.user_id,
            "order status updated"
        );
        Ok(updated)
    }
}
