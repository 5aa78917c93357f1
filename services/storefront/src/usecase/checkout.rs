use std::collections::HashMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use storefront_domain::order::PaymentMethod;

use crate::domain::notification::{ConfirmationLine, Notification, NotificationJob};
use crate::domain::repository::{
    CartRepository, CatalogRepository, EphemeralStore, NotificationQueue, OrderRepository,
    UserRepository,
};
use crate::domain::types::{CheckoutPlan, Order, PlannedLine, User, unit_price};
use crate::error::StorefrontError;
use crate::usecase::cart::{invalidate_cart_cache, resolve_item};

pub struct CheckoutInput {
    pub user_id: Uuid,
    pub shipping_address: String,
    pub payment_method: PaymentMethod,
}

/// Committed order together with the customer who placed it.
#[derive(Debug)]
pub struct CheckoutOutput {
    pub order: Order,
    pub customer: User,
}

pub struct CheckoutUseCase<U, C, P, O, S, Q>
where
    U: UserRepository,
    C: CartRepository,
    P: CatalogRepository,
    O: OrderRepository,
    S: EphemeralStore,
    Q: NotificationQueue,
{
    pub users: U,
    pub carts: C,
    pub catalog: P,
    pub orders: O,
    pub cache: S,
    pub queue: Q,
}

impl<U, C, P, O, S, Q> CheckoutUseCase<U, C, P, O, S, Q>
where
    U: UserRepository,
    C: CartRepository,
    P: CatalogRepository,
    O: OrderRepository,
    S: EphemeralStore,
    Q: NotificationQueue,
{
    pub async fn execute(&self, input: CheckoutInput) -> Result<CheckoutOutput, StorefrontError> {
        let shipping_address = input.shipping_address.trim();
        if shipping_address.is_empty() {
            return Err(StorefrontError::InvalidInput(
                "shipping address is required".into(),
            ));
        }

        // 1. Authoritative cart; never the cached copy.
        let cart = match self.carts.find_by_user(input.user_id).await? {
            Some(cart) if !cart.is_empty() => cart,
            _ => return Err(StorefrontError::EmptyCart),
        };

        let customer = self
            .users
            .find_by_id(input.user_id)
            .await?
            .ok_or(StorefrontError::UserNotFound)?;

        // 2-3. Re-resolve every line, check aggregate stock, and price at the live catalog price.
        let mut product_demand: HashMap<Uuid, (i32, i32)> = HashMap::new();
        let mut variant_demand: HashMap<Uuid, (Uuid, i32, i32)> = HashMap::new();
        let mut lines = Vec::with_capacity(cart.items.len());
        let mut confirmation = Vec::with_capacity(cart.items.len());
        let mut total_amount = Decimal::ZERO;

        for item in &cart.items {
            let (product, variant) =
                resolve_item(&self.catalog, item.product_id, item.variant_id).await?;

            let demand = product_demand
                .entry(product.id)
                .or_insert((0, product.stock));
            demand.0 += item.quantity;
            if let Some(v) = &variant {
                let demand = variant_demand
                    .entry(v.id)
                    .or_insert((product.id, 0, v.stock));
                demand.1 += item.quantity;
            }

            let price = unit_price(&product, variant.as_ref());
            total_amount += price * Decimal::from(item.quantity);

            let product_name = match &variant {
                Some(v) => format!("{} ({})", product.name, v.name),
                None => product.name.clone(),
            };
            confirmation.push(ConfirmationLine {
                product_name,
                quantity: item.quantity,
                price,
            });
            lines.push(PlannedLine {
                cart_item_id: item.id,
                product_id: product.id,
                variant_id: item.variant_id,
                quantity: item.quantity,
                unit_price: price,
            });
        }

        for (&product_id, &(required, available)) in &product_demand {
            if required > available {
                return Err(StorefrontError::InsufficientStock {
                    product_id,
                    variant_id: None,
                    available,
                });
            }
        }
        for (&variant_id, &(product_id, required, available)) in &variant_demand {
            if required > available {
                return Err(StorefrontError::InsufficientStock {
                    product_id,
                    variant_id: Some(variant_id),
                    available,
                });
            }
        }

        // 4-5. One transaction: conditional stock decrements, order + items, cart lines removed.
        let plan = CheckoutPlan {
            order_id: Uuid::now_v7(),
            user_id: input.user_id,
            cart_id: cart.id,
            payment_method: input.payment_method,
            shipping_address: shipping_address.to_owned(),
            lines,
            total_amount,
        };
        let order = self.orders.place(&plan).await?;

        invalidate_cart_cache(&self.cache, input.user_id).await;

        tracing::info!(
            order_id = %order.id,
            user_id = %order.user_id,
            total = %order.total_amount,
            lines = order.items.len(),
            "order placed"
        );

        // 6. Confirmation is best effort.
        match customer.contact() {
            Some(recipient) => {
                let job = NotificationJob::keyed(
                    Notification::OrderConfirmation {
                        recipient,
                        order_id: order.id,
                        customer_name: customer.name.clone(),
                        items: confirmation,
                        total_amount: order.total_amount,
                        shipping_address: order.shipping_address.clone(),
                    },
                    order.id,
                );
                if let Err(e) = self.queue.enqueue(&job).await {
                    tracing::warn!(error = ?e, order_id = %order.id, "failed to enqueue order confirmation");
                }
            }
            None => {
                tracing::warn!(order_id = %order.id, "customer has no contact, skipping confirmation");
            }
        }

        Ok(CheckoutOutput { order, customer })
    }
}
