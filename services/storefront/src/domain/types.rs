use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storefront_domain::identifier::Identifier;
use storefront_domain::order::{OrderStatus, PaymentMethod};
use storefront_domain::user::UserRole;

/// Number of decimal digits in a one-time code.
pub const OTP_LENGTH: usize = 6;

/// One-time code time-to-live in seconds.
pub const OTP_TTL_SECS: u64 = 300;

/// Failed verifications allowed before the cooldown gate closes.
pub const OTP_MAX_ATTEMPTS: u64 = 3;

/// Cooldown (and attempt-counter) window in seconds.
pub const OTP_COOLDOWN_SECS: u64 = 60;

/// Cached cart snapshot time-to-live in seconds (7 days).
pub const CART_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Preferred notification address: email when present, otherwise phone.
    pub fn contact(&self) -> Option<Identifier> {
        self.email
            .clone()
            .map(Identifier::Email)
            .or_else(|| self.phone.clone().map(Identifier::Phone))
    }
}

#[derive(Debug, Clone)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
}

#[derive(Debug, Clone)]
pub struct Variant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub price_modifier: Decimal,
    pub stock: i32,
}

/// Unit price of a product, optionally adjusted by a variant.
pub fn unit_price(product: &Product, variant: Option<&Variant>) -> Decimal {
    product.price + variant.map_or(Decimal::ZERO, |v| v.price_modifier)
}

/// Stock available for a line: the tighter of product and variant stock.
pub fn available_stock(product: &Product, variant: Option<&Variant>) -> i32 {
    variant.map_or(product.stock, |v| v.stock.min(product.stock))
}

/// Per-user cart. This is also the shape cached in the ephemeral store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Ordered by insertion.
    pub items: Vec<CartLine>,
}

impl Cart {
    pub fn empty(id: Uuid, user_id: Uuid) -> Self {
        Self {
            id,
            user_id,
            items: Vec::new(),
        }
    }

    pub fn total(&self) -> Decimal {
        self.items.iter().map(CartLine::subtotal).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn line(&self, item_id: Uuid) -> Option<&CartLine> {
        self.items.iter().find(|l| l.id == item_id)
    }

    pub fn line_for(&self, product_id: Uuid, variant_id: Option<Uuid>) -> Option<&CartLine> {
        self.items
            .iter()
            .find(|l| l.product_id == product_id && l.variant_id == variant_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    /// Price frozen when the line was first added.
    pub unit_price: Decimal,
}

impl CartLine {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Line to merge into a cart, with the stock ceiling for the merged quantity.
#[derive(Debug, Clone)]
pub struct CartAddition {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub max_quantity: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: String,
    pub items: Vec<OrderItem>,
    #[serde(serialize_with = "storefront_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "storefront_core::serde::to_rfc3339_ms")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    /// Per-unit price at order time.
    pub price: Decimal,
}

/// Everything the order store needs to commit a checkout in one transaction.
#[derive(Debug, Clone)]
pub struct CheckoutPlan {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub cart_id: Uuid,
    pub payment_method: PaymentMethod,
    pub shipping_address: String,
    pub lines: Vec<PlannedLine>,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct PlannedLine {
    pub cart_item_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Pending notification row claimed by the dispatch worker.
#[derive(Debug, Clone)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub kind: String,
    pub payload: serde_json::Value,
    pub attempts: i32,
    pub max_attempts: i32,
    pub backoff_base_ms: i64,
}
