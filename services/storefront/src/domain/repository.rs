#![allow(async_fn_in_trait)]

use chrono::{DateTime, Utc};
use uuid::Uuid;

use storefront_domain::identifier::Identifier;
use storefront_domain::order::OrderStatus;
use storefront_domain::pagination::{Page, PageRequest};

use crate::domain::notification::{Message, NotificationJob};
use crate::domain::types::{
    Cart, CartAddition, CheckoutPlan, Order, OutboxEvent, Product, User, Variant,
};
use crate::error::StorefrontError;

/// Repository for user accounts.
pub trait UserRepository: Send + Sync {
    async fn find_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<User>, StorefrontError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StorefrontError>;

    /// Insert a new account. Fails with `UserAlreadyExists` when the email or
    /// phone is already taken.
    async fn create(&self, user: &User) -> Result<(), StorefrontError>;
}

/// Read access to the product catalog.
pub trait CatalogRepository: Send + Sync {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StorefrontError>;

    async fn find_variant(&self, id: Uuid) -> Result<Option<Variant>, StorefrontError>;
}

/// Authoritative cart storage.
pub trait CartRepository: Send + Sync {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Cart>, StorefrontError>;

    /// Return the user's cart, creating an empty one if none exists.
    async fn find_or_create(&self, user_id: Uuid) -> Result<Cart, StorefrontError>;

    /// Merge a line into the cart under a lock on the cart: an existing
    /// `(product, variant)` line gets its quantity increased, otherwise a new
    /// line is appended. Fails with `InsufficientStock` if the merged quantity
    /// would exceed `max_quantity`.
    async fn add_line(
        &self,
        user_id: Uuid,
        addition: &CartAddition,
    ) -> Result<Cart, StorefrontError>;

    /// Replace a line's quantity. `CartItemNotFound` if the line is not in the user's cart.
    async fn set_line_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<Cart, StorefrontError>;

    /// `CartItemNotFound` if the line is not in the user's cart.
    async fn remove_line(&self, user_id: Uuid, item_id: Uuid) -> Result<Cart, StorefrontError>;

    async fn clear(&self, user_id: Uuid) -> Result<(), StorefrontError>;
}

/// Order storage.
pub trait OrderRepository: Send + Sync {
    /// Commit a checkout in one transaction: conditionally decrement every
    /// product and variant stock, insert the order and its items, and delete
    /// the consumed cart lines. Any shortfall rolls everything back and
    /// reports `InsufficientStock` with the stock seen inside the transaction.
    async fn place(&self, plan: &CheckoutPlan) -> Result<Order, StorefrontError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, StorefrontError>;

    /// Newest first. `user_id = None` lists every order.
    async fn list(
        &self,
        user_id: Option<Uuid>,
        page: PageRequest,
    ) -> Result<Page<Order>, StorefrontError>;

    /// Move an order from `from` to `to`. Returns `None` if the order was not
    /// in status `from` (concurrently changed or absent).
    async fn update_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, StorefrontError>;
}

/// Shared key-value store with per-key expiry (Redis).
pub trait EphemeralStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorefrontError>;

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StorefrontError>;

    /// Returns `true` if this call removed the key.
    async fn del(&self, key: &str) -> Result<bool, StorefrontError>;

    async fn exists(&self, key: &str) -> Result<bool, StorefrontError>;

    /// Remaining seconds, or `None` when the key is absent or has no expiry.
    async fn ttl(&self, key: &str) -> Result<Option<u64>, StorefrontError>;

    /// Atomically increment a counter, setting `ttl_secs` only when the key has
    /// no expiry yet. Returns the value after the increment.
    async fn incr_with_expiry(&self, key: &str, ttl_secs: u64) -> Result<u64, StorefrontError>;
}

/// Producer side of the notification queue.
pub trait NotificationQueue: Send + Sync {
    async fn enqueue(&self, job: &NotificationJob) -> Result<(), StorefrontError>;
}

/// Consumer side of the notification queue.
pub trait OutboxRepository: Send + Sync {
    /// Lease up to `limit` due events, highest priority first. Leased rows are
    /// hidden from other workers until `lease_until`.
    async fn claim_due(
        &self,
        limit: u64,
        lease_until: DateTime<Utc>,
    ) -> Result<Vec<OutboxEvent>, StorefrontError>;

    async fn mark_processed(&self, id: Uuid, attempts: i32) -> Result<(), StorefrontError>;

    async fn schedule_retry(
        &self,
        id: Uuid,
        attempts: i32,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), StorefrontError>;

    async fn mark_failed(&self, id: Uuid, attempts: i32, error: &str)
    -> Result<(), StorefrontError>;
}

/// Delivers one rendered message over its channel.
pub trait NotificationSender: Send + Sync {
    async fn send(&self, message: &Message) -> Result<(), StorefrontError>;
}
