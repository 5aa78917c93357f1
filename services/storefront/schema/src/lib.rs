//! sea-orm entities for the storefront database.

pub mod cart_items;
pub mod carts;
pub mod order_items;
pub mod orders;
pub mod outbox_events;
pub mod product_variants;
pub mod products;
pub mod users;
