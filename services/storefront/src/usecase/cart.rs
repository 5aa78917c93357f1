//! Cache-through cart access.
//!
//! Reads try the ephemeral store, then the relational store (creating an empty
//! cart lazily) and repopulate the cache. Mutations go to the relational store,
//! replace the user's cache version and drop the cached copy.
//!
//! Cached entries carry the version that was current before the database read.
//! An entry whose version is no longer current is ignored, so a read that raced
//! a mutation cannot resurrect the older cart.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::repository::{CartRepository, CatalogRepository, EphemeralStore};
use crate::domain::types::{
    CART_CACHE_TTL_SECS, Cart, CartAddition, Product, Variant, available_stock, unit_price,
};
use crate::error::StorefrontError;

/// Version recorded while no mutation has happened within the cache TTL.
const INITIAL_VERSION: &str = "0";

pub fn cart_cache_key(user_id: Uuid) -> String {
    format!("cart:user:{user_id}")
}

pub fn cart_version_key(user_id: Uuid) -> String {
    format!("cart:user:{user_id}:version")
}

#[derive(Serialize, Deserialize)]
struct CachedCart {
    version: String,
    cart: Cart,
}

/// Drop a user's cached cart. The cache is never authoritative, so failures
/// are logged and otherwise ignored.
pub async fn invalidate_cart_cache<S: EphemeralStore>(cache: &S, user_id: Uuid) {
    let version = Uuid::new_v4().to_string();
    if let Err(e) = cache
        .set_ex(&cart_version_key(user_id), &version, CART_CACHE_TTL_SECS)
        .await
    {
        tracing::warn!(error = ?e, %user_id, "failed to bump cart cache version");
    }
    if let Err(e) = cache.del(&cart_cache_key(user_id)).await {
        tracing::warn!(error = ?e, %user_id, "failed to invalidate cart cache");
    }
}

/// Look up a product and optional variant, checking the variant belongs to the product.
pub async fn resolve_item<P: CatalogRepository>(
    catalog: &P,
    product_id: Uuid,
    variant_id: Option<Uuid>,
) -> Result<(Product, Option<Variant>), StorefrontError> {
    let product = catalog
        .find_product(product_id)
        .await?
        .ok_or(StorefrontError::ProductNotFound)?;
    let variant = match variant_id {
        Some(id) => {
            let variant = catalog
                .find_variant(id)
                .await?
                .filter(|v| v.product_id == product.id)
                .ok_or(StorefrontError::VariantNotFound)?;
            Some(variant)
        }
        None => None,
    };
    Ok((product, variant))
}

fn validate_quantity(quantity: i32) -> Result<(), StorefrontError> {
    if quantity < 1 {
        return Err(StorefrontError::InvalidInput(
            "quantity must be at least 1".into(),
        ));
    }
    Ok(())
}

pub struct AddItemInput {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
}

pub struct CartManager<C, P, S>
where
    C: CartRepository,
    P: CatalogRepository,
    S: EphemeralStore,
{
    pub carts: C,
    pub catalog: P,
    pub cache: S,
}

impl<C, P, S> CartManager<C, P, S>
where
    C: CartRepository,
    P: CatalogRepository,
    S: EphemeralStore,
{
    pub async fn get(&self, user_id: Uuid) -> Result<Cart, StorefrontError> {
        let key = cart_cache_key(user_id);

        // Without a readable version the cache is bypassed in both directions.
        let version = match self.cache.get(&cart_version_key(user_id)).await {
            Ok(v) => Some(v.unwrap_or_else(|| INITIAL_VERSION.to_owned())),
            Err(e) => {
                tracing::warn!(error = ?e, %user_id, "cart cache unavailable");
                None
            }
        };

        if let Some(version) = &version {
            match self.cache.get(&key).await {
                Ok(Some(json)) => match serde_json::from_str::<CachedCart>(&json) {
                    Ok(cached) if cached.version == *version => return Ok(cached.cart),
                    Ok(_) => tracing::debug!(%user_id, "ignoring cached cart from an older version"),
                    Err(e) => tracing::warn!(error = %e, %user_id, "discarding unreadable cached cart"),
                },
                Ok(None) => {}
                Err(e) => tracing::warn!(error = ?e, %user_id, "cart cache unavailable"),
            }
        }

        let cart = self.carts.find_or_create(user_id).await?;
        let Some(version) = version else {
            return Ok(cart);
        };

        let cached = CachedCart { version, cart };
        match serde_json::to_string(&cached) {
            Ok(json) => {
                if let Err(e) = self.cache.set_ex(&key, &json, CART_CACHE_TTL_SECS).await {
                    tracing::warn!(error = ?e, %user_id, "failed to cache cart");
                }
            }
            Err(e) => tracing::warn!(error = %e, %user_id, "failed to serialize cart"),
        }
        Ok(cached.cart)
    }

    pub async fn add_item(&self, user_id: Uuid, input: AddItemInput) -> Result<Cart, StorefrontError> {
        validate_quantity(input.quantity)?;
        let (product, variant) =
            resolve_item(&self.catalog, input.product_id, input.variant_id).await?;

        let available = available_stock(&product, variant.as_ref());
        if input.quantity > available {
            return Err(StorefrontError::InsufficientStock {
                product_id: product.id,
                variant_id: input.variant_id,
                available,
            });
        }

        let addition = CartAddition {
            product_id: product.id,
            variant_id: input.variant_id,
            quantity: input.quantity,
            unit_price: unit_price(&product, variant.as_ref()),
            max_quantity: available,
        };
        let cart = self.carts.add_line(user_id, &addition).await?;
        invalidate_cart_cache(&self.cache, user_id).await;
        Ok(cart)
    }

    pub async fn update_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<Cart, StorefrontError> {
        validate_quantity(quantity)?;
        let cart = self
            .carts
            .find_by_user(user_id)
            .await?
            .ok_or(StorefrontError::CartItemNotFound)?;
        let line = cart
            .line(item_id)
            .ok_or(StorefrontError::CartItemNotFound)?;

        let (product, variant) = resolve_item(&self.catalog, line.product_id, line.variant_id).await?;
        let available = available_stock(&product, variant.as_ref());
        if quantity > available {
            return Err(StorefrontError::InsufficientStock {
                product_id: product.id,
                variant_id: line.variant_id,
                available,
            });
        }

        let cart = self
            .carts
            .set_line_quantity(user_id, item_id, quantity)
            .await?;
        invalidate_cart_cache(&self.cache, user_id).await;
        Ok(cart)
    }

    pub async fn remove_item(&self, user_id: Uuid, item_id: Uuid) -> Result<Cart, StorefrontError> {
        let cart = self.carts.remove_line(user_id, item_id).await?;
        invalidate_cart_cache(&self.cache, user_id).await;
        Ok(cart)
    }

    pub async fn clear(&self, user_id: Uuid) -> Result<(), StorefrontError> {
        self.carts.clear(user_id).await?;
        invalidate_cart_cache(&self.cache, user_id).await;
        Ok(())
    }
}
