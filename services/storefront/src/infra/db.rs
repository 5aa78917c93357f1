use std::collections::{BTreeMap, HashMap};

use anyhow::Context as _;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    SqlErr, TransactionTrait,
    sea_query::{Expr, OnConflict},
};
use uuid::Uuid;

use storefront_domain::identifier::Identifier;
use storefront_domain::order::OrderStatus;
use storefront_domain::pagination::{Page, PageRequest};
use storefront_schema::{
    cart_items, carts, order_items, orders, product_variants, products, users,
};

use crate::domain::repository::{
    CartRepository, CatalogRepository, OrderRepository, UserRepository,
};
use crate::domain::types::{
    Cart, CartAddition, CartLine, CheckoutPlan, Order, OrderItem, Product, User, Variant,
};
use crate::error::StorefrontError;

/// Roll back and return `err`.
async fn abort<T>(txn: DatabaseTransaction, err: StorefrontError) -> Result<T, StorefrontError> {
    txn.rollback().await.context("rollback")?;
    Err(err)
}

// ── User repository ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbUserRepository {
    pub db: DatabaseConnection,
}

impl UserRepository for DbUserRepository {
    async fn find_by_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<User>, StorefrontError> {
        let query = match identifier {
            Identifier::Email(email) => users::Entity::find().filter(users::Column::Email.eq(email)),
            Identifier::Phone(phone) => users::Entity::find().filter(users::Column::Phone.eq(phone)),
        };
        let model = query
            .one(&self.db)
            .await
            .context("find user by identifier")?;
        model.map(user_from_model).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StorefrontError> {
        let model = users::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find user by id")?;
        model.map(user_from_model).transpose()
    }

    async fn create(&self, user: &User) -> Result<(), StorefrontError> {
        let result = users::ActiveModel {
            id: Set(user.id),
            name: Set(user.name.clone()),
            email: Set(user.email.clone()),
            phone: Set(user.phone.clone()),
            password_hash: Set(user.password_hash.clone()),
            role: Set(user.role.as_str().to_owned()),
            created_at: Set(user.created_at),
            updated_at: Set(user.created_at),
        }
        .insert(&self.db)
        .await;

        match result {
            Ok(_) => Ok(()),
            // Lost a race with a concurrent registration.
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(StorefrontError::UserAlreadyExists)
            }
            Err(e) => Err(anyhow::Error::new(e).context("create user").into()),
        }
    }
}

fn user_from_model(model: users::Model) -> Result<User, StorefrontError> {
    Ok(User {
        id: model.id,
        name: model.name,
        email: model.email,
        phone: model.phone,
        password_hash: model.password_hash,
        role: model.role.parse().context("user role")?,
        created_at: model.created_at,
    })
}

// ── Catalog repository ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbCatalogRepository {
    pub db: DatabaseConnection,
}

impl CatalogRepository for DbCatalogRepository {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StorefrontError> {
        let model = products::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find product")?;
        Ok(model.map(|m| Product {
            id: m.id,
            name: m.name,
            price: m.price,
            stock: m.stock,
        }))
    }

    async fn find_variant(&self, id: Uuid) -> Result<Option<Variant>, StorefrontError> {
        let model = product_variants::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find product variant")?;
        Ok(model.map(|m| Variant {
            id: m.id,
            product_id: m.product_id,
            name: m.name,
            price_modifier: m.price_modifier,
            stock: m.stock,
        }))
    }
}

// ── Cart repository ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbCartRepository {
    pub db: DatabaseConnection,
}

async fn load_cart<C: ConnectionTrait>(conn: &C, cart: carts::Model) -> Result<Cart, DbErr> {
    let items = cart_items::Entity::find()
        .filter(cart_items::Column::CartId.eq(cart.id))
        .order_by_asc(cart_items::Column::CreatedAt)
        .order_by_asc(cart_items::Column::Id)
        .all(conn)
        .await?;
    Ok(Cart {
        id: cart.id,
        user_id: cart.user_id,
        items: items
            .into_iter()
            .map(|m| CartLine {
                id: m.id,
                product_id: m.product_id,
                variant_id: m.variant_id,
                quantity: m.quantity,
                unit_price: m.unit_price,
            })
            .collect(),
    })
}

async fn ensure_cart<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<(), DbErr> {
    let now = Utc::now();
    carts::Entity::insert(carts::ActiveModel {
        id: Set(Uuid::now_v7()),
        user_id: Set(user_id),
        created_at: Set(now),
        updated_at: Set(now),
    })
    .on_conflict(
        OnConflict::column(carts::Column::UserId)
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(conn)
    .await?;
    Ok(())
}

/// `SELECT ... FOR UPDATE` on the user's cart row. Serializes every writer of the cart.
async fn lock_cart(txn: &DatabaseTransaction, user_id: Uuid) -> Result<Option<carts::Model>, DbErr> {
    carts::Entity::find()
        .filter(carts::Column::UserId.eq(user_id))
        .lock_exclusive()
        .one(txn)
        .await
}

impl DbCartRepository {
    async fn reload(&self, cart: carts::Model) -> Result<Cart, StorefrontError> {
        Ok(load_cart(&self.db, cart).await.context("load cart")?)
    }
}

impl CartRepository for DbCartRepository {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Cart>, StorefrontError> {
        let cart = carts::Entity::find()
            .filter(carts::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .context("find cart by user")?;
        match cart {
            Some(cart) => Ok(Some(self.reload(cart).await?)),
            None => Ok(None),
        }
    }

    async fn find_or_create(&self, user_id: Uuid) -> Result<Cart, StorefrontError> {
        ensure_cart(&self.db, user_id)
            .await
            .context("create cart")?;
        self.find_by_user(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("cart for user {user_id} missing after create").into())
    }

    async fn add_line(
        &self,
        user_id: Uuid,
        addition: &CartAddition,
    ) -> Result<Cart, StorefrontError> {
        let txn = self.db.begin().await.context("begin add cart line")?;
        ensure_cart(&txn, user_id).await.context("create cart")?;
        let cart = lock_cart(&txn, user_id)
            .await
            .context("lock cart")?
            .ok_or_else(|| anyhow::anyhow!("cart for user {user_id} missing after create"))?;

        let existing = cart_items::Entity::find()
            .filter(cart_items::Column::CartId.eq(cart.id))
            .filter(cart_items::Column::ProductId.eq(addition.product_id));
        let existing = match addition.variant_id {
            Some(variant_id) => existing.filter(cart_items::Column::VariantId.eq(variant_id)),
            None => existing.filter(cart_items::Column::VariantId.is_null()),
        }
        .one(&txn)
        .await
        .context("find cart line")?;

        let merged = existing.as_ref().map_or(0, |line| line.quantity) + addition.quantity;
        if merged > addition.max_quantity {
            return abort(
                txn,
                StorefrontError::InsufficientStock {
                    product_id: addition.product_id,
                    variant_id: addition.variant_id,
                    available: addition.max_quantity,
                },
            )
            .await;
        }

        match existing {
            Some(line) => {
                cart_items::ActiveModel {
                    id: Set(line.id),
                    quantity: Set(merged),
                    ..Default::default()
                }
                .update(&txn)
                .await
                .context("merge cart line")?;
            }
            None => {
                cart_items::ActiveModel {
                    id: Set(Uuid::now_v7()),
                    cart_id: Set(cart.id),
                    product_id: Set(addition.product_id),
                    variant_id: Set(addition.variant_id),
                    quantity: Set(addition.quantity),
                    unit_price: Set(addition.unit_price),
                    created_at: Set(Utc::now()),
                }
                .insert(&txn)
                .await
                .context("insert cart line")?;
            }
        }
        touch_cart(&txn, cart.id).await.context("touch cart")?;
        txn.commit().await.context("commit add cart line")?;

        self.reload(cart).await
    }

    async fn set_line_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<Cart, StorefrontError> {
        let txn = self.db.begin().await.context("begin update cart line")?;
        let Some(cart) = lock_cart(&txn, user_id).await.context("lock cart")? else {
            return abort(txn, StorefrontError::CartItemNotFound).await;
        };
        let result = cart_items::Entity::update_many()
            .col_expr(cart_items::Column::Quantity, Expr::value(quantity))
            .filter(cart_items::Column::Id.eq(item_id))
            .filter(cart_items::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await
            .context("update cart line quantity")?;
        if result.rows_affected == 0 {
            return abort(txn, StorefrontError::CartItemNotFound).await;
        }
        touch_cart(&txn, cart.id).await.context("touch cart")?;
        txn.commit().await.context("commit update cart line")?;

        self.reload(cart).await
    }

    async fn remove_line(&self, user_id: Uuid, item_id: Uuid) -> Result<Cart, StorefrontError> {
        let txn = self.db.begin().await.context("begin remove cart line")?;
        let Some(cart) = lock_cart(&txn, user_id).await.context("lock cart")? else {
            return abort(txn, StorefrontError::CartItemNotFound).await;
        };
        let result = cart_items::Entity::delete_many()
            .filter(cart_items::Column::Id.eq(item_id))
            .filter(cart_items::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await
            .context("delete cart line")?;
        if result.rows_affected == 0 {
            return abort(txn, StorefrontError::CartItemNotFound).await;
        }
        touch_cart(&txn, cart.id).await.context("touch cart")?;
        txn.commit().await.context("commit remove cart line")?;

        self.reload(cart).await
    }

    async fn clear(&self, user_id: Uuid) -> Result<(), StorefrontError> {
        let txn = self.db.begin().await.context("begin clear cart")?;
        if let Some(cart) = lock_cart(&txn, user_id).await.context("lock cart")? {
            cart_items::Entity::delete_many()
                .filter(cart_items::Column::CartId.eq(cart.id))
                .exec(&txn)
                .await
                .context("clear cart lines")?;
            touch_cart(&txn, cart.id).await.context("touch cart")?;
        }
        txn.commit().await.context("commit clear cart")?;
        Ok(())
    }
}

async fn touch_cart<C: ConnectionTrait>(conn: &C, cart_id: Uuid) -> Result<(), DbErr> {
    carts::Entity::update_many()
        .col_expr(carts::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(carts::Column::Id.eq(cart_id))
        .exec(conn)
        .await?;
    Ok(())
}

// ── Order repository ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbOrderRepository {
    pub db: DatabaseConnection,
}

fn cart_changed() -> StorefrontError {
    StorefrontError::InvalidInput("cart changed during checkout, retry".into())
}

impl OrderRepository for DbOrderRepository {
    async fn place(&self, plan: &CheckoutPlan) -> Result<Order, StorefrontError> {
        if plan.lines.is_empty() {
            return Err(StorefrontError::EmptyCart);
        }

        let txn = self.db.begin().await.context("begin checkout")?;

        let Some(cart) = lock_cart(&txn, plan.user_id).await.context("lock cart")? else {
            return abort(txn, StorefrontError::EmptyCart).await;
        };
        if cart.id != plan.cart_id {
            return abort(txn, cart_changed()).await;
        }

        // The locked cart must still hold exactly the planned lines.
        let current = cart_items::Entity::find()
            .filter(cart_items::Column::CartId.eq(cart.id))
            .all(&txn)
            .await
            .context("load cart lines for checkout")?;
        if current.is_empty() {
            return abort(txn, StorefrontError::EmptyCart).await;
        }
        let unchanged = current.len() == plan.lines.len()
            && plan.lines.iter().all(|line| {
                current.iter().any(|c| {
                    c.id == line.cart_item_id
                        && c.product_id == line.product_id
                        && c.variant_id == line.variant_id
                        && c.quantity == line.quantity
                })
            });
        if !unchanged {
            return abort(txn, cart_changed()).await;
        }

        // Aggregate per row; BTreeMap keeps a stable lock order across checkouts.
        let mut product_demand: BTreeMap<Uuid, i32> = BTreeMap::new();
        let mut variant_demand: BTreeMap<Uuid, (Uuid, i32)> = BTreeMap::new();
        for line in &plan.lines {
            *product_demand.entry(line.product_id).or_default() += line.quantity;
            if let Some(variant_id) = line.variant_id {
                variant_demand.entry(variant_id).or_insert((line.product_id, 0)).1 += line.quantity;
            }
        }

        let now = Utc::now();
        for (&product_id, &quantity) in &product_demand {
            let result = products::Entity::update_many()
                .col_expr(
                    products::Column::Stock,
                    Expr::col(products::Column::Stock).sub(quantity),
                )
                .col_expr(products::Column::UpdatedAt, Expr::value(now))
                .filter(products::Column::Id.eq(product_id))
                .filter(products::Column::Stock.gte(quantity))
                .exec(&txn)
                .await
                .context("decrement product stock")?;
            if result.rows_affected == 0 {
                let available = products::Entity::find_by_id(product_id)
                    .one(&txn)
                    .await
                    .context("read product stock")?
                    .map_or(0, |p| p.stock);
                return abort(
                    txn,
                    StorefrontError::InsufficientStock {
                        product_id,
                        variant_id: None,
                        available,
                    },
                )
                .await;
            }
        }
        for (&variant_id, &(product_id, quantity)) in &variant_demand {
            let result = product_variants::Entity::update_many()
                .col_expr(
                    product_variants::Column::Stock,
                    Expr::col(product_variants::Column::Stock).sub(quantity),
                )
                .filter(product_variants::Column::Id.eq(variant_id))
                .filter(product_variants::Column::Stock.gte(quantity))
                .exec(&txn)
                .await
                .context("decrement variant stock")?;
            if result.rows_affected == 0 {
                let available = product_variants::Entity::find_by_id(variant_id)
                    .one(&txn)
                    .await
                    .context("read variant stock")?
                    .map_or(0, |v| v.stock);
                return abort(
                    txn,
                    StorefrontError::InsufficientStock {
                        product_id,
                        variant_id: Some(variant_id),
                        available,
                    },
                )
                .await;
            }
        }

        let status = OrderStatus::Pending;
        orders::ActiveModel {
            id: Set(plan.order_id),
            user_id: Set(plan.user_id),
            total_amount: Set(plan.total_amount),
            status: Set(status.as_str().to_owned()),
            payment_method: Set(plan.payment_method.as_str().to_owned()),
            shipping_address: Set(plan.shipping_address.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .context("insert order")?;

        let items: Vec<OrderItem> = plan
            .lines
            .iter()
            .map(|line| OrderItem {
                id: Uuid::now_v7(),
                product_id: line.product_id,
                variant_id: line.variant_id,
                quantity: line.quantity,
                price: line.unit_price,
            })
            .collect();
        order_items::Entity::insert_many(items.iter().map(|item| order_items::ActiveModel {
            id: Set(item.id),
            order_id: Set(plan.order_id),
            product_id: Set(item.product_id),
            variant_id: Set(item.variant_id),
            quantity: Set(item.quantity),
            price: Set(item.price),
        }))
        .exec_without_returning(&txn)
        .await
        .context("insert order items")?;

        cart_items::Entity::delete_many()
            .filter(cart_items::Column::CartId.eq(cart.id))
            .filter(cart_items::Column::Id.is_in(plan.lines.iter().map(|l| l.cart_item_id)))
            .exec(&txn)
            .await
            .context("consume cart lines")?;
        touch_cart(&txn, cart.id).await.context("touch cart")?;

        txn.commit().await.context("commit checkout")?;

        Ok(Order {
            id: plan.order_id,
            user_id: plan.user_id,
            total_amount: plan.total_amount,
            status,
            payment_method: plan.payment_method,
            shipping_address: plan.shipping_address.clone(),
            items,
            created_at: now,
            updated_at: now,
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, StorefrontError> {
        let Some(model) = orders::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find order")?
        else {
            return Ok(None);
        };
        let items = order_items::Entity::find()
            .filter(order_items::Column::OrderId.eq(id))
            .order_by_asc(order_items::Column::Id)
            .all(&self.db)
            .await
            .context("load order items")?;
        order_from_model(model, items).map(Some)
    }

    async fn list(
        &self,
        user_id: Option<Uuid>,
        page: PageRequest,
    ) -> Result<Page<Order>, StorefrontError> {
        let mut query = orders::Entity::find();
        if let Some(user_id) = user_id {
            query = query.filter(orders::Column::UserId.eq(user_id));
        }
        let total = query
            .clone()
            .count(&self.db)
            .await
            .context("count orders")?;
        let models = query
            .order_by_desc(orders::Column::CreatedAt)
            .order_by_desc(orders::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .context("list orders")?;

        let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
        let mut items_by_order: HashMap<Uuid, Vec<order_items::Model>> = HashMap::new();
        if !ids.is_empty() {
            let items = order_items::Entity::find()
                .filter(order_items::Column::OrderId.is_in(ids))
                .order_by_asc(order_items::Column::Id)
                .all(&self.db)
                .await
                .context("load order items")?;
            for item in items {
                items_by_order.entry(item.order_id).or_default().push(item);
            }
        }

        let orders = models
            .into_iter()
            .map(|m| {
                let items = items_by_order.remove(&m.id).unwrap_or_default();
                order_from_model(m, items)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(orders, total, page))
    }

    async fn update_status(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, StorefrontError> {
        let result = orders::Entity::update_many()
            .col_expr(orders::Column::Status, Expr::value(to.as_str()))
            .col_expr(orders::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(orders::Column::Id.eq(id))
            .filter(orders::Column::Status.eq(from.as_str()))
            .exec(&self.db)
            .await
            .context("update order status")?;
        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }
}

fn order_from_model(
    model: orders::Model,
    items: Vec<order_items::Model>,
) -> Result<Order, StorefrontError> {
    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        total_amount: model.total_amount,
        status: model.status.parse().context("order status")?,
        payment_method: model.payment_method.parse().context("payment method")?,
        shipping_address: model.shipping_address,
        items: items
            .into_iter()
            .map(|i| OrderItem {
                id: i.id,
                product_id: i.product_id,
                variant_id: i.variant_id,
                quantity: i.quantity,
                price: i.price,
            })
            .collect(),
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}
