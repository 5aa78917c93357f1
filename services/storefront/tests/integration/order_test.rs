use chrono::{Duration, Utc};
use rust_decimal::dec;
use uuid::Uuid;

use storefront::domain::types::{Order, OrderItem};
use storefront::error::StorefrontError;
use storefront::usecase::order::{
    Actor, GetOrderUseCase, ListOrdersUseCase, UpdateOrderStatusUseCase,
};
use storefront_domain::order::{OrderStatus, PaymentMethod};
use storefront_domain::pagination::PageRequest;
use storefront_domain::user::UserRole;

use crate::helpers::MemDb;

fn order_for(user_id: Uuid, minutes_ago: i64) -> Order {
    let at = Utc::now() - Duration::minutes(minutes_ago);
    Order {
        id: Uuid::new_v4(),
        user_id,
        total_amount: dec!(19.99),
        status: OrderStatus::Pending,
        payment_method: PaymentMethod::CashOnDelivery,
        shipping_address: "221B Baker Street".to_owned(),
        items: vec![OrderItem {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            variant_id: None,
            quantity: 1,
            price: dec!(19.99),
        }],
        created_at: at,
        updated_at: at,
    }
}

fn customer(user_id: Uuid) -> Actor {
    Actor {
        user_id,
        role: UserRole::Customer,
    }
}

fn admin() -> Actor {
    Actor {
        user_id: Uuid::new_v4(),
        role: UserRole::Admin,
    }
}

#[tokio::test]
async fn should_scope_listing_by_role() {
    let db = MemDb::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let older = order_for(alice, 10);
    let newer = order_for(alice, 1);
    db.insert_order(older.clone());
    db.insert_order(newer.clone());
    db.insert_order(order_for(bob, 5));
    let uc = ListOrdersUseCase { orders: db };

    let own = uc.execute(customer(alice), PageRequest::default()).await.unwrap();
    assert_eq!(own.total, 2);
    let ids: Vec<Uuid> = own.items.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![newer.id, older.id], "expected newest first");

    let all = uc.execute(admin(), PageRequest::default()).await.unwrap();
    assert_eq!(all.total, 3);
}

#[tokio::test]
async fn should_page_orders() {
    let db = MemDb::new();
    let alice = Uuid::new_v4();
    for minutes in 0..5 {
        db.insert_order(order_for(alice, minutes));
    }
    let uc = ListOrdersUseCase { orders: db };

    let page = uc
        .execute(customer(alice), PageRequest { per_page: 2, page: 3 })
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.page, 3);
}

#[tokio::test]
async fn should_hide_other_customers_orders() {
    let db = MemDb::new();
    let alice = Uuid::new_v4();
    let order = order_for(alice, 0);
    db.insert_order(order.clone());
    let uc = GetOrderUseCase { orders: db };

    assert_eq!(uc.execute(customer(alice), order.id).await.unwrap().id, order.id);
    assert_eq!(uc.execute(admin(), order.id).await.unwrap().id, order.id);

    let stranger = uc.execute(customer(Uuid::new_v4()), order.id).await;
    assert!(matches!(stranger, Err(StorefrontError::Forbidden)), "got {stranger:?}");

    let missing = uc.execute(admin(), Uuid::new_v4()).await;
    assert!(matches!(missing, Err(StorefrontError::OrderNotFound)), "got {missing:?}");
}

#[tokio::test]
async fn should_let_only_admins_advance_status() {
    let db = MemDb::new();
    let alice = Uuid::new_v4();
    let order = order_for(alice, 0);
    db.insert_order(order.clone());
    let uc = UpdateOrderStatusUseCase { orders: db.clone() };

    let by_owner = uc
        .execute(customer(alice), order.id, OrderStatus::Cancelled)
        .await;
    assert!(matches!(by_owner, Err(StorefrontError::Forbidden)), "got {by_owner:?}");

    let updated = uc
        .execute(admin(), order.id, OrderStatus::Processing)
        .await
        .unwrap();
    assert_eq!(updated.status, OrderStatus::Processing);
    assert_eq!(db.orders()[0].status, OrderStatus::Processing);
}

#[tokio::test]
async fn should_reject_invalid_transitions() {
    let db = MemDb::new();
    let mut order = order_for(Uuid::new_v4(), 0);
    order.status = OrderStatus::Shipped;
    db.insert_order(order.clone());
    let uc = UpdateOrderStatusUseCase { orders: db.clone() };

    let cancel = uc.execute(admin(), order.id, OrderStatus::Cancelled).await;
    assert!(
        matches!(cancel, Err(StorefrontError::InvalidInput(_))),
        "expected shipped order to refuse cancellation, got {cancel:?}"
    );
    assert_eq!(db.orders()[0].status, OrderStatus::Shipped);

    let missing = uc
        .execute(admin(), Uuid::new_v4(), OrderStatus::Processing)
        .await;
    assert!(matches!(missing, Err(StorefrontError::OrderNotFound)), "got {missing:?}");
}
