use rust_decimal::dec;
use uuid::Uuid;

use storefront::domain::notification::Notification;
use storefront::domain::types::{CART_CACHE_TTL_SECS, CartAddition};
use storefront::domain::repository::{CartRepository, EphemeralStore};
use storefront::error::StorefrontError;
use storefront::usecase::cart::cart_cache_key;
use storefront::usecase::checkout::{CheckoutInput, CheckoutUseCase};
use storefront_domain::order::{OrderStatus, PaymentMethod};

use crate::helpers::{MemDb, MemStore, MockQueue, test_product, test_user, test_variant};

type Checkout = CheckoutUseCase<MemDb, MemDb, MemDb, MemDb, MemStore, MockQueue>;

fn checkout(db: &MemDb, cache: &MemStore, queue: &MockQueue) -> Checkout {
    CheckoutUseCase {
        users: db.clone(),
        carts: db.clone(),
        catalog: db.clone(),
        orders: db.clone(),
        cache: cache.clone(),
        queue: queue.clone(),
    }
}

fn input(user_id: Uuid) -> CheckoutInput {
    CheckoutInput {
        user_id,
        shipping_address: "1 Infinite Loop, Cupertino".to_owned(),
        payment_method: PaymentMethod::CashOnDelivery,
    }
}

async fn put_in_cart(
    db: &MemDb,
    user_id: Uuid,
    product_id: Uuid,
    variant_id: Option<Uuid>,
    quantity: i32,
    unit_price: rust_decimal::Decimal,
) {
    db.add_line(
        user_id,
        &CartAddition {
            product_id,
            variant_id,
            quantity,
            unit_price,
            max_quantity: i32::MAX,
        },
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn should_reject_empty_or_missing_cart_without_writes() {
    let user = test_user("ada@example.com");
    let db = MemDb::with_users(vec![user.clone()]);
    let queue = MockQueue::new();
    let uc = checkout(&db, &MemStore::new(), &queue);

    let missing = uc.execute(input(user.id)).await;
    assert!(matches!(missing, Err(StorefrontError::EmptyCart)), "got {missing:?}");

    db.find_or_create(user.id).await.unwrap();
    let empty = uc.execute(input(user.id)).await;
    assert!(matches!(empty, Err(StorefrontError::EmptyCart)), "got {empty:?}");

    assert!(db.orders().is_empty());
    assert!(queue.jobs().is_empty());
}

#[tokio::test]
async fn should_require_shipping_address() {
    let user = test_user("ada@example.com");
    let db = MemDb::with_users(vec![user.clone()]);
    let uc = checkout(&db, &MemStore::new(), &MockQueue::new());

    let mut blank = input(user.id);
    blank.shipping_address = "   ".to_owned();
    let result = uc.execute(blank).await;
    assert!(matches!(result, Err(StorefrontError::InvalidInput(_))), "got {result:?}");
}

#[tokio::test]
async fn should_commit_order_at_live_prices_and_empty_cart() {
    let user = test_user("ada@example.com");
    let db = MemDb::with_users(vec![user.clone()]);
    let cache = MemStore::new();
    let queue = MockQueue::new();

    let mug = test_product(dec!(10.00), 5);
    let tee = test_product(dec!(20.00), 8);
    let tee_xl = test_variant(tee.id, dec!(2.00), 3);
    db.add_product(mug.clone());
    db.add_product(tee.clone());
    db.add_variant(tee_xl.clone());

    put_in_cart(&db, user.id, mug.id, None, 2, dec!(10.00)).await;
    put_in_cart(&db, user.id, tee.id, Some(tee_xl.id), 1, dec!(22.00)).await;
    cache
        .set_ex(&cart_cache_key(user.id), "{}", CART_CACHE_TTL_SECS)
        .await
        .unwrap();

    // Price moves after the items were added; commit uses the live price.
    db.set_price(mug.id, dec!(12.00));

    let output = checkout(&db, &cache, &queue)
        .execute(input(user.id))
        .await
        .unwrap();
    let order = output.order;

    assert_eq!(output.customer.id, user.id);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, dec!(46.00));
    assert_eq!(order.items.len(), 2);
    let mug_line = order.items.iter().find(|i| i.product_id == mug.id).unwrap();
    assert_eq!(mug_line.price, dec!(12.00));

    assert_eq!(db.stock(mug.id), 3);
    assert_eq!(db.stock(tee.id), 7);
    assert_eq!(db.variant_stock(tee_xl.id), 2);
    assert!(db.cart(user.id).unwrap().is_empty(), "cart should be empty after checkout");
    assert!(cache.raw(&cart_cache_key(user.id)).is_none(), "cache should be invalidated");
    assert_eq!(db.orders().len(), 1);

    let jobs = queue.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].idempotency_key, format!("order_confirmation:{}", order.id));
    match &jobs[0].notification {
        Notification::OrderConfirmation {
            order_id,
            total_amount,
            items,
            shipping_address,
            ..
        } => {
            assert_eq!(*order_id, order.id);
            assert_eq!(*total_amount, dec!(46.00));
            assert_eq!(items.len(), 2);
            assert_eq!(shipping_address, "1 Infinite Loop, Cupertino");
        }
        other => panic!("expected OrderConfirmation, got {other:?}"),
    }
}

#[tokio::test]
async fn should_report_shortfall_without_writes() {
    let user = test_user("ada@example.com");
    let db = MemDb::with_users(vec![user.clone()]);
    let queue = MockQueue::new();
    let mug = test_product(dec!(10.00), 5);
    db.add_product(mug.clone());
    put_in_cart(&db, user.id, mug.id, None, 4, dec!(10.00)).await;

    db.set_stock(mug.id, 3);

    let result = checkout(&db, &MemStore::new(), &queue)
        .execute(input(user.id))
        .await;
    assert!(
        matches!(
            result,
            Err(StorefrontError::InsufficientStock { product_id, variant_id: None, available: 3 })
                if product_id == mug.id
        ),
        "expected InsufficientStock, got {result:?}"
    );
    assert_eq!(db.stock(mug.id), 3);
    assert_eq!(db.cart(user.id).unwrap().items.len(), 1);
    assert!(db.orders().is_empty());
    assert!(queue.jobs().is_empty());
}

#[tokio::test]
async fn should_aggregate_demand_across_lines_of_one_product() {
    let user = test_user("ada@example.com");
    let db = MemDb::with_users(vec![user.clone()]);
    let tee = test_product(dec!(20.00), 4);
    let tee_xl = test_variant(tee.id, dec!(0), 5);
    db.add_product(tee.clone());
    db.add_variant(tee_xl.clone());
    put_in_cart(&db, user.id, tee.id, None, 3, dec!(20.00)).await;
    put_in_cart(&db, user.id, tee.id, Some(tee_xl.id), 2, dec!(20.00)).await;

    let result = checkout(&db, &MemStore::new(), &MockQueue::new())
        .execute(input(user.id))
        .await;
    assert!(
        matches!(result, Err(StorefrontError::InsufficientStock { variant_id: None, available: 4, .. })),
        "expected product-level shortfall, got {result:?}"
    );
    assert_eq!(db.stock(tee.id), 4);
}

#[tokio::test]
async fn should_let_exactly_one_of_two_racing_checkouts_win() {
    let alice = test_user("alice@example.com");
    let bob = test_user("bob@example.com");
    let db = MemDb::with_users(vec![alice.clone(), bob.clone()]);
    let cache = MemStore::new();
    let queue = MockQueue::new();
    let mug = test_product(dec!(10.00), 5);
    db.add_product(mug.clone());
    put_in_cart(&db, alice.id, mug.id, None, 3, dec!(10.00)).await;
    put_in_cart(&db, bob.id, mug.id, None, 3, dec!(10.00)).await;

    let uc = checkout(&db, &cache, &queue);
    let (a, b) = futures::join!(uc.execute(input(alice.id)), uc.execute(input(bob.id)));

    let wins = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(wins, 1, "expected exactly one winner, got {a:?} / {b:?}");
    let loser = if a.is_ok() { b } else { a };
    assert!(
        matches!(loser, Err(StorefrontError::InsufficientStock { available: 2, .. })),
        "expected loser to see remaining stock, got {loser:?}"
    );
    assert_eq!(db.stock(mug.id), 2);
    assert_eq!(db.orders().len(), 1);
}

#[tokio::test]
async fn should_commit_even_when_confirmation_enqueue_fails() {
    let user = test_user("ada@example.com");
    let db = MemDb::with_users(vec![user.clone()]);
    let mug = test_product(dec!(10.00), 5);
    db.add_product(mug.clone());
    put_in_cart(&db, user.id, mug.id, None, 1, dec!(10.00)).await;

    checkout(&db, &MemStore::failing(), &MockQueue::failing())
        .execute(input(user.id))
        .await
        .unwrap();
    assert_eq!(db.orders().len(), 1);
    assert_eq!(db.stock(mug.id), 4);
}
