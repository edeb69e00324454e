mod support;

use chrono::{Datelike, Utc};
use shop_payment_engine::{
    db_types::{OrderStatus, PaymentMethod, SettlementStatus},
    ReconciliationError,
};
use spg_common::Money;
use support::{item, new_api, new_test_db, order_request, seed_products};

#[tokio::test]
async fn order_total_is_sum_of_item_subtotals() {
    let db = new_test_db().await;
    let products = seed_products(&db).await;
    let api = new_api(db);

    // 2 x $10.00 + 1 x $5.00, method supplied as a client alias
    let req = order_request("KHQR", vec![item(products[0].id, 2, Some(1000)), item(products[1].id, 1, Some(500))]);
    let (order, items) = api.process_new_order(req).await.unwrap();

    assert_eq!(order.total_amount, Money::from_cents(2500));
    assert_eq!(items.len(), 2);
    let total: Money = items.iter().map(|i| i.subtotal).sum();
    assert_eq!(order.total_amount, total);
    assert_eq!(order.payment_method, PaymentMethod::AbaQr);
    assert_eq!(order.order_status, OrderStatus::Pending);
    assert_eq!(order.payment_status, SettlementStatus::Pending);
}

#[tokio::test]
async fn item_prices_fall_back_to_the_live_product() {
    let db = new_test_db().await;
    let products = seed_products(&db).await;
    let api = new_api(db);

    // No explicit price: the $3.50 trinket's live price is snapshotted
    let (order, items) = api.process_new_order(order_request("COD", vec![item(products[2].id, 4, None)])).await.unwrap();
    assert_eq!(items[0].price, Money::from_cents(350));
    assert_eq!(items[0].product_name, "Trinket");
    assert_eq!(order.total_amount, Money::from_cents(1400));
}

#[tokio::test]
async fn order_codes_are_year_scoped_and_zero_padded() {
    let db = new_test_db().await;
    let products = seed_products(&db).await;
    let api = new_api(db);

    let (first, _) = api.process_new_order(order_request("COD", vec![item(products[0].id, 1, None)])).await.unwrap();
    let (second, _) = api.process_new_order(order_request("COD", vec![item(products[1].id, 1, None)])).await.unwrap();

    let year = Utc::now().year();
    assert_eq!(first.order_code, format!("ORD-{year}-{:04}", first.id));
    assert_eq!(second.order_code, format!("ORD-{year}-{:04}", second.id));
    assert!(first.order_code.len() >= "ORD-2025-0001".len());
    assert_ne!(first.order_code, second.order_code);
}

#[tokio::test]
async fn orders_resolve_by_code_or_raw_id() {
    let db = new_test_db().await;
    let products = seed_products(&db).await;
    let api = new_api(db);

    let (order, _) = api.process_new_order(order_request("COD", vec![item(products[0].id, 1, None)])).await.unwrap();

    let by_code = api.resolve_order(&order.order_code).await.unwrap();
    let by_id = api.resolve_order(&order.id.to_string()).await.unwrap();
    assert_eq!(by_code.id, order.id);
    assert_eq!(by_id.id, order.id);

    let missing = api.resolve_order("ORD-1999-9999").await;
    assert!(matches!(missing, Err(ReconciliationError::OrderNotFound(_))));
}

#[tokio::test]
async fn cod_orders_start_confirmed_and_unpaid() {
    let db = new_test_db().await;
    let products = seed_products(&db).await;
    let api = new_api(db);

    let (order, _) =
        api.process_new_order(order_request("cash_on_delivery", vec![item(products[0].id, 1, None)])).await.unwrap();
    assert_eq!(order.payment_method, PaymentMethod::CashOnDelivery);
    assert_eq!(order.order_status, OrderStatus::Confirmed);
    assert_eq!(order.payment_status, SettlementStatus::Pending);
}

#[tokio::test]
async fn orders_without_usable_items_are_rejected() {
    let db = new_test_db().await;
    let products = seed_products(&db).await;
    let api = new_api(db);

    let empty = api.process_new_order(order_request("COD", vec![])).await;
    assert!(matches!(empty, Err(ReconciliationError::EmptyOrder)));

    // Items with non-positive quantities are discarded before validation
    let zeroed = api.process_new_order(order_request("COD", vec![item(products[0].id, 0, None)])).await;
    assert!(matches!(zeroed, Err(ReconciliationError::EmptyOrder)));
}

#[tokio::test]
async fn unknown_payment_methods_are_rejected() {
    let db = new_test_db().await;
    let products = seed_products(&db).await;
    let api = new_api(db);

    let result = api.process_new_order(order_request("PAYPAL", vec![item(products[0].id, 1, None)])).await;
    assert!(matches!(result, Err(ReconciliationError::UnsupportedPaymentMethod(m)) if m == "PAYPAL"));
}

#[tokio::test]
async fn unknown_products_are_rejected() {
    let db = new_test_db().await;
    seed_products(&db).await;
    let api = new_api(db);

    let result = api.process_new_order(order_request("COD", vec![item(9999, 1, None)])).await;
    assert!(matches!(result, Err(ReconciliationError::ProductNotFound(9999))));
}
