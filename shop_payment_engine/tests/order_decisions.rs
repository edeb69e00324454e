mod support;

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use shop_payment_engine::{
    db_types::{Order, OrderDecision, OrderStatus, PaymentStatus, SettlementStatus},
    events::{EventHandlers, EventHooks},
    order_objects::QrPaymentRequest,
    traits::PaymentGatewayDatabase,
    ReconciliationApi,
    ReconciliationError,
    SqliteDatabase,
};
use support::{item, new_api, new_test_db, order_request, provider_config, seed_products};

async fn pending_qr_order(db: &SqliteDatabase) -> Order {
    let products = seed_products(db).await;
    let api = new_api(db.clone());
    let (order, _) = api
        .process_new_order(order_request("KHQR", vec![item(products[0].id, 2, Some(1000)), item(products[1].id, 1, Some(500))]))
        .await
        .unwrap();
    // Stage a payment attempt with an uploaded receipt, as the storefront does
    let (payment, _) = api
        .prepare_qr_payment(QrPaymentRequest { order_id: order.order_code.clone(), payment_method: None, amount: None }, None)
        .await
        .unwrap();
    api.upload_receipt(payment.id, "payments/receipt-0001.jpg", None).await.unwrap();
    db.fetch_order_by_id(order.id).await.unwrap().unwrap()
}

#[tokio::test]
async fn chat_approval_settles_the_order_and_all_payments() {
    let db = new_test_db().await;
    let order = pending_qr_order(&db).await;
    let api = new_api(db.clone());

    let outcome = api.handle_chat_callback(&format!("approve:{}", order.id)).await.unwrap().unwrap();
    assert!(outcome.processed);
    assert_eq!(outcome.order.order_status, OrderStatus::Confirmed);
    assert_eq!(outcome.order.payment_status, SettlementStatus::Paid);

    for payment in db.fetch_payments_for_order(order.id).await.unwrap() {
        assert_eq!(payment.status, PaymentStatus::Verified);
        assert!(payment.paid_at.is_some());
    }
}

#[tokio::test]
async fn decisions_on_settled_orders_are_no_ops() {
    let db = new_test_db().await;
    let order = pending_qr_order(&db).await;
    let api = new_api(db.clone());

    let first = api.apply_order_decision(&order.order_code, OrderDecision::Approve).await.unwrap();
    assert!(first.processed);

    // A second click, or a racing chat callback, must not mutate anything further
    let second = api.apply_order_decision(&order.order_code, OrderDecision::Reject).await.unwrap();
    assert!(!second.processed);
    assert!(second.detail.contains("already processed"));

    let settled = db.fetch_order_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(settled.order_status, OrderStatus::Confirmed);
    assert_eq!(settled.payment_status, SettlementStatus::Paid);
    for payment in db.fetch_payments_for_order(order.id).await.unwrap() {
        assert_eq!(payment.status, PaymentStatus::Verified);
    }
}

#[tokio::test]
async fn rejecting_a_cod_order_cancels_it_outright() {
    let db = new_test_db().await;
    let products = seed_products(&db).await;
    let api = new_api(db.clone());
    let (order, _) = api.process_new_order(order_request("COD", vec![item(products[0].id, 1, None)])).await.unwrap();

    let outcome = api.apply_order_decision(&order.order_code, OrderDecision::Reject).await.unwrap();
    assert!(outcome.processed);
    assert_eq!(outcome.order.order_status, OrderStatus::Cancelled);
    assert_eq!(outcome.order.payment_status, SettlementStatus::Failed);
}

#[tokio::test]
async fn rejecting_a_non_cod_order_leaves_it_open_for_retry() {
    let db = new_test_db().await;
    let order = pending_qr_order(&db).await;
    let api = new_api(db.clone());

    let outcome = api.apply_order_decision(&order.order_code, OrderDecision::Reject).await.unwrap();
    assert!(outcome.processed);
    assert_eq!(outcome.order.order_status, OrderStatus::Pending);
    assert_eq!(outcome.order.payment_status, SettlementStatus::Failed);
    for payment in db.fetch_payments_for_order(order.id).await.unwrap() {
        assert_eq!(payment.status, PaymentStatus::Rejected);
        assert!(payment.paid_at.is_none());
    }
}

#[tokio::test]
async fn a_fresh_receipt_supersedes_a_rejection() {
    let db = new_test_db().await;
    let order = pending_qr_order(&db).await;
    let api = new_api(db.clone());

    api.apply_order_decision(&order.order_code, OrderDecision::Reject).await.unwrap();
    let payment = db.fetch_payments_for_order(order.id).await.unwrap().remove(0);
    assert_eq!(payment.status, PaymentStatus::Rejected);

    let (payment, order) = api.upload_receipt(payment.id, "payments/receipt-0002.jpg", None).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.receipt_ref.as_deref(), Some("payments/receipt-0002.jpg"));
    assert!(payment.receipt_uploaded_at.is_some());
    assert_eq!(order.payment_status, SettlementStatus::Pending);
}

#[tokio::test]
async fn unrecognised_chat_callbacks_are_ignored() {
    let db = new_test_db().await;
    seed_products(&db).await;
    let api = new_api(db);

    assert!(api.handle_chat_callback("hello there").await.unwrap().is_none());
    assert!(api.handle_chat_callback("ship:42").await.unwrap().is_none());
    assert!(api.handle_chat_callback("approve:99999").await.unwrap().is_none());
}

#[tokio::test]
async fn payment_access_is_limited_to_the_owner() {
    let db = new_test_db().await;
    let products = seed_products(&db).await;
    let api = new_api(db.clone());

    let mut req = order_request("KHQR", vec![item(products[0].id, 1, None)]);
    req.user_id = Some(7);
    let (order, _) = api.process_new_order(req).await.unwrap();
    let (payment, _) = api
        .prepare_qr_payment(
            QrPaymentRequest { order_id: order.order_code.clone(), payment_method: None, amount: None },
            Some(7),
        )
        .await
        .unwrap();

    let denied = api.fetch_payment(payment.id, Some(8)).await;
    assert!(matches!(denied, Err(ReconciliationError::Forbidden)));
    // The owner and unauthenticated internal callers are both fine
    assert!(api.fetch_payment(payment.id, Some(7)).await.is_ok());
    assert!(api.fetch_payment(payment.id, None).await.is_ok());
}

#[tokio::test]
async fn decisions_are_fanned_out_to_event_hooks() {
    let db = new_test_db().await;
    let order = pending_qr_order(&db).await;

    let decided = Arc::new(AtomicUsize::new(0));
    let counter = decided.clone();
    let mut hooks = EventHooks::default();
    hooks.on_order_decided(move |_ev| {
        let counter = counter.clone();
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(8, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let api = ReconciliationApi::new(db, provider_config(), producers);
    api.apply_order_decision(&order.order_code, OrderDecision::Approve).await.unwrap();
    // The already-processed path must not fire the hook again
    api.apply_order_decision(&order.order_code, OrderDecision::Approve).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(decided.load(Ordering::SeqCst), 1);
}
