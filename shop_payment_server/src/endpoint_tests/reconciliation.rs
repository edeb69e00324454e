use actix_web::test;
use serde_json::{json, Value};
use shop_payment_engine::helpers::sign_checkout_fields;
use spg_common::{Money, Secret};

use crate::endpoint_tests::helpers::{seed_product, test_app, test_config, test_db, API_KEY, MERCHANT_ID};

fn order_body(product_id: i64) -> Value {
    json!({
        "payment_method": "KHQR",
        "name": "Sokha Chan",
        "phone": "+855 12 345 678",
        "address": "St 118, Phnom Penh",
        "items": [
            { "product_id": product_id, "qty": 2, "price": "10.00" },
            { "product_id": product_id, "qty": 1, "price": "5.00" }
        ]
    })
}

fn signed_callback(order_code: &str, txid: &str, status: &str, amount: Money) -> Value {
    let hash =
        sign_checkout_fields(MERCHANT_ID, order_code, amount, "USD", &Secret::new(API_KEY.to_string())).unwrap();
    json!({
        "order_id": order_code,
        "transaction_id": txid,
        "status": status,
        "amount": amount.format(),
        "currency": "USD",
        "merchant_id": MERCHANT_ID,
        "hash": hash,
    })
}

#[actix_web::test]
async fn health_check() {
    let db = test_db().await;
    let config = test_config();
    let app = test_app!(db, config);
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
}

#[actix_web::test]
async fn order_checkout_webhook_round_trip() {
    let db = test_db().await;
    let config = test_config();
    let app = test_app!(db, config);

    let product_id = seed_product(&db).await;
    let req = test::TestRequest::post().uri("/api/orders").set_json(order_body(product_id)).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let order_code = body["order"]["order_code"].as_str().unwrap().to_string();
    assert_eq!(body["order"]["total_amount"], "25.00");
    assert_eq!(body["order"]["payment_method"], "ABA_QR");
    assert_eq!(body["order"]["order_status"], "pending");

    // Checkout link
    let req = test::TestRequest::post()
        .uri("/api/payments/provider/checkout")
        .set_json(json!({ "order_id": order_code, "amount": "25.00" }))
        .to_request();
    let link: Value = test::call_and_read_body_json(&app, req).await;
    assert!(link["payment_url"].as_str().unwrap().starts_with("https://checkout.example.com?"));
    assert_eq!(link["payload"]["amount"], "25.00");

    // Provider confirms the payment
    let callback = signed_callback(&order_code, "TXN-8001", "SUCCESS", Money::from_cents(2500));
    let req = test::TestRequest::post().uri("/callback/provider").set_json(callback.clone()).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["detail"], "Payment verified");
    assert_eq!(body["transaction_id"], "TXN-8001");

    // A duplicate delivery is acknowledged without reprocessing
    let req = test::TestRequest::post().uri("/callback/provider").set_json(callback).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["detail"], "Transaction already processed.");

    // The order has settled exactly once
    let req = test::TestRequest::get().uri(&format!("/api/orders/{order_code}")).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["order"]["payment_status"], "paid");
    assert_eq!(body["order"]["order_status"], "confirmed");
    assert_eq!(body["order"]["payment_method"], "ABA_PAYWAY");
}

#[actix_web::test]
async fn rejected_callbacks_still_answer_200() {
    let db = test_db().await;
    let config = test_config();
    let app = test_app!(db, config);

    let product_id = seed_product(&db).await;
    let req = test::TestRequest::post().uri("/api/orders").set_json(order_body(product_id)).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let order_code = body["order"]["order_code"].as_str().unwrap().to_string();

    // Signed correctly but two cents off the total
    let callback = signed_callback(&order_code, "TXN-8002", "SUCCESS", Money::from_cents(2502));
    let req = test::TestRequest::post().uri("/callback/provider").set_json(callback).to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["detail"], "Callback logged");
    assert_eq!(body["amount_valid"], false);
    assert_eq!(body["hash_valid"], true);
}

#[actix_web::test]
async fn malformed_callbacks_are_bad_requests() {
    let db = test_db().await;
    let config = test_config();
    let app = test_app!(db, config);

    let product_id = seed_product(&db).await;
    let req = test::TestRequest::post().uri("/api/orders").set_json(order_body(product_id)).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let order_code = body["order"]["order_code"].as_str().unwrap().to_string();

    // No transaction id
    let req = test::TestRequest::post()
        .uri("/callback/provider")
        .set_json(json!({ "order_id": order_code, "status": "SUCCESS", "amount": "25.00" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);

    // Unknown order
    let req = test::TestRequest::post()
        .uri("/callback/provider")
        .set_json(json!({ "order_id": "ORD-1999-9999", "transaction_id": "TXN-X", "amount": "25.00" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);
}

#[actix_web::test]
async fn insecure_webhook_delivery_is_refused() {
    let db = test_db().await;
    let mut config = test_config();
    config.allow_insecure_webhooks = false;
    let app = test_app!(db, config);

    let req = test::TestRequest::post().uri("/callback/provider").set_json(json!({})).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[actix_web::test]
async fn decision_routes_are_idempotent() {
    let db = test_db().await;
    let config = test_config();
    let app = test_app!(db, config);

    let product_id = seed_product(&db).await;
    let req = test::TestRequest::post().uri("/api/orders").set_json(order_body(product_id)).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let order_code = body["order"]["order_code"].as_str().unwrap().to_string();

    let req = test::TestRequest::post().uri(&format!("/api/orders/{order_code}/approve")).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["processed"], true);
    assert_eq!(body["order_status"], "confirmed");
    assert_eq!(body["payment_status"], "paid");

    let req = test::TestRequest::post().uri(&format!("/api/orders/{order_code}/reject")).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["processed"], false);
    assert_eq!(body["order_status"], "confirmed");
}

#[actix_web::test]
async fn receipt_uploads_are_validated() {
    let db = test_db().await;
    let config = test_config();
    let app = test_app!(db, config);

    let req = test::TestRequest::post()
        .uri("/api/payments/receipts")
        .set_json(json!({
            "payment_id": 1,
            "file": { "name": "receipt.exe", "size_bytes": 1024, "reference": "payments/receipt.exe" }
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);
}

#[actix_web::test]
async fn chat_callbacks_drive_decisions() {
    let db = test_db().await;
    let config = test_config();
    let app = test_app!(db, config);

    let product_id = seed_product(&db).await;
    let req = test::TestRequest::post().uri("/api/orders").set_json(order_body(product_id)).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let order_id = body["order"]["id"].as_i64().unwrap();
    let order_code = body["order"]["order_code"].as_str().unwrap().to_string();

    let update = json!({
        "update_id": 1,
        "callback_query": {
            "id": "cbq-1",
            "data": format!("approve:{order_id}"),
            "message": { "message_id": 10, "chat": { "id": -100123 } }
        }
    });
    let req = test::TestRequest::post().uri("/callback/chat").set_json(update).to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = test::TestRequest::get().uri(&format!("/api/orders/{order_code}")).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["order"]["payment_status"], "paid");
    assert_eq!(body["order"]["order_status"], "confirmed");

    // Other chat traffic is acknowledged and ignored
    let req = test::TestRequest::post()
        .uri("/callback/chat")
        .set_json(json!({ "update_id": 2, "callback_query": { "id": "cbq-2", "data": "noop" } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
}
