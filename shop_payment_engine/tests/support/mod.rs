//! Shared scaffolding for the integration suites: a throw-away SQLite database per test, a seeded product
//! catalogue and a reconciliation API wired with known provider credentials.
#![allow(dead_code)]

use log::*;
use shop_payment_engine::{
    db_types::{NewOrderItem, NewProduct, Product},
    events::EventProducers,
    traits::PaymentGatewayDatabase,
    order_objects::NewOrderRequest,
    CheckoutProviderConfig,
    ReconciliationApi,
    SqliteDatabase,
};
use spg_common::{Money, Secret};
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub const MERCHANT_ID: &str = "M-TEST-001";
pub const API_KEY: &str = "test-api-key";

pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    if let Err(e) = Sqlite::drop_database(url).await {
        warn!("Error dropping database {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.run_migrations().await.expect("Error running DB migrations");
    // Close this throwaway migration pool deterministically: a pool left to drop lazily keeps its WAL read
    // snapshot open on the file, and the real pool opened next races it into SQLITE_BUSY_SNAPSHOT.
    db.pool().close().await;
}

pub fn random_db_path() -> String {
    format!("sqlite://../data/test_store_{}.db", rand::random::<u64>())
}

pub async fn new_test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

pub fn provider_config() -> CheckoutProviderConfig {
    CheckoutProviderConfig {
        merchant_id: MERCHANT_ID.to_string(),
        api_key: Secret::new(API_KEY.to_string()),
        checkout_base_url: "https://checkout.example.com".to_string(),
        return_url: "https://shop.example.com/".to_string(),
        callback_url: "https://shop.example.com/api/payments/provider/callback".to_string(),
        currency: "USD".to_string(),
    }
}

pub fn new_api(db: SqliteDatabase) -> ReconciliationApi<SqliteDatabase> {
    ReconciliationApi::new(db, provider_config(), EventProducers::default())
}

/// Seeds three products: a $10.00 gadget, a $5.00 widget and a $3.50 trinket.
pub async fn seed_products(db: &SqliteDatabase) -> Vec<Product> {
    let mut products = Vec::new();
    for (name, cents) in [("Gadget", 1000), ("Widget", 500), ("Trinket", 350)] {
        let product = db
            .insert_product(NewProduct {
                name: name.to_string(),
                price: Money::from_cents(cents),
                currency: "USD".to_string(),
            })
            .await
            .expect("Error seeding product");
        products.push(product);
    }
    products
}

pub fn item(product_id: i64, quantity: i64, price_cents: Option<i64>) -> NewOrderItem {
    NewOrderItem { product_id, product_name: None, price: price_cents.map(Money::from_cents), quantity }
}

pub fn order_request(method: &str, items: Vec<NewOrderItem>) -> NewOrderRequest {
    NewOrderRequest {
        user_id: None,
        customer_name: Some("Sokha Chan".to_string()),
        phone: Some("+855 12 345 678".to_string()),
        address: Some("St 118, Phnom Penh".to_string()),
        payment_method: method.to_string(),
        note: None,
        items,
        receipt_ref: None,
    }
}
