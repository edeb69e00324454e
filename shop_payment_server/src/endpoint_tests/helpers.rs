use shop_payment_engine::{
    db_types::NewProduct,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::PaymentGatewayDatabase,
    CheckoutProviderConfig,
    SqliteDatabase,
};
use spg_common::{Money, Secret};

use crate::config::ServerConfig;

pub const MERCHANT_ID: &str = "M-TEST-001";
pub const API_KEY: &str = "test-api-key";

pub async fn test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    // Test requests arrive over plain HTTP
    config.allow_insecure_webhooks = true;
    config.provider = CheckoutProviderConfig {
        merchant_id: MERCHANT_ID.to_string(),
        api_key: Secret::new(API_KEY.to_string()),
        checkout_base_url: "https://checkout.example.com".to_string(),
        return_url: "https://shop.example.com/".to_string(),
        callback_url: "https://shop.example.com/callback/provider".to_string(),
        currency: "USD".to_string(),
    };
    config
}

/// Seeds a single $10.00 product and returns its id.
pub async fn seed_product(db: &SqliteDatabase) -> i64 {
    db.insert_product(NewProduct {
        name: "Gadget".to_string(),
        price: Money::from_cents(1000),
        currency: "USD".to_string(),
    })
    .await
    .expect("Error seeding product")
    .id
}

/// Builds a test service with the full route table mounted, mirroring `create_server_instance`.
macro_rules! test_app {
    ($db:expr, $config:expr) => {{
        let api = shop_payment_engine::ReconciliationApi::new(
            $db.clone(),
            $config.provider.clone(),
            shop_payment_engine::events::EventProducers::default(),
        );
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new(api))
                .app_data(actix_web::web::Data::new($config.clone()))
                .service($crate::routes::health)
                .service(
                    actix_web::web::scope("/api")
                        .service($crate::routes::CreateOrderRoute::<shop_payment_engine::SqliteDatabase>::new())
                        .service($crate::routes::OrderByIdRoute::<shop_payment_engine::SqliteDatabase>::new())
                        .service($crate::routes::ApproveOrderRoute::<shop_payment_engine::SqliteDatabase>::new())
                        .service($crate::routes::RejectOrderRoute::<shop_payment_engine::SqliteDatabase>::new())
                        .service($crate::routes::CreateCheckoutRoute::<shop_payment_engine::SqliteDatabase>::new())
                        .service($crate::routes::CreateQrPaymentRoute::<shop_payment_engine::SqliteDatabase>::new())
                        .service($crate::routes::PaymentByIdRoute::<shop_payment_engine::SqliteDatabase>::new())
                        .service($crate::routes::UploadReceiptRoute::<shop_payment_engine::SqliteDatabase>::new()),
                )
                .service(
                    actix_web::web::scope("/callback")
                        .service($crate::routes::ProviderCallbackRoute::<shop_payment_engine::SqliteDatabase>::new())
                        .service($crate::routes::ChatCallbackRoute::<shop_payment_engine::SqliteDatabase>::new()),
                ),
        )
        .await
    }};
}
pub(crate) use test_app;
