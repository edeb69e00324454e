use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use shop_payment_engine::{events::EventProducers, ReconciliationApi, SqliteDatabase};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    routes::{
        health,
        ApproveOrderRoute,
        CreateCheckoutRoute,
        CreateOrderRoute,
        CreateQrPaymentRoute,
        OrderByIdRoute,
        PaymentByIdRoute,
        ProviderCallbackRoute,
        RejectOrderRoute,
        UploadReceiptRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let producers = start_event_handlers(&config).await;
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Starts the notification hook handlers and returns the producer set for the reconciliation API. With no chat
/// integration configured (or compiled), the producer set is empty and publishing becomes a no-op.
async fn start_event_handlers(config: &ServerConfig) -> EventProducers {
    #[cfg(feature = "telegram")]
    {
        if config.telegram.is_configured() {
            match crate::integrations::telegram::create_telegram_event_handlers(config.telegram.clone()) {
                Ok(handlers) => {
                    let producers = handlers.producers();
                    handlers.start_handlers().await;
                    info!("📬️ Telegram notification handlers started");
                    return producers;
                },
                Err(e) => warn!("📬️ Could not start the Telegram integration: {e}. Notifications are disabled."),
            }
        } else {
            info!("📬️ Telegram credentials not configured. Chat notifications are disabled.");
        }
    }
    EventProducers::default()
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    #[cfg(feature = "telegram")]
    let bot = telegram_tools::TelegramApi::new(config.telegram.clone()).ok().filter(|b| b.is_configured());
    // The worker closure takes the config by move; the bind address is needed afterwards.
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let api = ReconciliationApi::new(db.clone(), config.provider.clone(), producers.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("spg::access_log"))
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(config.clone()));
        #[cfg(feature = "telegram")]
        let app = match &bot {
            Some(bot) => app.app_data(web::Data::new(bot.clone())),
            None => app,
        };
        let api_scope = web::scope("/api")
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(ApproveOrderRoute::<SqliteDatabase>::new())
            .service(RejectOrderRoute::<SqliteDatabase>::new())
            .service(CreateCheckoutRoute::<SqliteDatabase>::new())
            .service(CreateQrPaymentRoute::<SqliteDatabase>::new())
            .service(PaymentByIdRoute::<SqliteDatabase>::new())
            .service(UploadReceiptRoute::<SqliteDatabase>::new());
        let callback_scope = web::scope("/callback").service(ProviderCallbackRoute::<SqliteDatabase>::new());
        #[cfg(feature = "telegram")]
        let callback_scope = callback_scope.service(crate::routes::ChatCallbackRoute::<SqliteDatabase>::new());
        app.service(health).service(api_scope).service(callback_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
