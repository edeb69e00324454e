//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Webhook handlers have a contract of their own: the provider retries any non-2xx response, so a logically
//! rejected callback (bad signature, wrong amount, failed status) is answered with 200 and a failure detail.
//! Only malformed requests (missing fields, unparseable amounts) get a 400, unknown orders a 404, and missing
//! server credentials a 500.

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use serde_json::json;
use shop_payment_engine::{
    db_types::OrderDecision,
    order_objects::{CallbackNotice, CallbackOutcome, CheckoutRequest, NewOrderRequest, OrderResult, PaymentResult},
    traits::PaymentGatewayDatabase,
    ReconciliationApi,
};
#[cfg(feature = "telegram")]
use telegram_tools::{CallbackQuery, InlineKeyboard, TelegramApi, TelegramUpdate};

use crate::{
    config::ServerConfig,
    data_objects::{DecisionResponse, QrPaymentBody, ReceiptUploadRequest, UserContext},
    errors::ServerError,
    helpers::{is_secure_delivery, validate_receipt_upload},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------

#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ----------------------------------------------   Orders  ----------------------------------------------------

route!(create_order => Post "/orders" impl PaymentGatewayDatabase);
/// Accepts a storefront order submission: customer details, line items, a payment-method alias and, optionally, a
/// receipt reference captured at checkout time.
pub async fn create_order<B: PaymentGatewayDatabase>(
    body: web::Json<NewOrderRequest>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (order, items) = api.process_new_order(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(OrderResult { order, items }))
}

route!(order_by_id => Get "/orders/{id}" impl PaymentGatewayDatabase);
pub async fn order_by_id<B: PaymentGatewayDatabase>(
    path: web::Path<String>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order = api.resolve_order(&path.into_inner()).await?;
    let items = api.fetch_order_items(order.id).await?;
    Ok(HttpResponse::Ok().json(OrderResult { order, items }))
}

// ---------------------------------------------   Decisions  --------------------------------------------------

route!(approve_order => Post "/orders/{id}/approve" impl PaymentGatewayDatabase);
pub async fn approve_order<B: PaymentGatewayDatabase>(
    path: web::Path<String>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    apply_decision(&path.into_inner(), OrderDecision::Approve, api.as_ref()).await
}

route!(reject_order => Post "/orders/{id}/reject" impl PaymentGatewayDatabase);
pub async fn reject_order<B: PaymentGatewayDatabase>(
    path: web::Path<String>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    apply_decision(&path.into_inner(), OrderDecision::Reject, api.as_ref()).await
}

/// Decisions are idempotent: an already-settled order answers 200 with `processed = false` rather than an error,
/// so duplicate staff clicks and racing chat callbacks stay harmless.
async fn apply_decision<B: PaymentGatewayDatabase>(
    identifier: &str,
    decision: OrderDecision,
    api: &ReconciliationApi<B>,
) -> Result<HttpResponse, ServerError> {
    let outcome = api.apply_order_decision(identifier, decision).await?;
    let response = DecisionResponse::new(outcome.detail, &outcome.order, outcome.processed);
    Ok(HttpResponse::Ok().json(response))
}

// ---------------------------------------------   Payments  ---------------------------------------------------

route!(create_checkout => Post "/payments/provider/checkout" impl PaymentGatewayDatabase);
/// Staff- or client-triggered creation of a signed hosted-checkout link for an order.
pub async fn create_checkout<B: PaymentGatewayDatabase>(
    body: web::Json<CheckoutRequest>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let link = api.create_checkout_link(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(link))
}

route!(create_qr_payment => Post "/payments/qr" impl PaymentGatewayDatabase);
pub async fn create_qr_payment<B: PaymentGatewayDatabase>(
    body: web::Json<QrPaymentBody>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let body = body.into_inner();
    let (payment, order) = api.prepare_qr_payment(body.request, body.user_id).await?;
    Ok(HttpResponse::Created().json(PaymentResult { payment, order }))
}

route!(payment_by_id => Get "/payments/{id}" impl PaymentGatewayDatabase);
pub async fn payment_by_id<B: PaymentGatewayDatabase>(
    path: web::Path<i64>,
    query: web::Query<UserContext>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (payment, order) = api.fetch_payment(path.into_inner(), query.user_id).await?;
    Ok(HttpResponse::Ok().json(PaymentResult { payment, order }))
}

route!(upload_receipt => Post "/payments/receipts" impl PaymentGatewayDatabase);
/// Attaches an uploaded receipt to a payment. The file itself was stored by the receipt-storage collaborator;
/// this endpoint validates the metadata and records the reference.
pub async fn upload_receipt<B: PaymentGatewayDatabase>(
    body: web::Json<ReceiptUploadRequest>,
    api: web::Data<ReconciliationApi<B>>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    validate_receipt_upload(&request.file, &config.receipt)?;
    let (payment, order) = api.upload_receipt(request.payment_id, &request.file.reference, request.user_id).await?;
    Ok(HttpResponse::Ok().json(PaymentResult { payment, order }))
}

// ---------------------------------------------   Webhooks  ---------------------------------------------------

route!(provider_callback => Post "/provider" impl PaymentGatewayDatabase);
/// The payment provider's webhook. Always answers 200 for logically-handled callbacks — including rejections and
/// replays — so the provider's retry logic does not escalate.
pub async fn provider_callback<B: PaymentGatewayDatabase>(
    req: HttpRequest,
    body: web::Json<serde_json::Value>,
    api: web::Data<ReconciliationApi<B>>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError> {
    trace!("💳️ Received provider callback: {}", req.uri());
    if !is_secure_delivery(&req) && !config.allow_insecure_webhooks {
        return Err(ServerError::InvalidRequestBody("Webhook must be served over HTTPS.".into()));
    }
    let notice = CallbackNotice::from_payload(body.into_inner());
    let outcome = api.process_provider_callback(notice).await?;
    let response = match outcome {
        CallbackOutcome::Accepted { order, transaction_id } => {
            info!("💳️ Payment verified for order [{}]", order.order_code);
            json!({ "detail": "Payment verified", "transaction_id": transaction_id })
        },
        CallbackOutcome::AlreadyProcessed { transaction_id } => {
            json!({ "detail": "Transaction already processed.", "transaction_id": transaction_id })
        },
        CallbackOutcome::Logged { status, signature_valid, amount_valid } => json!({
            "detail": "Callback logged",
            "status": status,
            "hash_valid": signature_valid,
            "amount_valid": amount_valid,
        }),
    };
    Ok(HttpResponse::Ok().json(response))
}

#[cfg(feature = "telegram")]
route!(chat_callback => Post "/chat" impl PaymentGatewayDatabase);
/// The chat-bot's update webhook. Only `"approve:<id>"` / `"reject:<id>"` callback buttons are acted on; the
/// channel carries other traffic, so everything else — including unknown orders — is acknowledged with 200 and no
/// action. The button acknowledgement, keyboard strip and confirmation message are best-effort: they run on their
/// own task and can never fail the decision.
#[cfg(feature = "telegram")]
pub async fn chat_callback<B: PaymentGatewayDatabase>(
    body: web::Json<TelegramUpdate>,
    api: web::Data<ReconciliationApi<B>>,
    bot: Option<web::Data<TelegramApi>>,
) -> Result<HttpResponse, ServerError> {
    let update = body.into_inner();
    let Some(callback) = update.callback_query else {
        return Ok(HttpResponse::Ok().finish());
    };
    let Some(data) = callback.data.clone().filter(|d| !d.is_empty()) else {
        return Ok(HttpResponse::Ok().finish());
    };
    match api.handle_chat_callback(&data).await? {
        Some(outcome) => {
            if let Some(bot) = bot.filter(|b| b.is_configured()) {
                let bot = bot.get_ref().clone();
                let detail = outcome.detail.clone();
                tokio::spawn(async move {
                    acknowledge_chat_action(bot, callback, detail).await;
                });
            }
            Ok(HttpResponse::Ok().finish())
        },
        None => Ok(HttpResponse::Ok().finish()),
    }
}

#[cfg(feature = "telegram")]
async fn acknowledge_chat_action(bot: TelegramApi, callback: CallbackQuery, detail: String) {
    if let Err(e) = bot.answer_callback_query(&callback.id, &detail).await {
        warn!("🤖️ Failed to acknowledge the chat button press: {e}");
    }
    match &callback.message {
        Some(message) => {
            // Strip the inline buttons so the prompt cannot be clicked twice
            if let Err(e) = bot.edit_message_reply_markup(message.chat.id, message.message_id, &InlineKeyboard::empty()).await
            {
                warn!("🤖️ Failed to remove the chat buttons: {e}");
            }
            if let Err(e) = bot.send_message_to(&message.chat.id.to_string(), &detail, None).await {
                warn!("🤖️ Failed to post the chat confirmation: {e}");
            }
        },
        None => {
            if let Err(e) = bot.send_message(&detail, None).await {
                warn!("🤖️ Failed to post the chat confirmation: {e}");
            }
        },
    }
}
