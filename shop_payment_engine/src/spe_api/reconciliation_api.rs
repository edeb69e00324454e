//! The reconciliation engine: the component that turns external, asynchronous, partially-untrusted payment
//! signals into authoritative internal state transitions, exactly once.
//!
//! Three kinds of signal arrive here:
//! * storefront requests (new orders, checkout links, QR attempts, receipt uploads),
//! * provider webhooks (signed, possibly duplicated, possibly forged),
//! * staff and chat-bot decisions (possibly clicked twice).
//!
//! The engine validates and decides; the [`PaymentGatewayDatabase`] backend applies each decision in one atomic
//! unit of work; the [`EventProducers`] fan the committed outcome out to integrations. Notification failures can
//! never roll a state transition back — the hooks run on their own tasks after commit.

use std::fmt::Debug;

use chrono::Utc;
use log::*;
use serde_json::json;
use spg_common::{Money, Secret, USD_CURRENCY_CODE};

use crate::{
    db_types::{NewOrder, Order, OrderDecision, OrderItem, Payment, PaymentMethod},
    events::{
        EventProducers,
        OrderCreatedEvent,
        OrderDecidedEvent,
        OrderEventEnvelope,
        PaymentConfirmedEvent,
        ReceiptUploadedEvent,
    },
    helpers::{encode_query, is_provider_success, sign_checkout_fields, verify_signature, MethodAliases},
    order_objects::{
        CallbackNotice,
        CallbackOutcome,
        CheckoutLink,
        CheckoutPayload,
        CheckoutRequest,
        DecisionOutcome,
        NewOrderRequest,
        QrPaymentRequest,
    },
    spe_api::errors::ReconciliationError,
    traits::{CallbackContext, CallbackSettlement, DecisionApplication, PaymentGatewayDatabase, PaymentGatewayError},
};

/// Provider identifier recorded against hosted-payment-page attempts and journal rows.
pub const PAYWAY_PROVIDER: &str = "ABA_PAYWAY";
/// Provider identifier recorded against manually verified QR attempts.
pub const QR_MANUAL_PROVIDER: &str = "QR_MANUAL";

/// Webhook amounts may drift from the order total by provider-side rounding; anything within one cent matches.
const WEBHOOK_AMOUNT_TOLERANCE: Money = Money::from_cents(1);

/// Everything the engine needs to talk to (and verify) the hosted-payment-page provider. Built by the server from
/// its environment and injected here — the engine never reads ambient configuration.
#[derive(Debug, Clone, Default)]
pub struct CheckoutProviderConfig {
    pub merchant_id: String,
    pub api_key: Secret<String>,
    /// Base URL of the provider's hosted checkout page. The signed payload is appended as a query string.
    pub checkout_base_url: String,
    pub return_url: String,
    pub callback_url: String,
    pub currency: String,
}

impl CheckoutProviderConfig {
    fn is_configured(&self) -> bool {
        !self.merchant_id.is_empty() && !self.api_key.is_empty()
    }

    fn currency_or_default(&self) -> String {
        if self.currency.is_empty() {
            USD_CURRENCY_CODE.to_string()
        } else {
            self.currency.to_uppercase()
        }
    }
}

pub struct ReconciliationApi<B> {
    db: B,
    provider: CheckoutProviderConfig,
    aliases: MethodAliases,
    producers: EventProducers,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(db: B, provider: CheckoutProviderConfig, producers: EventProducers) -> Self {
        Self { db, provider, aliases: MethodAliases::default(), producers }
    }

    /// Replaces the default payment-method alias table. The alias set is deployment policy, not engine code.
    pub fn with_aliases(mut self, aliases: MethodAliases) -> Self {
        self.aliases = aliases;
        self
    }
}

impl<B> ReconciliationApi<B>
where B: PaymentGatewayDatabase
{
    //----------------------------------------------- Orders --------------------------------------------------------

    /// Creates a new order from a storefront submission.
    ///
    /// Items with a non-positive quantity are discarded; at least one item must survive. The payment method is
    /// normalized through the alias table. Price snapshots resolve inside the insert transaction, and the stored
    /// total is the sum of line subtotals. COD orders start out `confirmed`; every other method waits `pending`
    /// for payment proof. A receipt supplied at creation time is attached to the method's payment row.
    pub async fn process_new_order(&self, req: NewOrderRequest) -> Result<(Order, Vec<OrderItem>), ReconciliationError> {
        let method = self
            .aliases
            .normalize(&req.payment_method)
            .ok_or_else(|| ReconciliationError::UnsupportedPaymentMethod(req.payment_method.clone()))?;
        let items: Vec<_> = req.items.into_iter().filter(|item| item.quantity > 0).collect();
        if items.is_empty() {
            return Err(ReconciliationError::EmptyOrder);
        }
        let new_order = NewOrder {
            user_id: req.user_id,
            customer_name: req.customer_name.unwrap_or_default(),
            phone: req.phone.unwrap_or_default(),
            address: req.address.unwrap_or_default(),
            payment_method: method,
            note: req.note.unwrap_or_default(),
            items,
        };
        let (order, items) = self.db.insert_order(new_order).await?;
        if let Some(receipt_ref) = &req.receipt_ref {
            let provider = if method.is_qr() { QR_MANUAL_PROVIDER } else { PAYWAY_PROVIDER };
            let payment = self.db.get_or_create_payment(&order, method, provider).await?;
            self.db.attach_receipt(payment.id, receipt_ref, Utc::now()).await?;
        }
        info!("🔄️📦️ Order [{}] created: {} item(s), total {}", order.order_code, items.len(), order.total_amount);
        let event = OrderCreatedEvent { order: order.clone(), items: items.clone(), receipt_ref: req.receipt_ref };
        for emitter in &self.producers.order_created_producer {
            emitter.publish_event(event.clone()).await;
        }
        self.broadcast(OrderEventEnvelope::new("created", &order)).await;
        Ok((order, items))
    }

    /// Resolves an order by whichever identifier the client has: the generated order code first, then the raw
    /// numeric id.
    pub async fn resolve_order(&self, identifier: &str) -> Result<Order, ReconciliationError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(ReconciliationError::MissingField("order_id"));
        }
        if let Some(order) = self.db.fetch_order_by_code(identifier).await? {
            return Ok(order);
        }
        if let Ok(id) = identifier.parse::<i64>() {
            if let Some(order) = self.db.fetch_order_by_id(id).await? {
                return Ok(order);
            }
        }
        Err(ReconciliationError::OrderNotFound(identifier.to_string()))
    }

    pub async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, ReconciliationError> {
        Ok(self.db.fetch_order_items(order_id).await?)
    }

    //------------------------------------------- Checkout links ----------------------------------------------------

    /// Builds a signed checkout link for the hosted-payment-page provider.
    ///
    /// Unlike webhook matching, the requested amount must equal the order total *exactly* — bad client input is
    /// rejected outright at request time. The payment row is created or refreshed, an `INITIATED` journal entry is
    /// appended, and the order's method is pinned to the provider, all in one transaction.
    pub async fn create_checkout_link(&self, req: CheckoutRequest) -> Result<CheckoutLink, ReconciliationError> {
        if !self.provider.is_configured() {
            return Err(ReconciliationError::Configuration("merchant id and API key must be set".into()));
        }
        let order = self.resolve_order(&req.order_id).await?;
        let amount = req.amount.unwrap_or(order.total_amount);
        if !amount.is_positive() {
            return Err(ReconciliationError::InvalidAmount("Amount must be greater than zero.".into()));
        }
        if amount != order.total_amount {
            return Err(ReconciliationError::AmountMismatch { expected: order.total_amount });
        }
        let currency = req.currency.map(|c| c.to_uppercase()).unwrap_or_else(|| self.provider.currency_or_default());
        let reference = order.order_code.clone();
        let hash = sign_checkout_fields(&self.provider.merchant_id, &reference, amount, &currency, &self.provider.api_key)?;
        let payload = CheckoutPayload {
            merchant_id: self.provider.merchant_id.clone(),
            order_id: reference.clone(),
            amount: amount.format(),
            currency: currency.clone(),
            return_url: self.provider.return_url.clone(),
            callback_url: self.provider.callback_url.clone(),
            hash: hash.clone(),
        };
        let query = encode_query([
            ("merchant_id", payload.merchant_id.as_str()),
            ("order_id", payload.order_id.as_str()),
            ("amount", payload.amount.as_str()),
            ("currency", payload.currency.as_str()),
            ("return_url", payload.return_url.as_str()),
            ("callback_url", payload.callback_url.as_str()),
            ("hash", payload.hash.as_str()),
        ]);
        let base = self.provider.checkout_base_url.trim_end_matches('/');
        let separator = if base.contains('?') { "&" } else { "?" };
        let payment_url = format!("{base}{separator}{query}");

        let payload_json = json!({
            "merchant_id": payload.merchant_id,
            "order_id": payload.order_id,
            "amount": payload.amount,
            "currency": payload.currency,
            "return_url": payload.return_url,
            "callback_url": payload.callback_url,
            "hash": payload.hash,
        });
        self.db
            .checkout_initiated(&order, PaymentMethod::AbaPayway, PAYWAY_PROVIDER, amount, &currency, &hash, payload_json)
            .await?;
        info!("🔄️🔗️ Checkout link created for order [{}], amount {amount}", order.order_code);
        Ok(CheckoutLink { order_id: reference, payment_url, payload })
    }

    //--------------------------------------------- Webhooks --------------------------------------------------------

    /// Processes an inbound provider callback.
    ///
    /// The callback is accepted if and only if the provider reports success, the amount matches the order total
    /// within one cent, and the signature verifies against the server-held secret. An already-processed
    /// transaction id short-circuits into [`CallbackOutcome::AlreadyProcessed`] without mutating anything — that
    /// is the idempotency guarantee for duplicate deliveries. Everything else is recorded in the journal and
    /// reported as [`CallbackOutcome::Logged`].
    pub async fn process_provider_callback(&self, notice: CallbackNotice) -> Result<CallbackOutcome, ReconciliationError> {
        if notice.order_reference.trim().is_empty() {
            return Err(ReconciliationError::MissingField("order_id"));
        }
        let transaction_id = notice.transaction_id.trim().to_string();
        if transaction_id.is_empty() {
            return Err(ReconciliationError::MissingField("transaction_id"));
        }
        let order = self.resolve_order(&notice.order_reference).await?;
        let amount: Money =
            notice.amount_raw.parse().map_err(|e: spg_common::MoneyError| ReconciliationError::InvalidAmount(e.to_string()))?;
        let amount_valid = amount.matches(order.total_amount, WEBHOOK_AMOUNT_TOLERANCE);

        let merchant_id = notice
            .merchant_id
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(self.provider.merchant_id.as_str())
            .to_string();
        let currency = notice.currency.map(|c| c.to_uppercase()).unwrap_or_else(|| self.provider.currency_or_default());
        // Missing credentials are the operator's problem (500), never a verification failure.
        let expected =
            sign_checkout_fields(&merchant_id, &notice.order_reference, amount, &currency, &self.provider.api_key)?;
        let signature_valid = verify_signature(&notice.signature, &expected);

        if let Some(tx) = self.db.fetch_transaction(PAYWAY_PROVIDER, &transaction_id).await? {
            if tx.processed {
                info!("🔄️💳️ Transaction [{transaction_id}] replayed after processing; ignoring");
                return Ok(CallbackOutcome::AlreadyProcessed { transaction_id });
            }
        }

        let accept = is_provider_success(&notice.status_text, &notice.raw_payload) && amount_valid && signature_valid;
        let ctx = CallbackContext {
            provider: PAYWAY_PROVIDER.to_string(),
            method: PaymentMethod::AbaPayway,
            order_id: order.id,
            order_reference: notice.order_reference.clone(),
            transaction_id: transaction_id.clone(),
            amount,
            currency,
            status_text: notice.status_text.clone(),
            signature_value: notice.signature.clone(),
            signature_valid,
            raw_payload: notice.raw_payload.clone(),
            accept,
        };
        let settlement = match self.db.settle_provider_callback(ctx).await {
            Ok(settlement) => settlement,
            // A concurrent delivery won the race on the journal's uniqueness constraint. Ours rolled back whole,
            // so report the replay as already handled.
            Err(PaymentGatewayError::DuplicateTransaction(txid)) => {
                info!("🔄️💳️ Transaction [{txid}] raced a concurrent delivery; treating as already processed");
                return Ok(CallbackOutcome::AlreadyProcessed { transaction_id: txid });
            },
            Err(e) => return Err(e.into()),
        };
        match settlement {
            CallbackSettlement::AlreadyProcessed { transaction } => Ok(CallbackOutcome::AlreadyProcessed {
                transaction_id: transaction.transaction_id.unwrap_or(transaction_id),
            }),
            CallbackSettlement::Accepted { order, payment, transaction } => {
                info!("🔄️💳️ Payment verified for order [{}]: {} {}", order.order_code, payment.currency, payment.amount);
                let event = PaymentConfirmedEvent {
                    order: order.clone(),
                    payment: payment.clone(),
                    transaction: transaction.clone(),
                };
                for emitter in &self.producers.payment_confirmed_producer {
                    emitter.publish_event(event.clone()).await;
                }
                self.broadcast(
                    OrderEventEnvelope::new("payment_confirmed", &order).with_extra("payment_id", json!(payment.id)),
                )
                .await;
                Ok(CallbackOutcome::Accepted { order, transaction_id })
            },
            CallbackSettlement::Logged { order, payment, .. } => {
                warn!(
                    "🔄️💳️ Callback for order [{}] logged without settling: status '{}', signature_valid={signature_valid}, amount_valid={amount_valid}",
                    order.order_code, notice.status_text
                );
                let status =
                    if notice.status_text.is_empty() { payment.status.to_string().to_uppercase() } else { notice.status_text };
                Ok(CallbackOutcome::Logged { status, signature_valid, amount_valid })
            },
        }
    }

    //------------------------------------------ Manual payments ----------------------------------------------------

    /// Get-or-create of the working QR payment row for an order, refreshing the amount to the current total and
    /// re-pinning the order's method. The caller must own the order (or the order must be a guest order).
    pub async fn prepare_qr_payment(
        &self,
        req: QrPaymentRequest,
        requesting_user: Option<i64>,
    ) -> Result<(Payment, Order), ReconciliationError> {
        let order = self.resolve_order(&req.order_id).await?;
        check_owner(&order, requesting_user)?;
        let raw_method = req.payment_method.unwrap_or_else(|| order.payment_method.to_string());
        let method = self
            .aliases
            .normalize(&raw_method)
            .ok_or_else(|| ReconciliationError::UnsupportedPaymentMethod(raw_method))?;
        if !method.is_qr() {
            return Err(ReconciliationError::UnsupportedPaymentMethod(method.to_string()));
        }
        if let Some(amount) = req.amount {
            if amount != order.total_amount {
                return Err(ReconciliationError::AmountMismatch { expected: order.total_amount });
            }
        }
        let (payment, order) = self.db.prepare_manual_payment(&order, method, QR_MANUAL_PROVIDER).await?;
        debug!("🔄️🧾️ QR payment #{} prepared for order [{}]", payment.id, order.order_code);
        Ok((payment, order))
    }

    /// Attaches a validated receipt reference to a payment. Validation (file present, size, extension) is the
    /// caller's precondition; this flow trusts the reference it is handed.
    pub async fn upload_receipt(
        &self,
        payment_id: i64,
        receipt_ref: &str,
        requesting_user: Option<i64>,
    ) -> Result<(Payment, Order), ReconciliationError> {
        let payment =
            self.db.fetch_payment(payment_id).await?.ok_or(ReconciliationError::PaymentNotFound(payment_id))?;
        let order = self
            .db
            .fetch_order_by_id(payment.order_id)
            .await?
            .ok_or_else(|| ReconciliationError::OrderNotFound(payment.order_id.to_string()))?;
        check_owner(&order, requesting_user)?;
        let (payment, order) = self.db.attach_receipt(payment.id, receipt_ref, Utc::now()).await?;
        let items = self.db.fetch_order_items(order.id).await?;
        info!("🔄️🧾️ Receipt uploaded for payment #{} on order [{}]", payment.id, order.order_code);
        let event = ReceiptUploadedEvent { order: order.clone(), items, payment: payment.clone() };
        for emitter in &self.producers.receipt_uploaded_producer {
            emitter.publish_event(event.clone()).await;
        }
        self.broadcast(OrderEventEnvelope::new("receipt_uploaded", &order).with_extra("payment_id", json!(payment.id)))
            .await;
        Ok((payment, order))
    }

    pub async fn fetch_payment(
        &self,
        payment_id: i64,
        requesting_user: Option<i64>,
    ) -> Result<(Payment, Order), ReconciliationError> {
        let payment =
            self.db.fetch_payment(payment_id).await?.ok_or(ReconciliationError::PaymentNotFound(payment_id))?;
        let order = self
            .db
            .fetch_order_by_id(payment.order_id)
            .await?
            .ok_or_else(|| ReconciliationError::OrderNotFound(payment.order_id.to_string()))?;
        check_owner(&order, requesting_user)?;
        Ok((payment, order))
    }

    //---------------------------------------------- Decisions ------------------------------------------------------

    /// Applies a staff approve/reject decision to the order identified by code or id. Calling this twice — or
    /// racing it against a webhook settlement — is safe: a settled order reports `processed = false` and stays
    /// untouched.
    pub async fn apply_order_decision(
        &self,
        identifier: &str,
        decision: OrderDecision,
    ) -> Result<DecisionOutcome, ReconciliationError> {
        let order = self.resolve_order(identifier).await?;
        self.decide(order, decision).await
    }

    /// Handles a chat callback-button payload of the form `"approve:<id>"` / `"reject:<id>"`.
    ///
    /// The notification channel carries other traffic, so anything unrecognised — including an unknown order —
    /// returns `Ok(None)` rather than an error. Chat payloads carry the numeric id, so resolution tries the id
    /// first and falls back to the order code.
    pub async fn handle_chat_callback(&self, data: &str) -> Result<Option<DecisionOutcome>, ReconciliationError> {
        let Some((action, raw_id)) = data.split_once(':') else {
            return Ok(None);
        };
        let Ok(decision) = action.parse::<OrderDecision>() else {
            return Ok(None);
        };
        let raw_id = raw_id.trim();
        let mut order = match raw_id.parse::<i64>() {
            Ok(id) => self.db.fetch_order_by_id(id).await?,
            Err(_) => None,
        };
        if order.is_none() {
            order = self.db.fetch_order_by_code(raw_id).await?;
        }
        let Some(order) = order else {
            debug!("🔄️🤖️ Chat callback for unknown order '{raw_id}'; ignoring");
            return Ok(None);
        };
        self.decide(order, decision).await.map(Some)
    }

    async fn decide(&self, order: Order, decision: OrderDecision) -> Result<DecisionOutcome, ReconciliationError> {
        match self.db.apply_order_decision(order.id, decision).await? {
            DecisionApplication::AlreadyProcessed { order } => {
                info!("🔄️⚖️ Order [{}] already processed; decision {decision} ignored", order.order_code);
                Ok(DecisionOutcome {
                    processed: false,
                    detail: format!("Order {} already processed.", order.order_code),
                    order,
                })
            },
            DecisionApplication::Applied { order, .. } => {
                let detail = match decision {
                    OrderDecision::Approve => format!("✅ Order {} approved.", order.order_code),
                    OrderDecision::Reject => format!("❌ Order {} rejected.", order.order_code),
                };
                info!("🔄️⚖️ {detail}");
                let event = OrderDecidedEvent { order: order.clone(), decision, detail: detail.clone() };
                for emitter in &self.producers.order_decided_producer {
                    emitter.publish_event(event.clone()).await;
                }
                self.broadcast(OrderEventEnvelope::new(format!("status_{decision}"), &order)).await;
                Ok(DecisionOutcome { processed: true, detail, order })
            },
        }
    }

    async fn broadcast(&self, envelope: OrderEventEnvelope) {
        for emitter in &self.producers.broadcast_producer {
            emitter.publish_event(envelope.clone()).await;
        }
    }
}

fn check_owner(order: &Order, requesting_user: Option<i64>) -> Result<(), ReconciliationError> {
    if let (Some(owner), Some(user)) = (order.user_id, requesting_user) {
        if owner != user {
            return Err(ReconciliationError::Forbidden);
        }
    }
    Ok(())
}
