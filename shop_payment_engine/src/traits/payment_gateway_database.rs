use chrono::{DateTime, Utc};
use serde_json::Value;
use spg_common::Money;
use thiserror::Error;

use crate::{
    db_types::{NewOrder, NewProduct, Order, OrderDecision, OrderItem, Payment, PaymentMethod, PaymentTransaction, Product},
    traits::{CallbackContext, CallbackSettlement, DecisionApplication},
};

/// The contract a storage backend must fulfil to drive the reconciliation engine.
///
/// Every method that represents a state transition is atomic: the backend wraps it in a single transaction so the
/// order, payment and journal rows it touches commit together or not at all. Read methods take plain connections.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase: Clone {
    /// The URL of the database.
    fn url(&self) -> &str;

    //------------------------------------------ Catalog (snapshot source) ------------------------------------------

    async fn insert_product(&self, product: NewProduct) -> Result<Product, PaymentGatewayError>;

    async fn fetch_product(&self, id: i64) -> Result<Option<Product>, PaymentGatewayError>;

    //------------------------------------------------- Orders ------------------------------------------------------

    /// Takes a new order and, in a single atomic transaction:
    /// * resolves every item's snapshot name and unit price (live product values when the caller omitted them —
    ///   an item whose price cannot be resolved is an error),
    /// * computes subtotals and the order total (which must be positive),
    /// * inserts the order and its items,
    /// * assigns the permanent, year-scoped order code derived from the new surrogate id.
    ///
    /// Returns the stored order and its items, with the code already assigned.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, Vec<OrderItem>), PaymentGatewayError>;

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, PaymentGatewayError>;

    async fn fetch_order_by_code(&self, code: &str) -> Result<Option<Order>, PaymentGatewayError>;

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, PaymentGatewayError>;

    //------------------------------------------------ Payments -----------------------------------------------------

    async fn fetch_payment(&self, id: i64) -> Result<Option<Payment>, PaymentGatewayError>;

    async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, PaymentGatewayError>;

    /// Returns the working payment row for (order, method), creating it with status `pending` if absent. The
    /// amount and currency are refreshed to the order's current total either way, covering the case where the
    /// total changed after an earlier, abandoned attempt.
    async fn get_or_create_payment(
        &self,
        order: &Order,
        method: PaymentMethod,
        provider: &str,
    ) -> Result<Payment, PaymentGatewayError>;

    /// Attaches a validated receipt reference to a payment. A previously rejected or failed payment goes back to
    /// `pending` (fresh proof supersedes a stale rejection) but a verified payment is never reset. The owning
    /// order's payment status returns to `pending` unless the order is already paid.
    ///
    /// Returns the updated payment and order.
    async fn attach_receipt(
        &self,
        payment_id: i64,
        receipt_ref: &str,
        uploaded_at: DateTime<Utc>,
    ) -> Result<(Payment, Order), PaymentGatewayError>;

    /// Get-or-create for a manual QR attempt: refreshes the payment row to the order's current total and re-pins
    /// the order's payment method. The order's payment status returns to `pending` unless the order is already
    /// paid.
    async fn prepare_manual_payment(
        &self,
        order: &Order,
        method: PaymentMethod,
        provider: &str,
    ) -> Result<(Payment, Order), PaymentGatewayError>;

    //------------------------------------------------- Journal -----------------------------------------------------

    async fn fetch_transaction(
        &self,
        provider: &str,
        transaction_id: &str,
    ) -> Result<Option<PaymentTransaction>, PaymentGatewayError>;

    /// Records an outbound checkout-link creation in one transaction: the payment row for (order, provider method)
    /// is created or refreshed with the signed payload and any stale transaction id cleared, an `INITIATED`
    /// journal row is appended, and the order's payment method is pinned to the provider method if it differs.
    async fn checkout_initiated(
        &self,
        order: &Order,
        method: PaymentMethod,
        provider: &str,
        amount: Money,
        currency: &str,
        signature: &str,
        payload: Value,
    ) -> Result<(Payment, PaymentTransaction), PaymentGatewayError>;

    /// Settles an inbound provider callback in one atomic transaction.
    ///
    /// The `processed` flag is re-checked inside the transaction, so two concurrent deliveries of the same
    /// transaction id cannot both take the accept path: the second either observes `processed = true` and
    /// short-circuits, or trips the journal's uniqueness constraint and surfaces as
    /// [`PaymentGatewayError::DuplicateTransaction`].
    async fn settle_provider_callback(&self, ctx: CallbackContext) -> Result<CallbackSettlement, PaymentGatewayError>;

    //------------------------------------------------ Decisions ----------------------------------------------------

    /// Applies a staff/chat approve-reject decision atomically. A settled order produces
    /// [`DecisionApplication::AlreadyProcessed`] without mutation. Otherwise:
    /// * approve: order confirmed + paid; every payment row verified with `paid_at` set;
    /// * reject: payment axis failed; the order is cancelled outright only for cash-on-delivery (other methods may
    ///   retry payment, so the order stays pending); every payment row rejected with `paid_at` cleared.
    async fn apply_order_decision(
        &self,
        order_id: i64,
        decision: OrderDecision,
    ) -> Result<DecisionApplication, PaymentGatewayError>;
}

#[derive(Debug, Error)]
pub enum PaymentGatewayError {
    #[error("We have an internal database engine problem (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderIdNotFound(i64),
    #[error("The requested payment (id {0}) does not exist")]
    PaymentNotFound(i64),
    #[error("Product not found for order item (product id {0})")]
    ProductNotFound(i64),
    #[error("Order total must be greater than zero")]
    OrderTotalNotPositive,
    #[error("A journal entry for transaction id {0} already exists")]
    DuplicateTransaction(String),
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}
