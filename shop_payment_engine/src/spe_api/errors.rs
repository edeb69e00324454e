use spg_common::Money;
use thiserror::Error;

use crate::{helpers::SignatureError, traits::PaymentGatewayError};

/// The error taxonomy of the reconciliation engine.
///
/// The split matters at the HTTP boundary: `Configuration` is operator-fixable and maps to 500, the validation
/// class maps to 400, `OrderNotFound`/`PaymentNotFound` to 404, `Forbidden` to 403, `DatabaseError` to 500. A
/// logically rejected webhook is *not* an error — it is reported as a successful
/// [`CallbackOutcome::Logged`](crate::order_objects::CallbackOutcome) so the provider does not retry — and an
/// already-processed replay is likewise a successful no-op outcome.
#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("Provider credentials are not configured on the server. {0}")]
    Configuration(String),
    #[error("Order items are required.")]
    EmptyOrder,
    #[error("Order total must be greater than zero.")]
    TotalNotPositive,
    #[error("Unsupported payment method: {0}")]
    UnsupportedPaymentMethod(String),
    #[error("Invalid amount supplied. {0}")]
    InvalidAmount(String),
    #[error("Amount does not match order total. Expected {expected}.")]
    AmountMismatch { expected: Money },
    #[error("{0} is required.")]
    MissingField(&'static str),
    #[error("Order not found: {0}")]
    OrderNotFound(String),
    #[error("Payment not found: {0}")]
    PaymentNotFound(i64),
    #[error("Product not found for order item (product id {0})")]
    ProductNotFound(i64),
    #[error("You do not have permission to access this order.")]
    Forbidden,
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<PaymentGatewayError> for ReconciliationError {
    fn from(e: PaymentGatewayError) -> Self {
        match e {
            PaymentGatewayError::OrderIdNotFound(id) => ReconciliationError::OrderNotFound(id.to_string()),
            PaymentGatewayError::PaymentNotFound(id) => ReconciliationError::PaymentNotFound(id),
            PaymentGatewayError::ProductNotFound(id) => ReconciliationError::ProductNotFound(id),
            PaymentGatewayError::OrderTotalNotPositive => ReconciliationError::TotalNotPositive,
            PaymentGatewayError::DatabaseError(s) => ReconciliationError::DatabaseError(s),
            // Concurrent duplicates are normally converted to an "already processed" outcome before they reach
            // this conversion; anything left over is a backend problem.
            PaymentGatewayError::DuplicateTransaction(txid) => {
                ReconciliationError::DatabaseError(format!("Duplicate journal entry for transaction {txid}"))
            },
        }
    }
}

impl From<SignatureError> for ReconciliationError {
    fn from(e: SignatureError) -> Self {
        ReconciliationError::Configuration(e.to_string())
    }
}
