use serde_json::Value;
use spg_common::Money;

use crate::db_types::{Order, Payment, PaymentMethod, PaymentTransaction};

/// Everything the backend needs to settle a provider callback in one transaction. The policy decision (`accept`)
/// has already been taken by the reconciliation engine; the backend's job is to apply it atomically and exactly
/// once.
#[derive(Debug, Clone)]
pub struct CallbackContext {
    pub provider: String,
    pub method: PaymentMethod,
    pub order_id: i64,
    /// The order reference verbatim as the provider sent it.
    pub order_reference: String,
    pub transaction_id: String,
    pub amount: Money,
    pub currency: String,
    /// The provider's raw status string. Empty means the provider sent none.
    pub status_text: String,
    pub signature_value: String,
    pub signature_valid: bool,
    pub raw_payload: Value,
    pub accept: bool,
}

/// The outcome of [`settle_provider_callback`](crate::traits::PaymentGatewayDatabase::settle_provider_callback).
#[derive(Debug, Clone)]
pub enum CallbackSettlement {
    /// The journal already holds a processed row for this transaction id. Nothing was mutated.
    AlreadyProcessed { transaction: PaymentTransaction },
    /// The callback was accepted: payment verified, order settled, journal row marked processed.
    Accepted { order: Order, payment: Payment, transaction: PaymentTransaction },
    /// The callback was recorded and rejected: journal row stored unprocessed, payment marked failed/rejected,
    /// order untouched.
    Logged { order: Order, payment: Payment, transaction: PaymentTransaction },
}

/// The outcome of [`apply_order_decision`](crate::traits::PaymentGatewayDatabase::apply_order_decision).
#[derive(Debug, Clone)]
pub enum DecisionApplication {
    /// The order was already settled; the decision was a no-op.
    AlreadyProcessed { order: Order },
    /// The decision was applied to the order and mirrored onto its payments.
    Applied { order: Order, payments: Vec<Payment> },
}
