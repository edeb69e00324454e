use serde::{Deserialize, Serialize};
use serde_json::Value;
use spg_common::Money;

use crate::db_types::{NewOrderItem, Order, OrderItem, Payment};

/// A storefront order submission. The payment method arrives as a raw client string and is normalized through the
/// alias table; missing customer fields default to empty, matching guest checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderRequest {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default, alias = "name")]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub payment_method: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub items: Vec<NewOrderItem>,
    /// Proof of payment attached at creation time (already stored by the receipt-storage collaborator).
    #[serde(default)]
    pub receipt_ref: Option<String>,
}

/// A request for a provider checkout link. The client may identify the order by code or by raw id, and may echo
/// the amount back for an exact-match sanity check.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    #[serde(alias = "order_code")]
    pub order_id: String,
    #[serde(default)]
    pub amount: Option<Money>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// The signed payload appended to the checkout base URL. Field order is the canonical signing order.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutPayload {
    pub merchant_id: String,
    pub order_id: String,
    pub amount: String,
    pub currency: String,
    pub return_url: String,
    pub callback_url: String,
    pub hash: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutLink {
    pub order_id: String,
    pub payment_url: String,
    pub payload: CheckoutPayload,
}

/// A provider callback after boundary validation: the raw fields the webhook handler extracted, plus the complete
/// payload for the audit trail. Amount stays raw here — parsing it is part of the reconciliation flow, because an
/// unparseable amount must be answered differently (400) from a mismatched one (logged 200).
#[derive(Debug, Clone)]
pub struct CallbackNotice {
    pub order_reference: String,
    pub transaction_id: String,
    /// The provider's status string, upper-cased; empty when the provider sent none.
    pub status_text: String,
    pub amount_raw: String,
    pub currency: Option<String>,
    pub merchant_id: Option<String>,
    pub signature: String,
    pub raw_payload: Value,
}

impl CallbackNotice {
    /// Extracts the known fields from a raw webhook body, keeping the complete body for the audit trail.
    ///
    /// The provider's API versions disagree on field names, so each field is probed under its known aliases in
    /// preference order; numbers are accepted where strings are expected. Nothing is rejected here — required
    /// fields are enforced by the reconciliation flow, where missing and malformed input get distinct answers.
    pub fn from_payload(raw: Value) -> Self {
        let order_reference = string_field(&raw, &["order_id", "order_code"]).unwrap_or_default();
        let transaction_id = string_field(&raw, &["transaction_id", "tran_id", "trans_id"]).unwrap_or_default();
        let status_text = string_field(&raw, &["status", "status_code", "response_code", "result"])
            .map(|s| s.to_uppercase())
            .unwrap_or_default();
        let amount_raw = string_field(&raw, &["amount"]).unwrap_or_default();
        let currency = string_field(&raw, &["currency"]);
        let merchant_id = string_field(&raw, &["merchant_id"]);
        let signature = string_field(&raw, &["hash", "signature"]).unwrap_or_default();
        Self { order_reference, transaction_id, status_text, amount_raw, currency, merchant_id, signature, raw_payload: raw }
    }
}

fn string_field(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|key| raw.get(*key)).find_map(|value| match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn callback_fields_are_probed_under_their_aliases() {
        let notice = CallbackNotice::from_payload(json!({
            "order_code": "ORD-2025-0007",
            "tran_id": 123456,
            "response_code": "00",
            "amount": 25.0,
            "signature": "abc123",
        }));
        assert_eq!(notice.order_reference, "ORD-2025-0007");
        assert_eq!(notice.transaction_id, "123456");
        assert_eq!(notice.status_text, "00");
        assert_eq!(notice.amount_raw, "25.0");
        assert_eq!(notice.signature, "abc123");
        assert!(notice.currency.is_none());
    }

    #[test]
    fn missing_fields_stay_empty() {
        let notice = CallbackNotice::from_payload(json!({ "status": null, "order_id": "  " }));
        assert!(notice.order_reference.is_empty());
        assert!(notice.transaction_id.is_empty());
        assert!(notice.status_text.is_empty());
    }
}

/// The reconciliation verdict on a provider callback. All three variants are successful HTTP outcomes.
#[derive(Debug, Clone)]
pub enum CallbackOutcome {
    /// A replay of a transaction that has already been processed. Nothing was mutated.
    AlreadyProcessed { transaction_id: String },
    /// The payment was verified and the order settled.
    Accepted { order: Order, transaction_id: String },
    /// The callback was recorded and rejected; the response reports the raw status and both validity flags.
    Logged { status: String, signature_valid: bool, amount_valid: bool },
}

/// A request to prepare a manual QR payment attempt for an order.
#[derive(Debug, Clone, Deserialize)]
pub struct QrPaymentRequest {
    #[serde(alias = "order_code")]
    pub order_id: String,
    #[serde(default, alias = "method")]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub amount: Option<Money>,
}

/// The result of a staff or chat decision. `processed = false` means the order was already settled and nothing
/// changed — a successful no-op, not an error.
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub processed: bool,
    pub detail: String,
    pub order: Order,
}

/// An order with its line items, as returned to the storefront after creation.
#[derive(Debug, Clone, Serialize)]
pub struct OrderResult {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// A payment with its owning order, as returned by the payment endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentResult {
    pub payment: Payment,
    pub order: Order,
}
