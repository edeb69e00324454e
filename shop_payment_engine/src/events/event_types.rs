use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use spg_common::Money;

use crate::db_types::{Order, OrderDecision, OrderItem, OrderStatus, Payment, PaymentMethod, PaymentTransaction, SettlementStatus};

/// A new order has been persisted, together with its line items and, when the client attached proof of payment at
/// creation time, the receipt reference.
#[derive(Debug, Clone)]
pub struct OrderCreatedEvent {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub receipt_ref: Option<String>,
}

/// A customer uploaded (or replaced) a payment receipt.
#[derive(Debug, Clone)]
pub struct ReceiptUploadedEvent {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payment: Payment,
}

/// A provider webhook was accepted and the order settled. Fired after the settlement transaction has committed.
#[derive(Debug, Clone)]
pub struct PaymentConfirmedEvent {
    pub order: Order,
    pub payment: Payment,
    pub transaction: PaymentTransaction,
}

/// A staff or chat decision was applied to an order.
#[derive(Debug, Clone)]
pub struct OrderDecidedEvent {
    pub order: Order,
    pub decision: OrderDecision,
    pub detail: String,
}

/// The delivery contract for the realtime subscriber bus: a flat, serializable summary of an order event, pushed
/// to a topic keyed by order and, when present, by the owning user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEventEnvelope {
    pub event: String,
    pub order_id: i64,
    pub order_code: String,
    pub order_status: OrderStatus,
    pub payment_status: SettlementStatus,
    pub payment_method: PaymentMethod,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OrderEventEnvelope {
    pub fn new<S: Into<String>>(event: S, order: &Order) -> Self {
        Self {
            event: event.into(),
            order_id: order.id,
            order_code: order.order_code.clone(),
            order_status: order.order_status,
            payment_status: order.payment_status,
            payment_method: order.payment_method,
            total_amount: order.total_amount,
            created_at: order.created_at,
            user_id: order.user_id,
            extra: Map::new(),
        }
    }

    pub fn with_extra<S: Into<String>>(mut self, key: S, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}
