use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use spg_common::Money;
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ConversionError(pub String);

//--------------------------------------    PaymentMethod     ---------------------------------------------------------
/// The payment rails a customer can settle an order with. `COD` needs no payment gate; the two QR methods are
/// settled manually against an uploaded receipt; `ABA_PAYWAY` is the hosted-payment-page provider with webhook
/// confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[sqlx(rename = "COD")]
    #[serde(rename = "COD")]
    CashOnDelivery,
    #[sqlx(rename = "ABA_QR")]
    #[serde(rename = "ABA_QR")]
    AbaQr,
    #[sqlx(rename = "AC_QR")]
    #[serde(rename = "AC_QR")]
    AcQr,
    #[sqlx(rename = "ABA_PAYWAY")]
    #[serde(rename = "ABA_PAYWAY")]
    AbaPayway,
}

impl PaymentMethod {
    pub fn is_cash_on_delivery(&self) -> bool {
        matches!(self, PaymentMethod::CashOnDelivery)
    }

    pub fn is_qr(&self) -> bool {
        matches!(self, PaymentMethod::AbaQr | PaymentMethod::AcQr)
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentMethod::CashOnDelivery => "COD",
            PaymentMethod::AbaQr => "ABA_QR",
            PaymentMethod::AcQr => "AC_QR",
            PaymentMethod::AbaPayway => "ABA_PAYWAY",
        };
        write!(f, "{s}")
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COD" => Ok(Self::CashOnDelivery),
            "ABA_QR" => Ok(Self::AbaQr),
            "AC_QR" => Ok(Self::AcQr),
            "ABA_PAYWAY" => Ok(Self::AbaPayway),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------    OrderStatus       ---------------------------------------------------------
/// The fulfilment axis of an order. Tracked independently of [`SettlementStatus`], but the two are constrained
/// jointly by the reconciliation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// The order exists but is awaiting payment proof.
    Pending,
    /// The order has been accepted (payment received or not needed up front).
    Confirmed,
    /// The order has been handed to the courier.
    Shipping,
    /// The order has been delivered.
    Completed,
    /// The order has been cancelled by staff or by a rejected COD decision.
    Cancelled,
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipping => "shipping",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "shipping" => Ok(Self::Shipping),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------  SettlementStatus    ---------------------------------------------------------
/// The payment axis of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    Pending,
    Paid,
    Failed,
}

impl Display for SettlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SettlementStatus::Pending => "pending",
            SettlementStatus::Paid => "paid",
            SettlementStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

//--------------------------------------    PaymentStatus     ---------------------------------------------------------
/// The verification state of a single payment attempt in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Verified,
    Rejected,
    Failed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Verified => "verified",
            PaymentStatus::Rejected => "rejected",
            PaymentStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

//--------------------------------------       Product        ---------------------------------------------------------
/// A minimal product record. Order items snapshot the name and price at order time; the live product is only
/// consulted when the caller omits an explicit unit price.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: Money,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price: Money,
    pub currency: String,
}

//--------------------------------------        Order         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Order {
    pub id: i64,
    /// Human-readable, year-scoped unique code, e.g. `ORD-2025-0042`. Assigned exactly once, immediately after the
    /// order receives its surrogate id, and immutable thereafter.
    pub order_code: String,
    pub user_id: Option<i64>,
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    pub total_amount: Money,
    pub payment_method: PaymentMethod,
    pub payment_status: SettlementStatus,
    pub order_status: OrderStatus,
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// An order is terminal for reconciliation once its payment axis has resolved, or its fulfilment axis has
    /// closed. Further approve/reject decisions and webhook deliveries must become no-ops.
    pub fn is_settled(&self) -> bool {
        matches!(self.payment_status, SettlementStatus::Paid | SettlementStatus::Failed)
            || matches!(self.order_status, OrderStatus::Cancelled | OrderStatus::Completed)
    }
}

impl Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Order {} [{}/{}] {} {}",
            self.order_code, self.order_status, self.payment_status, self.total_amount, self.payment_method
        )
    }
}

//--------------------------------------       NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Option<i64>,
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    pub payment_method: PaymentMethod,
    pub note: String,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn new(payment_method: PaymentMethod, items: Vec<NewOrderItem>) -> Self {
        Self {
            user_id: None,
            customer_name: String::new(),
            phone: String::new(),
            address: String::new(),
            payment_method,
            note: String::new(),
            items,
        }
    }

    /// COD orders need no payment gate and start out confirmed; everything else waits for payment proof.
    pub fn initial_order_status(&self) -> OrderStatus {
        if self.payment_method.is_cash_on_delivery() {
            OrderStatus::Confirmed
        } else {
            OrderStatus::Pending
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderItem {
    pub product_id: i64,
    /// Snapshot name. Defaults to the live product name when omitted.
    #[serde(default)]
    pub product_name: Option<String>,
    /// Snapshot unit price. Defaults to the live product price when omitted; an order item with no resolvable
    /// price is an error.
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default, alias = "qty")]
    pub quantity: i64,
}

//--------------------------------------      OrderItem       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub price: Money,
    pub quantity: i64,
    pub subtotal: Money,
}

//--------------------------------------       Payment        ---------------------------------------------------------
/// One payment attempt against an order. At most one working row exists per (order, method) pair; retries refresh
/// the row while the journal keeps the per-attempt history.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub method: PaymentMethod,
    pub amount: Money,
    pub receipt_ref: Option<String>,
    pub receipt_uploaded_at: Option<DateTime<Utc>>,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub currency: String,
    pub provider: String,
    pub transaction_id: Option<String>,
    pub signature_value: String,
    pub signature_valid: bool,
    pub raw_payload: Json<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------  PaymentTransaction  ---------------------------------------------------------
/// Append-only journal of every inbound provider callback and outbound checkout-creation event.
///
/// The pair (provider, transaction_id) is the dedup key. Once a row is `processed`, any later callback carrying
/// the same transaction id is a no-op replay. Rows are written once and enriched at most once (INITIATED rows gain
/// their transaction id when the provider calls back); they are never deleted.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentTransaction {
    pub id: i64,
    pub provider: String,
    pub order_id: i64,
    pub payment_id: Option<i64>,
    pub transaction_id: Option<String>,
    /// The order reference exactly as the provider sent it (order code or raw id).
    pub order_reference: String,
    pub amount: Money,
    pub currency: String,
    /// The provider's raw status string, e.g. INITIATED / SUCCESS / FAILED / UNKNOWN.
    pub status: String,
    pub signature_value: String,
    pub signature_valid: bool,
    pub raw_payload: Json<Value>,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

//--------------------------------------    OrderDecision     ---------------------------------------------------------
/// A staff or chat-bot resolution of a pending order. The same decision type backs the authenticated API action
/// and the chat callback-button protocol (`"approve:<id>"` / `"reject:<id>"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDecision {
    Approve,
    Reject,
}

impl Display for OrderDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderDecision::Approve => "approve",
            OrderDecision::Reject => "reject",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OrderDecision {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            s => Err(ConversionError(format!("Unsupported action: {s}"))),
        }
    }
}

pub const STATUS_INITIATED: &str = "INITIATED";
pub const STATUS_UNKNOWN: &str = "UNKNOWN";
