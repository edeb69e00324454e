use serde::{Deserialize, Serialize};
use shop_payment_engine::{db_types::Order, order_objects::QrPaymentRequest};

/// The response shape for approve/reject actions, shared by the API routes and the chat callback path.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionResponse {
    pub detail: String,
    pub order_status: String,
    pub payment_status: String,
    pub processed: bool,
}

impl DecisionResponse {
    pub fn new(detail: String, order: &Order, processed: bool) -> Self {
        Self {
            detail,
            order_status: order.order_status.to_string(),
            payment_status: order.payment_status.to_string(),
            processed,
        }
    }
}

/// A receipt upload. The file itself lives with the receipt-storage collaborator; the back office receives an
/// opaque reference plus the metadata it validates (name for the extension check, size for the limit check).
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptUploadRequest {
    pub payment_id: i64,
    #[serde(alias = "receipt")]
    pub file: ReceiptFile,
    #[serde(default)]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptFile {
    pub name: String,
    pub size_bytes: u64,
    #[serde(alias = "path", alias = "url")]
    pub reference: String,
}

/// A manual QR payment request, with the optional caller identity used for the ownership check.
#[derive(Debug, Clone, Deserialize)]
pub struct QrPaymentBody {
    #[serde(flatten)]
    pub request: QrPaymentRequest,
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// Optional caller identity on read endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserContext {
    #[serde(default)]
    pub user_id: Option<i64>,
}
