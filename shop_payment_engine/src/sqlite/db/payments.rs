use chrono::{DateTime, Utc};
use serde_json::Value;
use spg_common::Money;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{Order, OrderDecision, Payment, PaymentMethod, PaymentStatus},
    traits::PaymentGatewayError,
};

pub async fn fetch_payment(id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, PaymentGatewayError> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_payments_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, PaymentGatewayError> {
    let payments = sqlx::query_as("SELECT * FROM payments WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(payments)
}

/// Returns the working payment row for (order, method), creating it as `pending` when absent. The amount,
/// currency and provider are refreshed either way; nothing else is touched, so a verified row keeps its status.
pub async fn get_or_create(
    order: &Order,
    method: PaymentMethod,
    provider: &str,
    currency: &str,
    conn: &mut SqliteConnection,
) -> Result<Payment, PaymentGatewayError> {
    let payment = sqlx::query_as(
        r#"
            INSERT INTO payments (order_id, method, amount, currency, provider)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (order_id, method) DO UPDATE
                SET amount = excluded.amount,
                    currency = excluded.currency,
                    provider = excluded.provider,
                    updated_at = CURRENT_TIMESTAMP
            RETURNING *;
        "#,
    )
    .bind(order.id)
    .bind(method)
    .bind(order.total_amount)
    .bind(currency)
    .bind(provider)
    .fetch_one(conn)
    .await?;
    Ok(payment)
}

/// The checkout-link variant of [`get_or_create`]: additionally stores the freshly signed payload and clears any
/// transaction id left over from an earlier, abandoned attempt (the provider will assign a new one).
pub async fn refresh_for_checkout(
    order: &Order,
    method: PaymentMethod,
    provider: &str,
    amount: Money,
    currency: &str,
    signature: &str,
    payload: &Value,
    conn: &mut SqliteConnection,
) -> Result<Payment, PaymentGatewayError> {
    let payment = sqlx::query_as(
        r#"
            INSERT INTO payments (order_id, method, amount, currency, provider, signature_value, signature_valid, raw_payload)
            VALUES ($1, $2, $3, $4, $5, $6, 1, $7)
            ON CONFLICT (order_id, method) DO UPDATE
                SET amount = excluded.amount,
                    currency = excluded.currency,
                    provider = excluded.provider,
                    signature_value = excluded.signature_value,
                    signature_valid = 1,
                    raw_payload = excluded.raw_payload,
                    transaction_id = NULL,
                    updated_at = CURRENT_TIMESTAMP
            RETURNING *;
        "#,
    )
    .bind(order.id)
    .bind(method)
    .bind(amount)
    .bind(currency)
    .bind(provider)
    .bind(signature)
    .bind(Json(payload.clone()))
    .fetch_one(conn)
    .await?;
    Ok(payment)
}

/// Stages the provider's callback result onto the working payment row for (order, method), creating the row if
/// this is the first we hear of the attempt.
#[allow(clippy::too_many_arguments)]
pub async fn stage_callback_result(
    order_id: i64,
    method: PaymentMethod,
    provider: &str,
    amount: Money,
    currency: &str,
    transaction_id: &str,
    signature: &str,
    signature_valid: bool,
    payload: &Value,
    conn: &mut SqliteConnection,
) -> Result<Payment, PaymentGatewayError> {
    let payment = sqlx::query_as(
        r#"
            INSERT INTO payments (
                order_id, method, amount, currency, provider, transaction_id, signature_value, signature_valid, raw_payload
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (order_id, method) DO UPDATE
                SET amount = excluded.amount,
                    currency = excluded.currency,
                    provider = excluded.provider,
                    transaction_id = excluded.transaction_id,
                    signature_value = excluded.signature_value,
                    signature_valid = excluded.signature_valid,
                    raw_payload = excluded.raw_payload,
                    updated_at = CURRENT_TIMESTAMP
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(method)
    .bind(amount)
    .bind(currency)
    .bind(provider)
    .bind(transaction_id)
    .bind(signature)
    .bind(signature_valid)
    .bind(Json(payload.clone()))
    .fetch_one(conn)
    .await?;
    Ok(payment)
}

/// Attaches a receipt. A rejected or failed payment goes back to `pending`; a verified one keeps its status.
pub async fn attach_receipt(
    payment_id: i64,
    receipt_ref: &str,
    uploaded_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Payment, PaymentGatewayError> {
    let payment = sqlx::query_as(
        r#"
            UPDATE payments
            SET receipt_ref = $2,
                receipt_uploaded_at = $3,
                status = CASE WHEN status IN ('rejected', 'failed') THEN 'pending' ELSE status END,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING *;
        "#,
    )
    .bind(payment_id)
    .bind(receipt_ref)
    .bind(uploaded_at)
    .fetch_optional(conn)
    .await?
    .ok_or(PaymentGatewayError::PaymentNotFound(payment_id))?;
    Ok(payment)
}

pub async fn mark_verified(
    payment_id: i64,
    paid_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Payment, PaymentGatewayError> {
    let payment = sqlx::query_as(
        "UPDATE payments SET status = 'verified', paid_at = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING *",
    )
    .bind(payment_id)
    .bind(paid_at)
    .fetch_optional(conn)
    .await?
    .ok_or(PaymentGatewayError::PaymentNotFound(payment_id))?;
    Ok(payment)
}

/// Marks a payment rejected or failed; either way `paid_at` is cleared.
pub async fn mark_unsuccessful(
    payment_id: i64,
    status: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<Payment, PaymentGatewayError> {
    let payment = sqlx::query_as(
        "UPDATE payments SET status = $2, paid_at = NULL, updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING *",
    )
    .bind(payment_id)
    .bind(status)
    .fetch_optional(conn)
    .await?
    .ok_or(PaymentGatewayError::PaymentNotFound(payment_id))?;
    Ok(payment)
}

/// Mirrors a staff/chat decision onto every payment row under the order: approve verifies them all with the
/// decision time as `paid_at`; reject marks them rejected and clears `paid_at`.
pub async fn mirror_decision(
    order_id: i64,
    decision: OrderDecision,
    decided_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, PaymentGatewayError> {
    let payments = match decision {
        OrderDecision::Approve => {
            sqlx::query_as(
                r#"
                    UPDATE payments
                    SET status = 'verified', paid_at = $2, updated_at = CURRENT_TIMESTAMP
                    WHERE order_id = $1
                    RETURNING *;
                "#,
            )
            .bind(order_id)
            .bind(decided_at)
            .fetch_all(conn)
            .await?
        },
        OrderDecision::Reject => {
            sqlx::query_as(
                r#"
                    UPDATE payments
                    SET status = 'rejected', paid_at = NULL, updated_at = CURRENT_TIMESTAMP
                    WHERE order_id = $1
                    RETURNING *;
                "#,
            )
            .bind(order_id)
            .fetch_all(conn)
            .await?
        },
    };
    Ok(payments)
}
