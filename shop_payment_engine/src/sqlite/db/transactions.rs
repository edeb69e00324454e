use chrono::{DateTime, Utc};
use serde_json::Value;
use spg_common::Money;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{PaymentTransaction, STATUS_INITIATED, STATUS_UNKNOWN},
    traits::{CallbackContext, PaymentGatewayError},
};

pub async fn fetch_by_txid(
    provider: &str,
    transaction_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentTransaction>, PaymentGatewayError> {
    let tx = sqlx::query_as("SELECT * FROM payment_transactions WHERE provider = $1 AND transaction_id = $2")
        .bind(provider)
        .bind(transaction_id)
        .fetch_optional(conn)
        .await?;
    Ok(tx)
}

/// Appends an outbound-intent row for a freshly created checkout link. There is no transaction id yet (the
/// provider assigns one when it calls back), so these rows never collide with the dedup index.
#[allow(clippy::too_many_arguments)]
pub async fn insert_initiated(
    provider: &str,
    order_id: i64,
    payment_id: i64,
    order_reference: &str,
    amount: Money,
    currency: &str,
    signature: &str,
    payload: &Value,
    conn: &mut SqliteConnection,
) -> Result<PaymentTransaction, PaymentGatewayError> {
    let tx = sqlx::query_as(
        r#"
            INSERT INTO payment_transactions (
                provider, order_id, payment_id, order_reference, amount, currency, status, signature_value,
                signature_valid, raw_payload, processed
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 1, $9, 0)
            RETURNING *;
        "#,
    )
    .bind(provider)
    .bind(order_id)
    .bind(payment_id)
    .bind(order_reference)
    .bind(amount)
    .bind(currency)
    .bind(STATUS_INITIATED)
    .bind(signature)
    .bind(Json(payload.clone()))
    .fetch_one(conn)
    .await?;
    Ok(tx)
}

/// The dedup point for inbound callbacks. An existing unprocessed row for (provider, transaction_id) has its
/// mutable fields refreshed in place; a processed row is frozen and returned untouched; otherwise a new row is
/// inserted. A concurrent insert racing on the same transaction id trips the journal's uniqueness constraint and
/// surfaces as [`PaymentGatewayError::DuplicateTransaction`], rolling the caller's transaction back.
pub async fn upsert_inbound(
    ctx: &CallbackContext,
    conn: &mut SqliteConnection,
) -> Result<PaymentTransaction, PaymentGatewayError> {
    if let Some(existing) = fetch_by_txid(&ctx.provider, &ctx.transaction_id, &mut *conn).await? {
        if existing.processed {
            return Ok(existing);
        }
        let status = if ctx.status_text.is_empty() { existing.status.clone() } else { ctx.status_text.clone() };
        let signature =
            if ctx.signature_value.is_empty() { existing.signature_value.clone() } else { ctx.signature_value.clone() };
        let tx = sqlx::query_as(
            r#"
                UPDATE payment_transactions
                SET amount = $2, currency = $3, status = $4, signature_value = $5, signature_valid = $6, raw_payload = $7
                WHERE id = $1
                RETURNING *;
            "#,
        )
        .bind(existing.id)
        .bind(ctx.amount)
        .bind(&ctx.currency)
        .bind(status)
        .bind(signature)
        .bind(ctx.signature_valid)
        .bind(Json(ctx.raw_payload.clone()))
        .fetch_one(conn)
        .await?;
        return Ok(tx);
    }

    let status = if ctx.status_text.is_empty() { STATUS_UNKNOWN } else { ctx.status_text.as_str() };
    let tx = sqlx::query_as(
        r#"
            INSERT INTO payment_transactions (
                provider, order_id, transaction_id, order_reference, amount, currency, status, signature_value,
                signature_valid, raw_payload, processed
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 0)
            RETURNING *;
        "#,
    )
    .bind(&ctx.provider)
    .bind(ctx.order_id)
    .bind(&ctx.transaction_id)
    .bind(&ctx.order_reference)
    .bind(ctx.amount)
    .bind(&ctx.currency)
    .bind(status)
    .bind(&ctx.signature_value)
    .bind(ctx.signature_valid)
    .bind(Json(ctx.raw_payload.clone()))
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            PaymentGatewayError::DuplicateTransaction(ctx.transaction_id.clone())
        },
        _ => PaymentGatewayError::from(e),
    })?;
    Ok(tx)
}

/// Flips the row to `processed`, stamps the processing time and links the resolving payment. Must run inside the
/// same transaction as the order/payment mutation it records.
pub async fn mark_processed(
    id: i64,
    payment_id: i64,
    processed_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PaymentTransaction, PaymentGatewayError> {
    let tx = sqlx::query_as(
        r#"
            UPDATE payment_transactions
            SET processed = 1, processed_at = $2, payment_id = $3
            WHERE id = $1
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(processed_at)
    .bind(payment_id)
    .fetch_one(conn)
    .await?;
    Ok(tx)
}

/// Links the resolving payment without processing the row (the reject path). The payment back-link is the only
/// field a frozen row may gain.
pub async fn link_payment(
    id: i64,
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<PaymentTransaction, PaymentGatewayError> {
    let tx = sqlx::query_as("UPDATE payment_transactions SET payment_id = $2 WHERE id = $1 RETURNING *")
        .bind(id)
        .bind(payment_id)
        .fetch_one(conn)
        .await?;
    Ok(tx)
}
