use chrono::{DateTime, Datelike, Utc};
use log::debug;
use sqlx::SqliteConnection;
use spg_common::Money;

use crate::{
    db_types::{NewOrder, Order, OrderDecision, OrderItem, OrderStatus, PaymentMethod, SettlementStatus},
    sqlite::db::products,
    traits::PaymentGatewayError,
};

/// Inserts a new order with its line items using the given connection. This is not atomic on its own: callers wrap
/// it in a transaction (pass `&mut *tx`) so the order, its items and the code assignment commit together.
///
/// Item snapshots are resolved here: a missing snapshot name or unit price is copied from the live product, and
/// the subtotal is computed as price × quantity. The order total is the sum of subtotals and must be positive.
pub async fn insert_order(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(Order, Vec<OrderItem>), PaymentGatewayError> {
    let mut resolved = Vec::with_capacity(order.items.len());
    for item in &order.items {
        let product = products::fetch_product(item.product_id, conn)
            .await?
            .ok_or(PaymentGatewayError::ProductNotFound(item.product_id))?;
        let price = item.price.unwrap_or(product.price);
        let name = match &item.product_name {
            Some(n) if !n.is_empty() => n.clone(),
            _ => product.name,
        };
        let subtotal = price * item.quantity;
        resolved.push((item.product_id, name, price, item.quantity, subtotal));
    }
    let total: Money = resolved.iter().map(|(_, _, _, _, subtotal)| *subtotal).sum();
    if !total.is_positive() {
        return Err(PaymentGatewayError::OrderTotalNotPositive);
    }

    let order_status = order.initial_order_status();
    let (id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
        r#"
            INSERT INTO orders (
                user_id,
                customer_name,
                phone,
                address,
                total_amount,
                payment_method,
                payment_status,
                order_status,
                note
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, created_at;
        "#,
    )
    .bind(order.user_id)
    .bind(&order.customer_name)
    .bind(&order.phone)
    .bind(&order.address)
    .bind(total)
    .bind(order.payment_method)
    .bind(SettlementStatus::Pending)
    .bind(order_status)
    .bind(&order.note)
    .fetch_one(&mut *conn)
    .await?;

    let stored = assign_order_code(id, created_at, &mut *conn).await?;
    debug!("🗃️ Order [{}] inserted with id {id}", stored.order_code);

    let mut items = Vec::with_capacity(resolved.len());
    for (product_id, name, price, quantity, subtotal) in resolved {
        let item: OrderItem = sqlx::query_as(
            r#"
                INSERT INTO order_items (order_id, product_id, product_name, price, quantity, subtotal)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *;
            "#,
        )
        .bind(id)
        .bind(product_id)
        .bind(name)
        .bind(price)
        .bind(quantity)
        .bind(subtotal)
        .fetch_one(&mut *conn)
        .await?;
        items.push(item);
    }
    Ok((stored, items))
}

/// Assigns the permanent order code, derived from the creation year and the surrogate id, zero-padded to four
/// digits. Ids of 10000 and up simply produce a longer suffix. Called exactly once, straight after the insert.
async fn assign_order_code(
    id: i64,
    created_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let code = format!("ORD-{}-{:04}", created_at.year(), id);
    let order = sqlx::query_as("UPDATE orders SET order_code = $1 WHERE id = $2 RETURNING *")
        .bind(code)
        .bind(id)
        .fetch_one(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_order_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, PaymentGatewayError> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_code(
    code: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_code = $1").bind(code).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_items(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, PaymentGatewayError> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// The accept-path order mutation: the payment axis settles to `paid`, a pending order is promoted to confirmed
/// (shipping/completed/cancelled are never downgraded), and the payment method is pinned to the method that
/// actually settled.
pub async fn settle_order_paid(
    order_id: i64,
    method: PaymentMethod,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders
            SET payment_status = 'paid',
                order_status = CASE WHEN order_status = 'pending' THEN 'confirmed' ELSE order_status END,
                payment_method = $2,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(method)
    .fetch_optional(conn)
    .await?
    .ok_or(PaymentGatewayError::OrderIdNotFound(order_id))?;
    Ok(order)
}

/// Pins the order's payment method and drops the payment axis back to `pending` unless the order is already paid.
/// Used when a checkout link or manual QR attempt selects (or re-selects) a payment rail.
pub async fn pin_payment_method(
    order_id: i64,
    method: PaymentMethod,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders
            SET payment_method = $2,
                payment_status = CASE WHEN payment_status = 'paid' THEN payment_status ELSE 'pending' END,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(method)
    .fetch_optional(conn)
    .await?
    .ok_or(PaymentGatewayError::OrderIdNotFound(order_id))?;
    Ok(order)
}

/// Drops the payment axis back to `pending` unless the order is already paid. Used when a fresh receipt supersedes
/// a stale rejection.
pub async fn reset_settlement_pending(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders
            SET payment_status = CASE WHEN payment_status = 'paid' THEN payment_status ELSE 'pending' END,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await?
    .ok_or(PaymentGatewayError::OrderIdNotFound(order_id))?;
    Ok(order)
}

/// Applies a staff/chat decision to the order row. The caller has already established that the order is not
/// settled. A rejected COD order is cancelled outright; rejecting any other method leaves the fulfilment axis
/// alone so the customer can retry payment.
pub async fn apply_decision(
    order: &Order,
    decision: OrderDecision,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let (order_status, payment_status) = match decision {
        OrderDecision::Approve => (OrderStatus::Confirmed, SettlementStatus::Paid),
        OrderDecision::Reject if order.payment_method.is_cash_on_delivery() => {
            (OrderStatus::Cancelled, SettlementStatus::Failed)
        },
        OrderDecision::Reject => (order.order_status, SettlementStatus::Failed),
    };
    let order = sqlx::query_as(
        r#"
            UPDATE orders
            SET order_status = $2, payment_status = $3, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING *;
        "#,
    )
    .bind(order.id)
    .bind(order_status)
    .bind(payment_status)
    .fetch_optional(conn)
    .await?
    .ok_or(PaymentGatewayError::OrderIdNotFound(order.id))?;
    Ok(order)
}
