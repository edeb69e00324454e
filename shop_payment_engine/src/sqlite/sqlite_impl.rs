//! `SqliteDatabase` is the concrete SQLite implementation of the payment gateway backend.
//!
//! Each trait method that represents a state transition opens one transaction on the pool, composes the low-level
//! functions in [`super::db`] over it, and commits at the end. Nothing outside this module touches a connection.

use std::fmt::Debug;

use chrono::Utc;
use log::*;
use serde_json::Value;
use spg_common::Money;
use sqlx::SqlitePool;

use super::db::{new_pool, orders, payments, products, transactions};
use crate::{
    db_types::{
        NewOrder,
        NewProduct,
        Order,
        OrderDecision,
        OrderItem,
        Payment,
        PaymentMethod,
        PaymentStatus,
        PaymentTransaction,
        Product,
    },
    traits::{CallbackContext, CallbackSettlement, DecisionApplication, PaymentGatewayDatabase, PaymentGatewayError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connects using the URL in `SPG_DATABASE_URL`, falling back to the default path.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = super::db::db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        products::insert_product(product, &mut conn).await
    }

    async fn fetch_product(&self, id: i64) -> Result<Option<Product>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_product(id, &mut conn).await
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, Vec<OrderItem>), PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let (order, items) = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order [{}] and {} item(s) have been saved in the DB", order.order_code, items.len());
        Ok((order, items))
    }

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_id(id, &mut conn).await
    }

    async fn fetch_order_by_code(&self, code: &str) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_code(code, &mut conn).await
    }

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_items(order_id, &mut conn).await
    }

    async fn fetch_payment(&self, id: i64) -> Result<Option<Payment>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment(id, &mut conn).await
    }

    async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payments_for_order(order_id, &mut conn).await
    }

    async fn get_or_create_payment(
        &self,
        order: &Order,
        method: PaymentMethod,
        provider: &str,
    ) -> Result<Payment, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        payments::get_or_create(order, method, provider, spg_common::USD_CURRENCY_CODE, &mut conn).await
    }

    async fn attach_receipt(
        &self,
        payment_id: i64,
        receipt_ref: &str,
        uploaded_at: chrono::DateTime<Utc>,
    ) -> Result<(Payment, Order), PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::attach_receipt(payment_id, receipt_ref, uploaded_at, &mut tx).await?;
        let order = orders::reset_settlement_pending(payment.order_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Receipt attached to payment #{payment_id} for order [{}]", order.order_code);
        Ok((payment, order))
    }

    async fn prepare_manual_payment(
        &self,
        order: &Order,
        method: PaymentMethod,
        provider: &str,
    ) -> Result<(Payment, Order), PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::get_or_create(order, method, provider, spg_common::USD_CURRENCY_CODE, &mut tx).await?;
        let order = orders::pin_payment_method(order.id, method, &mut tx).await?;
        tx.commit().await?;
        Ok((payment, order))
    }

    async fn fetch_transaction(
        &self,
        provider: &str,
        transaction_id: &str,
    ) -> Result<Option<PaymentTransaction>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_by_txid(provider, transaction_id, &mut conn).await
    }

    async fn checkout_initiated(
        &self,
        order: &Order,
        method: PaymentMethod,
        provider: &str,
        amount: Money,
        currency: &str,
        signature: &str,
        payload: Value,
    ) -> Result<(Payment, PaymentTransaction), PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let payment =
            payments::refresh_for_checkout(order, method, provider, amount, currency, signature, &payload, &mut tx)
                .await?;
        let journal = transactions::insert_initiated(
            provider,
            order.id,
            payment.id,
            &order.order_code,
            amount,
            currency,
            signature,
            &payload,
            &mut tx,
        )
        .await?;
        if order.payment_method != method {
            orders::pin_payment_method(order.id, method, &mut tx).await?;
        }
        tx.commit().await?;
        debug!("🗃️ Checkout initiated for order [{}], journal entry #{}", order.order_code, journal.id);
        Ok((payment, journal))
    }

    async fn settle_provider_callback(&self, ctx: CallbackContext) -> Result<CallbackSettlement, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        // Re-check the processed flag inside the transaction: a replay that raced past the caller's first look
        // must still short-circuit here.
        if let Some(existing) = transactions::fetch_by_txid(&ctx.provider, &ctx.transaction_id, &mut tx).await? {
            if existing.processed {
                debug!("🗃️ Transaction [{}] is already processed; nothing to do", ctx.transaction_id);
                return Ok(CallbackSettlement::AlreadyProcessed { transaction: existing });
            }
        }
        let journal = transactions::upsert_inbound(&ctx, &mut tx).await?;
        let payment = payments::stage_callback_result(
            ctx.order_id,
            ctx.method,
            &ctx.provider,
            ctx.amount,
            &ctx.currency,
            &ctx.transaction_id,
            &ctx.signature_value,
            ctx.signature_valid,
            &ctx.raw_payload,
            &mut tx,
        )
        .await?;

        let settlement = if ctx.accept {
            let now = Utc::now();
            let payment = payments::mark_verified(payment.id, now, &mut tx).await?;
            let order = orders::settle_order_paid(ctx.order_id, ctx.method, &mut tx).await?;
            let transaction = transactions::mark_processed(journal.id, payment.id, now, &mut tx).await?;
            debug!("🗃️ Transaction [{}] settled order [{}] as paid", ctx.transaction_id, order.order_code);
            CallbackSettlement::Accepted { order, payment, transaction }
        } else {
            let status = if ctx.status_text.is_empty() { PaymentStatus::Rejected } else { PaymentStatus::Failed };
            let payment = payments::mark_unsuccessful(payment.id, status, &mut tx).await?;
            let transaction = transactions::link_payment(journal.id, payment.id, &mut tx).await?;
            let order = orders::fetch_order_by_id(ctx.order_id, &mut tx)
                .await?
                .ok_or(PaymentGatewayError::OrderIdNotFound(ctx.order_id))?;
            debug!("🗃️ Transaction [{}] logged without settling order [{}]", ctx.transaction_id, order.order_code);
            CallbackSettlement::Logged { order, payment, transaction }
        };
        tx.commit().await?;
        Ok(settlement)
    }

    async fn apply_order_decision(
        &self,
        order_id: i64,
        decision: OrderDecision,
    ) -> Result<DecisionApplication, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_id(order_id, &mut tx)
            .await?
            .ok_or(PaymentGatewayError::OrderIdNotFound(order_id))?;
        if order.is_settled() {
            return Ok(DecisionApplication::AlreadyProcessed { order });
        }
        let order = orders::apply_decision(&order, decision, &mut tx).await?;
        let payments = payments::mirror_decision(order_id, decision, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Decision {decision} applied to order [{}] and {} payment(s)", order.order_code, payments.len());
        Ok(DecisionApplication::Applied { order, payments })
    }
}
