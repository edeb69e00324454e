//! # SQLite database methods
//!
//! This module contains the "low-level" SQLite interactions.
//!
//! All of them are simple functions (rather than stateful structs) that accept a `&mut SqliteConnection` argument.
//! Callers can obtain a connection from a pool, or create an atomic transaction as the need arises and pass
//! `&mut *tx` without any other changes. The coarse, atomic operations of the
//! [`PaymentGatewayDatabase`](crate::traits::PaymentGatewayDatabase) trait are composed from these functions in
//! [`super::sqlite_impl`].

use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod orders;
pub mod payments;
pub mod products;
pub mod transactions;

const SQLITE_DB_URL: &str = "sqlite://data/shop_store.db";

pub fn db_url() -> String {
    let result = env::var("SPG_DATABASE_URL").unwrap_or_else(|_| {
        info!("SPG_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Truncate)
        .busy_timeout(Duration::from_secs(30));
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
