//! Shop Payment Engine
//!
//! The engine turns asynchronous, possibly-duplicated, possibly-forged payment signals (provider webhooks, staff
//! decisions, chat-bot callbacks) into authoritative order and payment state transitions, exactly once.
//!
//! The library is divided into three main sections:
//! 1. Database types and backend contracts ([`db_types`], [`traits`]). SQLite is the supported backend. You should
//!    never need to access the database directly; use the public API instead. The exception is the data types used in
//!    the database, which are public.
//! 2. The reconciliation API ([`ReconciliationApi`]). This is the state machine described in the module docs of
//!    [`spe_api::reconciliation_api`]: order creation, checkout-link signing, webhook settlement, and staff/chat
//!    approve-reject decisions. Backends implement [`traits::PaymentGatewayDatabase`] to drive it.
//! 3. Events ([`events`]). A simple actor-style hook system that lets integrations (admin chat, realtime feeds)
//!    subscribe to reconciliation outcomes without ever being able to fail the underlying transaction.

pub mod db_types;
pub mod events;
pub mod helpers;
mod spe_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use spe_api::{
    errors::ReconciliationError,
    order_objects,
    reconciliation_api::{CheckoutProviderConfig, ReconciliationApi, PAYWAY_PROVIDER, QR_MANUAL_PROVIDER},
};
