//! # Database backend contracts
//!
//! This module defines the interface contract of the payment engine database *backends*.
//!
//! The [`PaymentGatewayDatabase`] trait deliberately exposes coarse operations: everything that must commit or
//! roll back together (a webhook settlement, a staff decision, an order insert with its items and code) is a
//! single trait method, and the backend is responsible for wrapping it in one atomic unit of work. The
//! reconciliation API layers policy — validation, signature checks, accept/reject decisions, event publication —
//! on top of these operations and never touches a connection itself.

mod data_objects;
mod payment_gateway_database;

pub use data_objects::{CallbackContext, CallbackSettlement, DecisionApplication};
pub use payment_gateway_database::{PaymentGatewayDatabase, PaymentGatewayError};
