//! # Shop payment server
//!
//! The HTTP layer of the back office. It is responsible for:
//! * accepting storefront order submissions, checkout-link requests, QR attempts and receipt uploads,
//! * receiving the payment provider's asynchronous webhook callbacks,
//! * receiving the chat-bot's approve/reject callback-button webhooks,
//! * wiring the reconciliation engine's event hooks to the Telegram notification channel.
//!
//! ## Configuration
//! The server is configured via `SPG_*` environment variables. See [config](config/index.html) for details.
//!
//! ## Routes
//! * `/health`: liveness check.
//! * `/api/orders`, `/api/orders/{id}`: order creation and lookup.
//! * `/api/orders/{id}/approve`, `/api/orders/{id}/reject`: staff decisions.
//! * `/api/payments/...`: checkout links, QR attempts, receipts, payment lookup.
//! * `/callback/provider`: the payment provider's webhook.
//! * `/callback/chat`: the chat-bot's update webhook.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
