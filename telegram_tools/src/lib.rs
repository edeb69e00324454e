//! A minimal Telegram Bot API client for the back-office notification channel.
//!
//! The bot pushes order and payment summaries into the staff chat (with inline Approve/Reject buttons for pending
//! payments) and receives the resulting callback-button presses back through a webhook. Only the handful of Bot
//! API methods the back office actually uses are wrapped here.

mod api;
mod config;
mod error;

mod data_objects;
pub mod helpers;

pub use api::TelegramApi;
pub use config::TelegramConfig;
pub use data_objects::{
    CallbackQuery,
    Chat,
    ChatMessage,
    InlineKeyboard,
    InlineKeyboardButton,
    TelegramUpdate,
};
pub use error::TelegramApiError;
