use log::*;
use spg_common::Secret;

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: Secret<String>,
    /// The staff chat (usually a supergroup, so a negative id) that receives order notifications.
    pub chat_id: String,
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self { bot_token: Secret::default(), chat_id: String::default(), api_base: "https://api.telegram.org".to_string() }
    }
}

impl TelegramConfig {
    pub fn new_from_env_or_default() -> Self {
        let bot_token = Secret::new(std::env::var("SPG_TELEGRAM_BOT_TOKEN").unwrap_or_else(|_| {
            warn!("SPG_TELEGRAM_BOT_TOKEN not set. Chat notifications will be disabled.");
            String::default()
        }));
        let chat_id = std::env::var("SPG_TELEGRAM_CHAT_ID").unwrap_or_else(|_| {
            warn!("SPG_TELEGRAM_CHAT_ID not set. Chat notifications will be disabled.");
            String::default()
        });
        let api_base = std::env::var("SPG_TELEGRAM_API_BASE").unwrap_or_else(|_| "https://api.telegram.org".to_string());
        Self { bot_token, chat_id, api_base }
    }

    /// Notifications are silently skipped when either half of the credentials is missing.
    pub fn is_configured(&self) -> bool {
        !self.bot_token.is_empty() && !self.chat_id.is_empty()
    }
}
