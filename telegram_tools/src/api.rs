use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};

use crate::{config::TelegramConfig, data_objects::InlineKeyboard, error::TelegramApiError};

/// Outbound calls are bounded and fire-and-forget from the caller's point of view: a slow or broken chat channel
/// must never hold up (or fail) an order flow.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct TelegramApi {
    config: TelegramConfig,
    client: Arc<Client>,
}

impl TelegramApi {
    pub fn new(config: TelegramConfig) -> Result<Self, TelegramApiError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TelegramApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// The staff chat id this client notifies by default.
    pub fn default_chat_id(&self) -> &str {
        &self.config.chat_id
    }

    /// Posts a plain text message to the staff chat, optionally with an inline keyboard attached.
    pub async fn send_message(&self, text: &str, keyboard: Option<&InlineKeyboard>) -> Result<(), TelegramApiError> {
        self.send_message_to(&self.config.chat_id.clone(), text, keyboard).await
    }

    pub async fn send_message_to(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), TelegramApiError> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = to_value(keyboard)?;
        }
        self.call("sendMessage", &body).await
    }

    /// Posts a photo (by URL) with a caption. Used for receipt images, which live in external storage and are
    /// passed through as URLs.
    pub async fn send_photo(
        &self,
        photo_url: &str,
        caption: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), TelegramApiError> {
        let mut body = json!({
            "chat_id": self.config.chat_id,
            "photo": photo_url,
            "caption": caption,
        });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = to_value(keyboard)?;
        }
        self.call("sendPhoto", &body).await
    }

    /// Acknowledges a callback-button press so the client stops showing its progress spinner.
    pub async fn answer_callback_query(&self, callback_query_id: &str, text: &str) -> Result<(), TelegramApiError> {
        let body = json!({
            "callback_query_id": callback_query_id,
            "text": text,
            "show_alert": false,
        });
        self.call("answerCallbackQuery", &body).await
    }

    /// Replaces a message's inline keyboard. Passing [`InlineKeyboard::empty`] strips the buttons, preventing a
    /// handled approve/reject prompt from being clicked again.
    pub async fn edit_message_reply_markup(
        &self,
        chat_id: i64,
        message_id: i64,
        keyboard: &InlineKeyboard,
    ) -> Result<(), TelegramApiError> {
        let body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "reply_markup": to_value(keyboard)?,
        });
        self.call("editMessageReplyMarkup", &body).await
    }

    async fn call(&self, method: &str, body: &Value) -> Result<(), TelegramApiError> {
        let url = format!("{}/bot{}/{method}", self.config.api_base.trim_end_matches('/'), self.config.bot_token.reveal());
        trace!("🤖️ Calling Bot API method {method}");
        let response =
            self.client.post(url).json(body).send().await.map_err(|e| TelegramApiError::RequestError(e.to_string()))?;
        if response.status().is_success() {
            trace!("🤖️ Bot API call {method} succeeded. {}", response.status());
            Ok(())
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| TelegramApiError::RequestError(e.to_string()))?;
            Err(TelegramApiError::ApiError { status, message })
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, TelegramApiError> {
    serde_json::to_value(value).map_err(|e| TelegramApiError::JsonError(e.to_string()))
}
