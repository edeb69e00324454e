use serde::{Deserialize, Serialize};

/// The slice of a Bot API update the back office cares about: callback-button presses. Everything else in the
/// update is ignored (the channel carries other traffic).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramUpdate {
    #[serde(default)]
    pub update_id: i64,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    /// The payload the inline button was created with, e.g. `"approve:42"`.
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<ChatMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatMessage {
    pub message_id: i64,
    #[serde(default)]
    pub chat: Chat,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboard {
    /// A single row of buttons.
    pub fn row(buttons: Vec<InlineKeyboardButton>) -> Self {
        Self { inline_keyboard: vec![buttons] }
    }

    /// An empty keyboard. Editing a message to this strips its buttons, which is how a handled
    /// approve/reject prompt is disarmed against double clicks.
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineKeyboardButton {
    pub fn new<T: Into<String>, D: Into<String>>(text: T, callback_data: D) -> Self {
        Self { text: text.into(), callback_data: callback_data.into() }
    }
}
