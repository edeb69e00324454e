use chrono::{DateTime, Utc};

use crate::data_objects::{InlineKeyboard, InlineKeyboardButton};

/// Escapes the characters Telegram's HTML parse mode treats specially. Customer-supplied text (names, addresses,
/// notes) goes through here before being embedded in a message.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// The Approve/Reject button row attached to pending-payment notifications. The callback payload format is the
/// contract with the webhook side: `"approve:<order id>"` / `"reject:<order id>"`.
pub fn approve_reject_keyboard(order_id: i64) -> InlineKeyboard {
    InlineKeyboard::row(vec![
        InlineKeyboardButton::new("✅ Approve", format!("approve:{order_id}")),
        InlineKeyboardButton::new("❌ Reject", format!("reject:{order_id}")),
    ])
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn html_is_escaped() {
        assert_eq!(escape_html("<b>& \"q\""), "&lt;b&gt;&amp; &quot;q&quot;");
    }

    #[test]
    fn keyboard_payloads_match_the_callback_contract() {
        let keyboard = approve_reject_keyboard(42);
        let payloads: Vec<_> =
            keyboard.inline_keyboard[0].iter().map(|b| b.callback_data.as_str()).collect();
        assert_eq!(payloads, vec!["approve:42", "reject:42"]);
    }
}
