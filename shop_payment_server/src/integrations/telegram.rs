//! Wires the reconciliation engine's event hooks to the Telegram staff channel.
//!
//! Every handler here is fire-and-forget: it runs on its own task after the state transition has committed, and a
//! failed or slow Bot API call is logged and dropped. Nothing in this module can fail an order flow.

use futures::future::BoxFuture;
use log::*;
use shop_payment_engine::{
    events::{EventHandlers, EventHooks, OrderCreatedEvent, PaymentConfirmedEvent, ReceiptUploadedEvent},
    db_types::{Order, OrderItem, Payment, PaymentStatus},
};
use telegram_tools::{
    helpers::{approve_reject_keyboard, escape_html, format_timestamp},
    TelegramApi,
    TelegramApiError,
    TelegramConfig,
};

pub const TELEGRAM_EVENT_BUFFER_SIZE: usize = 25;

/// Builds the event handlers that push reconciliation outcomes into the staff chat:
///
/// 1. `OrderCreatedEvent` — COD orders are announced immediately (no payment gate to wait for). Orders on other
///    methods are announced by the receipt and payment events instead.
/// 2. `ReceiptUploadedEvent` — a full order summary, with Approve/Reject buttons while the payment is pending.
/// 3. `PaymentConfirmedEvent` — the provider settlement notice.
/// 4. `OrderDecidedEvent` — the plain confirmation line for an applied decision.
pub fn create_telegram_event_handlers(config: TelegramConfig) -> Result<EventHandlers, TelegramApiError> {
    let mut hooks = EventHooks::default();
    let api = TelegramApi::new(config)?;

    let api_clone = api.clone();
    hooks.on_order_created(move |ev: OrderCreatedEvent| {
        if !ev.order.payment_method.is_cash_on_delivery() {
            return no_op();
        }
        let api = api_clone.clone();
        let text = format_new_order_message(&ev.order, &ev.items, ev.receipt_ref.as_deref());
        Box::pin(async move {
            if let Err(e) = api.send_message(&text, None).await {
                error!("🤖️ Could not announce order in the staff chat. {e}");
            }
        })
    });

    let api_clone = api.clone();
    hooks.on_receipt_uploaded(move |ev: ReceiptUploadedEvent| {
        let api = api_clone.clone();
        let keyboard = (ev.payment.status == PaymentStatus::Pending && !ev.order.payment_method.is_cash_on_delivery())
            .then(|| approve_reject_keyboard(ev.order.id));
        let text = format_receipt_message(&ev.order, &ev.items, &ev.payment);
        let photo_url = ev.payment.receipt_ref.clone().filter(|r| r.starts_with("http"));
        Box::pin(async move {
            let result = match photo_url {
                Some(url) => api.send_photo(&url, &text, keyboard.as_ref()).await,
                None => api.send_message(&text, keyboard.as_ref()).await,
            };
            if let Err(e) = result {
                error!("🤖️ Could not post the receipt notification. {e}");
            }
        })
    });

    let api_clone = api.clone();
    hooks.on_payment_confirmed(move |ev: PaymentConfirmedEvent| {
        let api = api_clone.clone();
        let text = format_payment_update(&ev.order, &ev.payment, ev.transaction.transaction_id.as_deref());
        Box::pin(async move {
            if let Err(e) = api.send_message(&text, None).await {
                error!("🤖️ Could not post the payment confirmation. {e}");
            }
        })
    });

    hooks.on_order_decided(move |ev| {
        let api = api.clone();
        Box::pin(async move {
            if let Err(e) = api.send_message(&ev.detail, None).await {
                error!("🤖️ Could not post the decision confirmation. {e}");
            }
        })
    });

    Ok(EventHandlers::new(TELEGRAM_EVENT_BUFFER_SIZE, hooks))
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}

fn format_new_order_message(order: &Order, items: &[OrderItem], receipt_ref: Option<&str>) -> String {
    let title = if order.payment_method.is_cash_on_delivery() { "New COD Order" } else { "New PayByQR Order" };
    let mut lines = vec![
        format!("🧾 {title} ({})", order.payment_status),
        format!("OrderCode: {}", escape_html(&order.order_code)),
        format!("Name: {}", escape_html(&order.customer_name)),
        format!("Phone: {}", escape_html(&order.phone)),
        format!("Address: {}", escape_html(&order.address)),
        format!("Payment: {}", order.payment_method),
        format!("Status: {}", order.payment_status),
        format!("Date: {}", format_timestamp(order.created_at)),
    ];
    if !order.note.is_empty() {
        lines.push(format!("Note: {}", escape_html(&order.note)));
    }
    lines.push("Items:".to_string());
    for item in items {
        lines.push(format!(
            "- {} — QTY {} — ${} — Subtotal ${}",
            escape_html(&item.product_name),
            item.quantity,
            item.price,
            item.subtotal
        ));
    }
    lines.push(format!("Total: ${}", order.total_amount));
    lines.push(if receipt_ref.is_some() { "✅ Receipt Image:".to_string() } else { "Receipt: (not provided)".to_string() });
    lines.join("\n")
}

fn format_receipt_message(order: &Order, items: &[OrderItem], payment: &Payment) -> String {
    let status_text = match payment.status {
        PaymentStatus::Pending => "⏳ Pending",
        PaymentStatus::Verified => "✅ Paid",
        PaymentStatus::Rejected => "❌ Rejected",
        PaymentStatus::Failed => "❌ Failed",
    };
    let mut lines = vec![
        "🧾 PAYMENT RECEIPT UPLOADED".to_string(),
        String::new(),
        format!("Order Code: {}", order.order_code),
        format!("Date: {}", format_timestamp(order.created_at)),
        String::new(),
        "👤 Customer Information".to_string(),
        format!("Name: {}", if order.customer_name.is_empty() { "Guest" } else { order.customer_name.as_str() }),
        format!("Phone: {}", if order.phone.is_empty() { "N/A" } else { order.phone.as_str() }),
        format!("Address: {}", if order.address.is_empty() { "-" } else { order.address.as_str() }),
        String::new(),
        "💳 Payment Details".to_string(),
        format!("Method: {}", payment.method),
        format!("Status: {status_text}"),
        String::new(),
        "📦 Order Items".to_string(),
    ];
    for (index, item) in items.iter().enumerate() {
        lines.push(format!("{}. {}", index + 1, item.product_name));
        lines.push(format!("• Qty: {}", item.quantity));
        lines.push(format!("• Price: ${}", item.price));
        lines.push(format!("• Subtotal: ${}", item.subtotal));
        lines.push(String::new());
    }
    lines.push("💰 Total Amount".to_string());
    lines.push(format!("🟢 ${}", order.total_amount));
    if !order.note.is_empty() {
        lines.push(String::new());
        lines.push("📝 Note".to_string());
        lines.push(order.note.clone());
    }
    lines.join("\n")
}

fn format_payment_update(order: &Order, payment: &Payment, transaction_id: Option<&str>) -> String {
    [
        "💳 Provider Payment".to_string(),
        format!("Order: {}", order.order_code),
        format!("Amount: {} {}", payment.currency, payment.amount),
        format!("Transaction ID: {}", transaction_id.unwrap_or("-")),
        format!("Status: {}", payment.status),
        format!("Paid at: {}", payment.paid_at.map(format_timestamp).unwrap_or_else(|| "-".to_string())),
    ]
    .join("\n")
}
