use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    OrderCreatedEvent,
    OrderDecidedEvent,
    OrderEventEnvelope,
    PaymentConfirmedEvent,
    ReceiptUploadedEvent,
};

/// The producer side of the hook system. The reconciliation API holds one of these and publishes each outcome to
/// every subscribed producer. Publishing to zero producers is a no-op, so a server without integrations costs
/// nothing.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_created_producer: Vec<EventProducer<OrderCreatedEvent>>,
    pub receipt_uploaded_producer: Vec<EventProducer<ReceiptUploadedEvent>>,
    pub payment_confirmed_producer: Vec<EventProducer<PaymentConfirmedEvent>>,
    pub order_decided_producer: Vec<EventProducer<OrderDecidedEvent>>,
    pub broadcast_producer: Vec<EventProducer<OrderEventEnvelope>>,
}

pub struct EventHandlers {
    pub on_order_created: Option<EventHandler<OrderCreatedEvent>>,
    pub on_receipt_uploaded: Option<EventHandler<ReceiptUploadedEvent>>,
    pub on_payment_confirmed: Option<EventHandler<PaymentConfirmedEvent>>,
    pub on_order_decided: Option<EventHandler<OrderDecidedEvent>>,
    pub on_broadcast: Option<EventHandler<OrderEventEnvelope>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_created = hooks.on_order_created.map(|f| EventHandler::new(buffer_size, f));
        let on_receipt_uploaded = hooks.on_receipt_uploaded.map(|f| EventHandler::new(buffer_size, f));
        let on_payment_confirmed = hooks.on_payment_confirmed.map(|f| EventHandler::new(buffer_size, f));
        let on_order_decided = hooks.on_order_decided.map(|f| EventHandler::new(buffer_size, f));
        let on_broadcast = hooks.on_broadcast.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_created, on_receipt_uploaded, on_payment_confirmed, on_order_decided, on_broadcast }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_created {
            result.order_created_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_receipt_uploaded {
            result.receipt_uploaded_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_confirmed {
            result.payment_confirmed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_decided {
            result.order_decided_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_broadcast {
            result.broadcast_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_created {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_receipt_uploaded {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payment_confirmed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_decided {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_broadcast {
            tokio::spawn(handler.start_handler());
        }
    }
}

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Callback registry for integrations. Assign the hooks you care about, hand the result to
/// [`EventHandlers::new`], and keep the returned producers with the API.
#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_created: Option<Handler<OrderCreatedEvent>>,
    pub on_receipt_uploaded: Option<Handler<ReceiptUploadedEvent>>,
    pub on_payment_confirmed: Option<Handler<PaymentConfirmedEvent>>,
    pub on_order_decided: Option<Handler<OrderDecidedEvent>>,
    pub on_broadcast: Option<Handler<OrderEventEnvelope>>,
}

impl EventHooks {
    pub fn on_order_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCreatedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_order_created = Some(Arc::new(f));
        self
    }

    pub fn on_receipt_uploaded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ReceiptUploadedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_receipt_uploaded = Some(Arc::new(f));
        self
    }

    pub fn on_payment_confirmed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentConfirmedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_payment_confirmed = Some(Arc::new(f));
        self
    }

    pub fn on_order_decided<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderDecidedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_order_decided = Some(Arc::new(f));
        self
    }

    pub fn on_broadcast<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderEventEnvelope) -> HookFuture) + Send + Sync + 'static {
        self.on_broadcast = Some(Arc::new(f));
        self
    }
}
