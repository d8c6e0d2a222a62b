use std::{
    any::Any,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::{
    error::KuruError,
    types::{OrderCreatedPayload, OrdersCanceledPayload, TradePayload, WsEvent},
};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Callbacks invoked for feed events, each one optional.
///
/// Callbacks run on the connection task, so they should return quickly and
/// hand heavy work over to a channel. A panicking callback is logged and the
/// feed keeps reading.
#[derive(Clone, Default)]
pub struct EventHandlers {
    on_order_created: Option<Callback<OrderCreatedPayload>>,
    on_trade: Option<Callback<TradePayload>>,
    on_orders_canceled: Option<Callback<OrdersCanceledPayload>>,
    on_event: Option<Callback<WsEvent>>,
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_order_created", &self.on_order_created.is_some())
            .field("on_trade", &self.on_trade.is_some())
            .field("on_orders_canceled", &self.on_orders_canceled.is_some())
            .field("on_event", &self.on_event.is_some())
            .finish()
    }
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_order_created(mut self, f: impl Fn(&OrderCreatedPayload) + Send + Sync + 'static) -> Self {
        self.on_order_created = Some(Arc::new(f));
        self
    }

    pub fn on_trade(mut self, f: impl Fn(&TradePayload) + Send + Sync + 'static) -> Self {
        self.on_trade = Some(Arc::new(f));
        self
    }

    pub fn on_orders_canceled(
        mut self,
        f: impl Fn(&OrdersCanceledPayload) + Send + Sync + 'static,
    ) -> Self {
        self.on_orders_canceled = Some(Arc::new(f));
        self
    }

    /// Called for every decoded event before the event specific callback.
    pub fn on_event(mut self, f: impl Fn(&WsEvent) + Send + Sync + 'static) -> Self {
        self.on_event = Some(Arc::new(f));
        self
    }

    /// Decodes a named feed event and invokes the matching callbacks.
    ///
    /// Payloads that fail to decode are logged and dropped, as are unknown
    /// event names.
    pub fn handle(&self, name: &str, data: Value) -> Option<WsEvent> {
        let event = match decode_event(name, data) {
            Ok(Some(event)) => event,
            Ok(None) => {
                warn!(event = name, "dropping unknown feed event");
                return None;
            }
            Err(err) => {
                error!(event = name, %err, "failed to decode feed event payload");
                return None;
            }
        };
        debug!(?event, "feed event received");
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| self.dispatch(&event))) {
            error!(event = name, reason = panic_message(&*panic), "feed callback panicked");
        }
        Some(event)
    }

    pub fn dispatch(&self, event: &WsEvent) {
        if let Some(f) = &self.on_event {
            f(event);
        }
        match event {
            WsEvent::OrderCreated(payload) => {
                if let Some(f) = &self.on_order_created {
                    f(payload);
                }
            }
            WsEvent::Trade(payload) => {
                if let Some(f) = &self.on_trade {
                    f(payload);
                }
            }
            WsEvent::OrdersCanceled(payload) => {
                if let Some(f) = &self.on_orders_canceled {
                    f(payload);
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown")
}

/// Decodes the payload of a named feed event, `None` for unknown names.
pub fn decode_event(name: &str, data: Value) -> Result<Option<WsEvent>, KuruError> {
    Ok(Some(match name {
        "OrderCreated" => WsEvent::OrderCreated(serde_json::from_value(data)?),
        "Trade" => WsEvent::Trade(serde_json::from_value(data)?),
        "OrdersCanceled" => WsEvent::OrdersCanceled(serde_json::from_value(data)?),
        _ => return Ok(None),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_handle_dispatches_to_matching_callback() {
        let trades = Arc::new(Mutex::new(Vec::new()));
        let all = Arc::new(Mutex::new(Vec::new()));
        let handlers = EventHandlers::new()
            .on_trade({
                let trades = trades.clone();
                move |t| trades.lock().unwrap().push(t.order_id)
            })
            .on_event({
                let all = all.clone();
                move |e| all.lock().unwrap().push(e.name())
            });

        let event = handlers.handle("Trade", json!({"orderId": 3, "updatedSize": "0"}));
        assert!(matches!(event, Some(WsEvent::Trade(_))));
        handlers.handle("OrdersCanceled", json!({"orderIds": [3]}));

        assert_eq!(*trades.lock().unwrap(), vec![3]);
        assert_eq!(*all.lock().unwrap(), vec!["Trade", "OrdersCanceled"]);
    }

    #[test]
    fn test_handle_drops_unknown_and_invalid() {
        let called = Arc::new(Mutex::new(0));
        let handlers = EventHandlers::new().on_order_created({
            let called = called.clone();
            move |_| *called.lock().unwrap() += 1
        });

        assert!(handlers.handle("Heartbeat", json!({})).is_none());
        assert!(
            handlers
                .handle("OrderCreated", json!({"orderId": "not a number"}))
                .is_none()
        );
        assert!(handlers.handle("OrderCreated", json!({"orderId": 1})).is_some());
        assert_eq!(*called.lock().unwrap(), 1);
    }

    #[test]
    fn test_panicking_callback_is_contained() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handlers = EventHandlers::new().on_trade({
            let seen = seen.clone();
            move |t| {
                seen.lock().unwrap().push(t.order_id);
                if t.order_id == 1 {
                    panic!("bad trade");
                }
            }
        });

        assert!(handlers.handle("Trade", json!({"orderId": 1})).is_some());
        assert!(handlers.handle("Trade", json!({"orderId": 2})).is_some());
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_decode_event_names() {
        assert!(matches!(
            decode_event("OrderCreated", json!({})),
            Ok(Some(WsEvent::OrderCreated(_)))
        ));
        assert!(matches!(decode_event("Other", json!({})), Ok(None)));
        assert!(matches!(
            decode_event("Trade", json!("oops")),
            Err(KuruError::Decode(_))
        ));
    }
}
