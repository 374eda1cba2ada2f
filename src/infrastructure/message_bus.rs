use crate::domain::message::MessageEnvelope;
use crate::domain::ports::{MessageBus, MessageSubscription};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;

/// In-process stand-in for the page's `message` event channel.
///
/// Every subscriber gets its own unbounded queue. Subscriptions remove
/// themselves from the registry when dropped, so `listener_count` reflects
/// exactly the listeners still alive.
#[derive(Default, Clone)]
pub struct ChannelMessageBus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, mpsc::UnboundedSender<MessageEnvelope>>>,
}

impl BusInner {
    fn listeners(&self) -> MutexGuard<'_, HashMap<u64, mpsc::UnboundedSender<MessageEnvelope>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Unsubscribe {
    id: u64,
    bus: Weak<BusInner>,
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.listeners().remove(&self.id);
        }
    }
}

impl ChannelMessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `envelope` to every live listener; returns how many got it.
    pub fn publish(&self, envelope: MessageEnvelope) -> usize {
        let mut listeners = self.inner.listeners();
        listeners.retain(|_, tx| !tx.is_closed());
        listeners
            .values()
            .filter(|tx| tx.send(envelope.clone()).is_ok())
            .count()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners().len()
    }
}

impl MessageBus for ChannelMessageBus {
    fn subscribe(&self) -> MessageSubscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.listeners().insert(id, tx);
        MessageSubscription::new(
            rx,
            Unsubscribe {
                id,
                bus: Arc::downgrade(&self.inner),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::MessageOrigin;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = ChannelMessageBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let delivered = bus.publish(MessageEnvelope::new(MessageOrigin::Embedded, json!({"x": 1})));
        assert_eq!(delivered, 2);
        assert_eq!(a.recv().await.unwrap().data, json!({"x": 1}));
        assert_eq!(b.recv().await.unwrap().data, json!({"x": 1}));
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = ChannelMessageBus::new();
        let sub = bus.subscribe();
        assert_eq!(bus.listener_count(), 1);
        drop(sub);
        assert_eq!(bus.listener_count(), 0);
        assert_eq!(
            bus.publish(MessageEnvelope::new(MessageOrigin::Popup, json!(null))),
            0
        );
    }
}
