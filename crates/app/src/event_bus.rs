//! In-process event bus backed by a tokio broadcast channel.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use tokio::sync::broadcast;

use axlink_domain::error::AxlinkError;
use axlink_domain::event::{Event, EventType};
use axlink_domain::id::SubscriptionId;

use crate::inbox::EntryInbox;
use crate::ports::{EventPublisher, EventSubscriber};

struct OnceListener {
    event_type: EventType,
    inbox: EntryInbox,
}

/// In-process event bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the event is simply dropped). One-shot listeners registered through
/// [`EventSubscriber::listen_once`] are served before the broadcast and
/// removed as they fire.
pub struct InProcessEventBus {
    sender: broadcast::Sender<Event>,
    once: Mutex<HashMap<SubscriptionId, OnceListener>>,
}

impl InProcessEventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            once: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to events on this bus.
    ///
    /// Returns a receiver that will get all events published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Number of one-shot listeners still waiting for their event.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.listeners().len()
    }

    fn listeners(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriptionId, OnceListener>> {
        // A poisoned map is still consistent: every operation is a single
        // insert or remove.
        self.once
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn fire_once(&self, event: &Event) {
        let fired: Vec<OnceListener> = {
            let mut listeners = self.listeners();
            let ids: Vec<SubscriptionId> = listeners
                .iter()
                .filter(|(_, listener)| listener.event_type == event.event_type)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| listeners.remove(&id))
                .collect()
        };
        for listener in fired {
            if !listener.inbox.deliver(event.clone()) {
                tracing::debug!(
                    entry_id = %listener.inbox.entry_id(),
                    event_type = %event.event_type,
                    "listener inbox closed, event dropped"
                );
            }
        }
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), AxlinkError>> + Send {
        self.fire_once(&event);
        // broadcast::send fails only when there are zero receivers,
        // which is fine; we simply ignore the error.
        let _ = self.sender.send(event);
        async { Ok(()) }
    }
}

impl EventSubscriber for InProcessEventBus {
    fn listen_once(
        &self,
        event_type: EventType,
        inbox: EntryInbox,
    ) -> impl Future<Output = Result<SubscriptionId, AxlinkError>> + Send {
        let id = SubscriptionId::new();
        self.listeners()
            .insert(id, OnceListener { event_type, inbox });
        async move { Ok(id) }
    }

    fn unsubscribe(
        &self,
        id: SubscriptionId,
    ) -> impl Future<Output = Result<bool, AxlinkError>> + Send {
        let removed = self.listeners().remove(&id).is_some();
        async move { Ok(removed) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbox::{self, EntryCommand};
    use axlink_domain::id::EntryId;

    #[tokio::test]
    async fn should_deliver_event_to_subscriber() {
        let bus = InProcessEventBus::new(16);
        let mut rx = bus.subscribe();

        let event = Event::new(
            EventType::DeviceEvent,
            Some(EntryId::new()),
            serde_json::json!({"topic": "tns1:Device/IO/Port", "active": true}),
        );
        let event_id = event.id;

        bus.publish(event).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, event_id);
    }

    #[tokio::test]
    async fn should_succeed_when_no_subscribers() {
        let bus = InProcessEventBus::new(16);
        let event = Event::new(EventType::HostStop, None, serde_json::json!({}));
        let result = bus.publish(event).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn should_deliver_once_listener_a_single_time() {
        let bus = InProcessEventBus::new(16);
        let (tx, mut rx) = inbox::channel();
        let entry_id = EntryId::new();
        bus.listen_once(EventType::HostStop, EntryInbox::new(entry_id, tx))
            .await
            .unwrap();
        assert_eq!(bus.subscription_count(), 1);

        let stop = Event::new(EventType::HostStop, None, serde_json::json!({}));
        bus.publish(stop.clone()).await.unwrap();
        bus.publish(stop.clone()).await.unwrap();

        assert_eq!(bus.subscription_count(), 0);
        assert_eq!(
            rx.recv().await,
            Some(EntryCommand::Event {
                entry_id,
                event: stop
            })
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_ignore_other_event_types_for_once_listener() {
        let bus = InProcessEventBus::new(16);
        let (tx, mut rx) = inbox::channel();
        bus.listen_once(EventType::HostStop, EntryInbox::new(EntryId::new(), tx))
            .await
            .unwrap();

        let event = Event::new(EventType::DeviceEvent, None, serde_json::json!({}));
        bus.publish(event).await.unwrap();

        assert_eq!(bus.subscription_count(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_unsubscribe_pending_listener() {
        let bus = InProcessEventBus::new(16);
        let (tx, _rx) = inbox::channel();
        let id = bus
            .listen_once(EventType::HostStop, EntryInbox::new(EntryId::new(), tx))
            .await
            .unwrap();

        assert!(bus.unsubscribe(id).await.unwrap());
        assert!(!bus.unsubscribe(id).await.unwrap());
        assert_eq!(bus.subscription_count(), 0);
    }
}
