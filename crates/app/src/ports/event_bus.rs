//! Event bus port: publish, and one-shot subscriptions delivered to an
//! entry's inbox.

use std::future::Future;
use std::sync::Arc;

use axlink_domain::error::AxlinkError;
use axlink_domain::event::{Event, EventType};
use axlink_domain::id::SubscriptionId;

use crate::inbox::EntryInbox;

/// Publishes events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), AxlinkError>> + Send;
}

/// Registers one-shot listeners on the bus.
pub trait EventSubscriber {
    /// Deliver the next event of `event_type` to `inbox`, then drop the
    /// subscription.
    fn listen_once(
        &self,
        event_type: EventType,
        inbox: EntryInbox,
    ) -> impl Future<Output = Result<SubscriptionId, AxlinkError>> + Send;

    /// Cancel a subscription. Returns `false` if it already fired or was
    /// never registered.
    fn unsubscribe(
        &self,
        id: SubscriptionId,
    ) -> impl Future<Output = Result<bool, AxlinkError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for Arc<T> {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), AxlinkError>> + Send {
        (**self).publish(event)
    }
}

impl<T: EventSubscriber + Send + Sync> EventSubscriber for Arc<T> {
    fn listen_once(
        &self,
        event_type: EventType,
        inbox: EntryInbox,
    ) -> impl Future<Output = Result<SubscriptionId, AxlinkError>> + Send {
        (**self).listen_once(event_type, inbox)
    }

    fn unsubscribe(
        &self,
        id: SubscriptionId,
    ) -> impl Future<Output = Result<bool, AxlinkError>> + Send {
        (**self).unsubscribe(id)
    }
}
