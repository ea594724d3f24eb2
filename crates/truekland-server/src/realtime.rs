use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

use truekland_shared::events::ChangeEvent;
use truekland_shared::UserId;

const SUBSCRIBER_BUFFER: usize = 256;

/// Fan-out of [`ChangeEvent`]s to connected users.
///
/// A user may hold several subscriptions (one per open tab). Delivery never
/// blocks the publisher: a subscriber whose buffer is full misses the event
/// and is expected to resync over REST.
#[derive(Clone, Default)]
pub struct EventHub {
    subscribers: Arc<RwLock<HashMap<UserId, Vec<mpsc::Sender<ChangeEvent>>>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, user: UserId) -> mpsc::Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let mut subscribers = self.subscribers.write().await;
        let senders = subscribers.entry(user).or_default();
        senders.push(tx);

        info!(user = %user, streams = senders.len(), "Realtime subscriber connected");
        rx
    }

    pub async fn publish_to(&self, user: UserId, event: &ChangeEvent) {
        let subscribers = self.subscribers.read().await;
        let Some(senders) = subscribers.get(&user) else {
            return;
        };

        for tx in senders {
            if tx.try_send(event.clone()).is_err() {
                debug!(
                    user = %user,
                    event = event.name(),
                    "Dropping event for slow or closed subscriber"
                );
            }
        }
    }

    pub async fn publish_to_many(&self, users: &[UserId], event: &ChangeEvent) {
        for user in users {
            self.publish_to(*user, event).await;
        }
    }

    /// Deliver to every connected user.
    pub async fn broadcast(&self, event: &ChangeEvent) {
        let users: Vec<UserId> = self.subscribers.read().await.keys().copied().collect();
        self.publish_to_many(&users, event).await;
    }

    /// Forget subscriptions whose receiving end is gone.
    pub async fn purge_closed(&self) {
        let mut subscribers = self.subscribers.write().await;
        subscribers.retain(|_, senders| {
            senders.retain(|tx| !tx.is_closed());
            !senders.is_empty()
        });
    }

    /// Number of users with at least one open stream.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use truekland_shared::ChatId;

    #[tokio::test]
    async fn test_publish_reaches_only_target() {
        let hub = EventHub::new();
        let ana = UserId::new();
        let ben = UserId::new();
        let mut ana_rx = hub.subscribe(ana).await;
        let mut ben_rx = hub.subscribe(ben).await;

        let event = ChangeEvent::ChatDeleted {
            chat_id: ChatId::new(),
        };
        hub.publish_to(ana, &event).await;

        assert_eq!(ana_rx.try_recv().unwrap(), event);
        assert!(ben_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_multiple_streams_and_broadcast() {
        let hub = EventHub::new();
        let ana = UserId::new();
        let mut tab1 = hub.subscribe(ana).await;
        let mut tab2 = hub.subscribe(ana).await;
        let mut ben = hub.subscribe(UserId::new()).await;
        assert_eq!(hub.subscriber_count().await, 2);

        let event = ChangeEvent::ChatDeleted {
            chat_id: ChatId::new(),
        };
        hub.broadcast(&event).await;

        assert!(tab1.try_recv().is_ok());
        assert!(tab2.try_recv().is_ok());
        assert!(ben.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_purge_closed() {
        let hub = EventHub::new();
        let ana = UserId::new();
        let rx = hub.subscribe(ana).await;
        drop(rx);

        hub.purge_closed().await;
        assert_eq!(hub.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_full_buffer_drops_instead_of_blocking() {
        let hub = EventHub::new();
        let ana = UserId::new();
        let mut rx = hub.subscribe(ana).await;
        let event = ChangeEvent::ChatDeleted {
            chat_id: ChatId::new(),
        };

        for _ in 0..SUBSCRIBER_BUFFER + 10 {
            hub.publish_to(ana, &event).await;
        }

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, SUBSCRIBER_BUFFER);
    }
}
