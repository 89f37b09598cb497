//! Live update relay for POS, KDS and admin screens
//!
//! ```text
//! services (order / chat / day)
//!       │ RealtimeEvent
//!       ▼
//!   EventHub ── broadcast::Sender ──┬── socket session (topic filter) ── POS
//!                                   ├── socket session (topic filter) ── KDS
//!                                   └── socket session (topic filter) ── admin
//! ```

pub mod ws;

use std::collections::HashSet;

use shared::{RealtimeEvent, Topic};
use tokio::sync::broadcast;

pub use ws::handle_ws;

/// Fan-out hub for realtime events
#[derive(Clone)]
pub struct EventHub {
    tx: broadcast::Sender<RealtimeEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event to every connected subscriber.
    ///
    /// Returns the number of subscribers that will see it. Having nobody
    /// listening is normal (no screens open) and not an error.
    pub fn publish(&self, event: RealtimeEvent) -> usize {
        let topic = event.topic();
        match self.tx.send(event) {
            Ok(receivers) => {
                tracing::trace!(%topic, receivers, "event published");
                receivers
            }
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Topics a socket session currently wants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFilter {
    topics: HashSet<Topic>,
}

impl TopicFilter {
    /// New sessions receive everything until they narrow their subscription
    pub fn all() -> Self {
        Self {
            topics: Topic::ALL.iter().copied().collect(),
        }
    }

    pub fn subscribe(&mut self, topics: &[Topic]) {
        self.topics.extend(topics.iter().copied());
    }

    pub fn unsubscribe(&mut self, topics: &[Topic]) {
        for topic in topics {
            self.topics.remove(topic);
        }
    }

    pub fn accepts(&self, event: &RealtimeEvent) -> bool {
        self.topics.contains(&event.topic())
    }

    /// Sorted for stable output in `ready` frames
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self.topics.iter().copied().collect();
        topics.sort_by_key(|t| t.as_str());
        topics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ChatStatus;
    use uuid::Uuid;

    fn chat_event() -> RealtimeEvent {
        RealtimeEvent::ChatStatusChanged {
            chat_id: Uuid::new_v4(),
            status: ChatStatus::Open,
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let hub = EventHub::new(8);
        assert_eq!(hub.publish(chat_event()), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let hub = EventHub::new(8);
        let mut rx = hub.subscribe();
        assert_eq!(hub.publish(chat_event()), 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.topic(), Topic::Chat);
    }

    #[test]
    fn test_topic_filter() {
        let mut filter = TopicFilter::all();
        assert!(filter.accepts(&chat_event()));

        filter.unsubscribe(&[Topic::Chat]);
        assert!(!filter.accepts(&chat_event()));
        assert_eq!(filter.topics(), vec![Topic::Day, Topic::Orders]);

        filter.subscribe(&[Topic::Chat]);
        assert!(filter.accepts(&chat_event()));
    }
}
