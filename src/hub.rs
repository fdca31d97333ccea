//! Per-topic fan-out of server events.
//!
//! Each topic owns a broadcast channel created on first subscribe. Publishing
//! never blocks; subscribers that fall behind the queue depth miss events and
//! catch up through history, and a disconnected channel is an implicit
//! unsubscribe.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::store::{MessagePreview, StoredMessage};
use crate::topic::Topic;

/// Unread-state push for one chat, delivered on the owner's alarm topic.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadSummary {
    pub chat_id: i64,
    pub unread_count: i64,
    pub latest_message: Option<MessagePreview>,
}

/// What can be broadcast to a topic's subscribers.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    Message(StoredMessage),
    Unread(UnreadSummary),
}

#[derive(Clone)]
pub struct Hub {
    topics: Arc<Mutex<HashMap<Topic, broadcast::Sender<ChatEvent>>>>,
    capacity: usize,
}

impl Hub {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
            capacity,
        }
    }

    /// Subscribe to a topic. Authorization has already happened by the time
    /// this is called.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<ChatEvent> {
        let mut topics = self.topics.lock().expect("hub lock");
        topics
            .entry(topic)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish to whoever currently listens on `topic`. Returns the number of
    /// subscribers the event reached.
    pub fn publish(&self, topic: Topic, event: ChatEvent) -> usize {
        let mut topics = self.topics.lock().expect("hub lock");
        let Some(sender) = topics.get(&topic) else {
            return 0;
        };

        match sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                // Last receiver went away; drop the topic entry.
                topics.remove(&topic);
                0
            }
        }
    }

    #[cfg(test)]
    fn topic_count(&self) -> usize {
        self.topics.lock().expect("hub lock").len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use tokio::time::timeout;

    use super::*;

    fn message(chat_id: i64, content: &str) -> StoredMessage {
        StoredMessage {
            message_id: 1,
            chat_id,
            sender_id: 1,
            sender_nickname: "amelia".to_string(),
            sender_profile_image: None,
            content: content.to_string(),
            image_urls: Vec::new(),
            sent_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn delivers_only_to_the_subscribed_topic() {
        let hub = Hub::new(16);
        let mut rx = hub.subscribe(Topic::Chat(1));

        hub.publish(Topic::Chat(2), ChatEvent::Message(message(2, "elsewhere")));
        let unexpected = timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(unexpected.is_err(), "received an event for another topic");

        hub.publish(Topic::Chat(1), ChatEvent::Message(message(1, "here")));
        let event = timeout(Duration::from_millis(250), rx.recv())
            .await
            .expect("expected an event within the timeout")
            .expect("channel open");

        match event {
            ChatEvent::Message(m) => assert_eq!(m.content, "here"),
            other => panic!("expected a message event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_reaches_nobody() {
        let hub = Hub::new(16);
        assert_eq!(
            hub.publish(Topic::Alarm(9), ChatEvent::Message(message(1, "x"))),
            0
        );
    }

    #[tokio::test]
    async fn dropped_subscribers_are_pruned_on_publish() {
        let hub = Hub::new(16);
        drop(hub.subscribe(Topic::Chat(1)));
        assert_eq!(hub.topic_count(), 1);

        hub.publish(Topic::Chat(1), ChatEvent::Message(message(1, "x")));
        assert_eq!(hub.topic_count(), 0);
    }

    #[tokio::test]
    async fn every_subscriber_of_a_topic_gets_the_event() {
        let hub = Hub::new(16);
        let mut rx_a = hub.subscribe(Topic::Chat(1));
        let mut rx_b = hub.subscribe(Topic::Chat(1));

        let reached = hub.publish(Topic::Chat(1), ChatEvent::Message(message(1, "hi")));
        assert_eq!(reached, 2);

        for rx in [&mut rx_a, &mut rx_b] {
            let event = timeout(Duration::from_millis(250), rx.recv())
                .await
                .expect("delivery")
                .expect("open");
            assert!(matches!(event, ChatEvent::Message(_)));
        }
    }
}
