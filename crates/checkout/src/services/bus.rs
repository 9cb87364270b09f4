//! Notification bus trait and in-memory implementation.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::ServiceError;

/// Message metadata sent alongside the payload.
pub type MessageHeaders = BTreeMap<String, String>;

/// A message as accepted by the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub headers: MessageHeaders,
}

/// Trait for publishing to the notification bus.
///
/// `Ok` means the bus accepted the message, not that it was delivered.
#[async_trait]
pub trait NotificationBus: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        headers: MessageHeaders,
    ) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryBusState {
    messages: Vec<PublishedMessage>,
    fail_on_publish: bool,
    publish_calls: usize,
}

/// In-memory bus that records accepted messages.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationBus {
    state: Arc<RwLock<InMemoryBusState>>,
}

impl InMemoryNotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the bus to refuse publishes.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().unwrap().fail_on_publish = fail;
    }

    /// Returns the accepted messages in publish order.
    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.state.read().unwrap().messages.clone()
    }

    pub fn message_count(&self) -> usize {
        self.state.read().unwrap().messages.len()
    }

    /// Returns how many publishes were attempted, accepted or not.
    pub fn publish_calls(&self) -> usize {
        self.state.read().unwrap().publish_calls
    }
}

#[async_trait]
impl NotificationBus for InMemoryNotificationBus {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        headers: MessageHeaders,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.write().unwrap();
        state.publish_calls += 1;

        if state.fail_on_publish {
            return Err(ServiceError::Unavailable("bus connection lost".to_string()));
        }

        state.messages.push(PublishedMessage {
            topic: topic.to_string(),
            payload,
            headers,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_records_message() {
        let bus = InMemoryNotificationBus::new();
        let mut headers = MessageHeaders::new();
        headers.insert("k".to_string(), "v".to_string());

        bus.publish("email", b"hello".to_vec(), headers.clone())
            .await
            .unwrap();

        let messages = bus.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].topic, "email");
        assert_eq!(messages[0].payload, b"hello");
        assert_eq!(messages[0].headers, headers);
    }

    #[tokio::test]
    async fn test_fail_on_publish() {
        let bus = InMemoryNotificationBus::new();
        bus.set_fail_on_publish(true);
        assert!(bus.publish("email", Vec::new(), MessageHeaders::new()).await.is_err());
        assert_eq!(bus.message_count(), 0);
        assert_eq!(bus.publish_calls(), 1);
    }
}
