//! Best-effort purchase confirmation publishing.

use std::sync::Arc;
use std::time::Duration;

use common::{Money, OrderId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::checkout_flow;
use crate::context::{CheckoutContext, REQUEST_ID_HEADER, bounded};
use crate::error::ServiceError;
use crate::services::bus::{MessageHeaders, NotificationBus};

/// Payload of the purchase-confirmation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationEmail {
    pub from: String,
    pub to: String,
    pub content_type: String,
    pub subject: String,
    pub content: String,
}

impl ConfirmationEmail {
    pub fn for_order(from: &str, to: &str, order_id: &OrderId, total: Money) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            content_type: "text/plain".to_string(),
            subject: format!("You just created order {order_id}"),
            content: format!("Your order {order_id} was created and paid. Total charged: {total}."),
        }
    }
}

/// What happened to a confirmation. Never an error for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    Failed(String),
}

/// Hands confirmations to the notification bus, swallowing failures.
pub struct NotificationPublisher<N: NotificationBus> {
    bus: Arc<N>,
    topic: String,
    sender: String,
    call_timeout: Duration,
}

impl<N: NotificationBus> NotificationPublisher<N> {
    pub fn new(bus: Arc<N>, topic: impl Into<String>, sender: impl Into<String>, call_timeout: Duration) -> Self {
        Self {
            bus,
            topic: topic.into(),
            sender: sender.into(),
            call_timeout,
        }
    }

    /// Publishes a confirmation for `order_id` to `recipient`.
    ///
    /// The caller's trace context is propagated as a child span in the
    /// message headers so consumers can correlate the message.
    #[tracing::instrument(skip(self, recipient, ctx), fields(topic = %self.topic))]
    pub async fn publish_confirmation(
        &self,
        run_id: Uuid,
        recipient: &str,
        order_id: &OrderId,
        total: Money,
        ctx: &CheckoutContext,
    ) -> PublishOutcome {
        match self.try_publish(run_id, recipient, order_id, total, ctx).await {
            Ok(()) => {
                tracing::info!(%order_id, "purchase confirmation published");
                PublishOutcome::Published
            }
            Err(e) => {
                metrics::counter!(
                    "checkout_noncritical_failures_total",
                    "step" => checkout_flow::STEP_PUBLISH_NOTIFICATION
                )
                .increment(1);
                tracing::warn!(%order_id, error = %e, "purchase confirmation not published");
                PublishOutcome::Failed(e.to_string())
            }
        }
    }

    async fn try_publish(
        &self,
        run_id: Uuid,
        recipient: &str,
        order_id: &OrderId,
        total: Money,
        ctx: &CheckoutContext,
    ) -> Result<(), ServiceError> {
        let email = ConfirmationEmail::for_order(&self.sender, recipient, order_id, total);
        let payload = serde_json::to_vec(&email)
            .map_err(|e| ServiceError::Rejected(format!("unencodable payload: {e}")))?;

        let mut headers = MessageHeaders::new();
        ctx.trace().child().inject(&mut headers);
        headers.insert(REQUEST_ID_HEADER.to_string(), run_id.to_string());

        bounded(
            checkout_flow::STEP_PUBLISH_NOTIFICATION,
            self.call_timeout,
            self.bus.publish(&self.topic, payload, headers),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{TRACEPARENT_HEADER, TraceContext};
    use crate::services::bus::InMemoryNotificationBus;

    fn publisher(bus: &InMemoryNotificationBus) -> NotificationPublisher<InMemoryNotificationBus> {
        NotificationPublisher::new(
            Arc::new(bus.clone()),
            "email",
            "from@example.com",
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_publishes_payload_with_trace_context() {
        let bus = InMemoryNotificationBus::new();
        let (ctx, _handle) = CheckoutContext::new(TraceContext::new_root());
        let run_id = Uuid::new_v4();

        let outcome = publisher(&bus)
            .publish_confirmation(
                run_id,
                "buyer@example.com",
                &OrderId::new("ORD1"),
                Money::from_dollars(25),
                &ctx,
            )
            .await;
        assert_eq!(outcome, PublishOutcome::Published);

        let messages = bus.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].topic, "email");

        let email: ConfirmationEmail = serde_json::from_slice(&messages[0].payload).unwrap();
        assert_eq!(email.from, "from@example.com");
        assert_eq!(email.to, "buyer@example.com");
        assert_eq!(email.content_type, "text/plain");
        assert!(email.subject.contains("ORD1"));
        assert!(email.content.contains("$25.00"));

        let traceparent = messages[0].headers.get(TRACEPARENT_HEADER).unwrap();
        let propagated = TraceContext::from_traceparent(traceparent).unwrap();
        assert_eq!(propagated.trace_id(), ctx.trace().trace_id());
        assert_eq!(
            messages[0].headers.get(REQUEST_ID_HEADER),
            Some(&run_id.to_string())
        );
    }

    #[tokio::test]
    async fn test_bus_failure_is_swallowed() {
        let bus = InMemoryNotificationBus::new();
        bus.set_fail_on_publish(true);

        let outcome = publisher(&bus)
            .publish_confirmation(
                Uuid::new_v4(),
                "buyer@example.com",
                &OrderId::new("ORD1"),
                Money::from_dollars(1),
                &CheckoutContext::background(),
            )
            .await;

        assert!(matches!(outcome, PublishOutcome::Failed(_)));
        assert_eq!(bus.message_count(), 0);
    }
}
