//! Publishing of order lifecycle events after they are committed.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::events::OrderEvent;

pub const SUBJECT_PREFIX: &str = "orders";

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Best effort: a failed publish is logged, never surfaced to the caller.
    async fn publish(&self, events: &[OrderEvent]);
}

pub struct NatsPublisher {
    client: async_nats::Client,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client) -> Self { Self { client } }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, events: &[OrderEvent]) {
        for event in events {
            let subject = format!("{SUBJECT_PREFIX}.{}", event.name());
            let payload = match serde_json::to_vec(event) {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, %subject, "failed to encode order event");
                    continue;
                }
            };
            if let Err(e) = self.client.publish(subject.clone(), payload.into()).await {
                warn!(error = %e, %subject, "failed to publish order event");
            }
        }
    }
}

/// Used when no broker is configured.
#[derive(Clone, Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, events: &[OrderEvent]) {
        for event in events {
            info!(event = event.name(), ?event, "order event");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct RecordingPublisher {
        pub events: Mutex<Vec<OrderEvent>>,
    }

    impl RecordingPublisher {
        pub(crate) fn names(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().iter().map(OrderEvent::name).collect()
        }
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, events: &[OrderEvent]) {
            self.events.lock().unwrap().extend_from_slice(events);
        }
    }

    #[test]
    fn test_event_payload_shape() {
        let json = serde_json::to_value(OrderEvent::Confirmed { order_id: 7 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "confirmed", "order_id": 7}));
    }
}
