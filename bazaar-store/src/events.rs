use async_trait::async_trait;
use bazaar_core::Notifier;
use bazaar_shared::models::DomainEvent;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
    ) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!(
                    "Sent message to {}/{}: partition {} offset {}",
                    topic, key, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }
}

/// Publishes every domain event as JSON, keyed by order id so one order's
/// events stay on one partition and arrive in order.
#[derive(Clone)]
pub struct KafkaNotifier {
    producer: EventProducer,
    topic: String,
}

impl KafkaNotifier {
    pub fn new(producer: EventProducer, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }
}

pub fn event_key(event: &DomainEvent) -> String {
    event.order_id().to_string()
}

#[async_trait]
impl Notifier for KafkaNotifier {
    async fn notify(
        &self,
        event: &DomainEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let payload = serde_json::to_string(event)?;
        self.producer
            .publish(&self.topic, &event_key(event), &payload)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_shared::models::{OrderStatus, OrderStatusChangedEvent};
    use uuid::Uuid;

    #[test]
    fn test_events_are_keyed_by_order() {
        let event = DomainEvent::OrderStatusChanged(OrderStatusChangedEvent {
            event_id: Uuid::new_v4(),
            order_id: 314,
            order_number: "ORD-20260301-000314".to_string(),
            user_id: 9,
            from: OrderStatus::Shipped,
            to: OrderStatus::OutForDelivery,
            timestamp: 0,
        });

        assert_eq!(event_key(&event), "314");
        let json: serde_json::Value = serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(json["type"], "ORDER_STATUS_CHANGED");
        assert_eq!(json["to"], "OUT_FOR_DELIVERY");
    }
}
