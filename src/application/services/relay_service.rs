//! Publishing admitted clicks onto the relay channel.

use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use crate::domain::click_event::ClickEvent;
use crate::error::AppError;
use crate::infrastructure::relay::{ClickBroker, partition_for};
use crate::resilience::{BreakerRegistry, Dependency};

/// Encodes click events and publishes them, keyed by advertisement id.
///
/// All events for one advertisement land on the same partition, so they are
/// consumed in publish order.
pub struct RelayPublisher {
    broker: Arc<dyn ClickBroker>,
    breakers: Arc<BreakerRegistry>,
}

impl RelayPublisher {
    pub fn new(broker: Arc<dyn ClickBroker>, breakers: Arc<BreakerRegistry>) -> Self {
        Self { broker, breakers }
    }

    /// Publishes one event and returns the partition it was written to.
    ///
    /// Returns only after the broker confirmed the write.
    ///
    /// # Errors
    ///
    /// - [`AppError::Internal`] if the event cannot be encoded.
    /// - [`AppError::Dependency`] if the broker is unreachable or its breaker is open.
    pub async fn publish(&self, event: &ClickEvent) -> Result<u32, AppError> {
        let payload = event.encode().map_err(|e| {
            AppError::internal(
                "Failed to encode click event",
                json!({ "reason": e.to_string() }),
            )
        })?;
        let partition = partition_for(&event.ad_id, self.broker.partitions());

        self.breakers
            .get(Dependency::Relay)
            .call(|| self.broker.publish(partition, &payload))
            .await?;

        metrics::counter!("relay_published_total").increment(1);
        debug!(
            channel = self.broker.channel(),
            partition,
            ad_id = %event.ad_id,
            "Click published"
        );
        Ok(partition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::relay::InMemoryBroker;
    use crate::resilience::BreakerSettings;

    #[tokio::test]
    async fn test_publish_is_keyed_by_ad_id() {
        let broker = Arc::new(InMemoryBroker::new("ad-clicks", 4, 16));
        let publisher = RelayPublisher::new(
            broker.clone(),
            BreakerRegistry::shared(BreakerSettings::default()),
        );

        let event = ClickEvent::received("ad-42", "198.51.100.7".parse().unwrap(), 10);
        let first = publisher.publish(&event).await.unwrap();
        let second = publisher.publish(&event).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first, partition_for("ad-42", 4));

        let mut consumer = broker.subscribe(first).await.unwrap();
        let delivery = consumer.next().await.unwrap().unwrap();
        assert_eq!(ClickEvent::decode(&delivery.payload).unwrap(), event);
    }
}
