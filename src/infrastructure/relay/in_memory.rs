//! In-process broker backed by bounded tokio channels.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::service::{
    ClickBroker, DEFAULT_REDELIVERY_AFTER, Delivery, PartitionConsumer, RedeliverySchedule,
    RelayError, RelayResult,
};

/// One bounded mpsc channel per partition.
///
/// Messages live only in memory and each partition can be subscribed once.
/// A delivery the consumer does not acknowledge is kept by that consumer and
/// offered again after the redelivery delay; it is lost with the process.
pub struct InMemoryBroker {
    channel: String,
    senders: Vec<mpsc::Sender<Delivery>>,
    receivers: Vec<Mutex<Option<mpsc::Receiver<Delivery>>>>,
    next_id: AtomicU64,
    redelivery_after: Duration,
}

impl InMemoryBroker {
    /// Creates `partitions` channels holding up to `capacity` messages each.
    pub fn new(channel: impl Into<String>, partitions: u32, capacity: usize) -> Self {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..partitions.max(1))
            .map(|_| {
                let (tx, rx) = mpsc::channel(capacity.max(1));
                (tx, Mutex::new(Some(rx)))
            })
            .unzip();

        debug!("Using InMemoryBroker (relay messages are not persisted)");
        Self {
            channel: channel.into(),
            senders,
            receivers,
            next_id: AtomicU64::new(1),
            redelivery_after: DEFAULT_REDELIVERY_AFTER,
        }
    }

    /// Sets the delay before unacknowledged deliveries are offered again.
    pub fn with_redelivery_after(mut self, after: Duration) -> Self {
        self.redelivery_after = after;
        self
    }
}

#[async_trait]
impl ClickBroker for InMemoryBroker {
    fn channel(&self) -> &str {
        &self.channel
    }

    fn partitions(&self) -> u32 {
        self.senders.len() as u32
    }

    async fn publish(&self, partition: u32, payload: &[u8]) -> RelayResult<()> {
        let sender = self
            .senders
            .get(partition as usize)
            .ok_or(RelayError::UnknownPartition(partition))?;

        let delivery = Delivery {
            id: self.next_id.fetch_add(1, Ordering::Relaxed).to_string(),
            partition,
            payload: payload.to_vec(),
        };

        sender
            .send(delivery)
            .await
            .map_err(|_| RelayError::PublishError(format!("partition {} is closed", partition)))
    }

    async fn subscribe(&self, partition: u32) -> RelayResult<Box<dyn PartitionConsumer>> {
        let slot = self
            .receivers
            .get(partition as usize)
            .ok_or(RelayError::UnknownPartition(partition))?;

        let receiver = slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| {
                RelayError::ConnectionError(format!(
                    "partition {} already has a consumer",
                    partition
                ))
            })?;

        Ok(Box::new(InMemoryPartition {
            receiver,
            in_flight: None,
            unacked: VecDeque::new(),
            replay: VecDeque::new(),
            schedule: RedeliverySchedule::new(self.redelivery_after),
        }))
    }

    async fn health_check(&self) -> bool {
        true
    }
}

struct InMemoryPartition {
    receiver: mpsc::Receiver<Delivery>,
    /// Last delivery handed out and not yet acknowledged.
    in_flight: Option<Delivery>,
    unacked: VecDeque<Delivery>,
    replay: VecDeque<Delivery>,
    schedule: RedeliverySchedule,
}

impl InMemoryPartition {
    fn hand_out(&mut self, delivery: Delivery) -> RelayResult<Option<Delivery>> {
        self.in_flight = Some(delivery.clone());
        Ok(Some(delivery))
    }
}

#[async_trait]
impl PartitionConsumer for InMemoryPartition {
    async fn next(&mut self) -> RelayResult<Option<Delivery>> {
        if let Some(unacked) = self.in_flight.take() {
            self.schedule.mark_pending();
            self.unacked.push_back(unacked);
        }

        loop {
            if let Some(delivery) = self.replay.pop_front() {
                return self.hand_out(delivery);
            }
            if self.schedule.take_due() {
                self.replay.append(&mut self.unacked);
                continue;
            }

            let deadline = self.schedule.deadline();
            let received = tokio::select! {
                received = self.receiver.recv() => Some(received),
                _ = async {
                    match deadline {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending().await,
                    }
                } => None,
            };

            match received {
                Some(Some(delivery)) => return self.hand_out(delivery),
                Some(None) => return Ok(None),
                None => {}
            }
        }
    }

    async fn ack(&mut self, delivery: &Delivery) -> RelayResult<()> {
        if self.in_flight.as_ref().is_some_and(|d| d.id == delivery.id) {
            self.in_flight = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_messages_arrive_in_publish_order() {
        let broker = InMemoryBroker::new("ad-clicks", 2, 16);
        let mut consumer = broker.subscribe(1).await.unwrap();

        broker.publish(1, b"first").await.unwrap();
        broker.publish(1, b"second").await.unwrap();

        let a = consumer.next().await.unwrap().unwrap();
        let b = consumer.next().await.unwrap().unwrap();
        assert_eq!(a.payload, b"first");
        assert_eq!(b.payload, b"second");
        assert_eq!(a.partition, 1);
        assert_ne!(a.id, b.id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unacknowledged_delivery_is_offered_again() {
        let broker =
            InMemoryBroker::new("ad-clicks", 1, 16).with_redelivery_after(Duration::from_secs(5));
        let mut consumer = broker.subscribe(0).await.unwrap();

        broker.publish(0, b"fails once").await.unwrap();
        let first = consumer.next().await.unwrap().unwrap();

        // Not acknowledged: the next call waits out the delay, then re-offers it.
        let started = tokio::time::Instant::now();
        let again = consumer.next().await.unwrap().unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.payload, b"fails once");
        assert!(started.elapsed() >= Duration::from_secs(5));

        consumer.ack(&again).await.unwrap();
        broker.publish(0, b"next").await.unwrap();
        let next = consumer.next().await.unwrap().unwrap();
        assert_eq!(next.payload, b"next");
        consumer.ack(&next).await.unwrap();

        assert!(
            tokio::time::timeout(Duration::from_secs(60), consumer.next())
                .await
                .is_err(),
            "acknowledged deliveries must not come back"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_messages_are_not_held_back_by_pending_redelivery() {
        let broker =
            InMemoryBroker::new("ad-clicks", 1, 16).with_redelivery_after(Duration::from_secs(5));
        let mut consumer = broker.subscribe(0).await.unwrap();

        broker.publish(0, b"a").await.unwrap();
        broker.publish(0, b"b").await.unwrap();

        let a = consumer.next().await.unwrap().unwrap();
        let b = consumer.next().await.unwrap().unwrap();
        assert_eq!(b.payload, b"b");
        consumer.ack(&b).await.unwrap();

        let replayed = consumer.next().await.unwrap().unwrap();
        assert_eq!(replayed.id, a.id);
    }

    #[tokio::test]
    async fn test_unknown_partition_is_rejected() {
        let broker = InMemoryBroker::new("ad-clicks", 2, 16);

        assert!(matches!(
            broker.publish(5, b"x").await,
            Err(RelayError::UnknownPartition(5))
        ));
        assert!(broker.subscribe(2).await.is_err());
    }

    #[tokio::test]
    async fn test_partition_can_only_be_subscribed_once() {
        let broker = InMemoryBroker::new("ad-clicks", 1, 16);

        assert!(broker.subscribe(0).await.is_ok());
        assert!(broker.subscribe(0).await.is_err());
    }
}
