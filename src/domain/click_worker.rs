//! Relay consumer: one worker task per partition.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::services::ClickService;
use crate::domain::click_event::ClickEvent;
use crate::error::AppError;
use crate::infrastructure::relay::{ClickBroker, Delivery, PartitionConsumer};

const RECEIVE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// What happened to one relayed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Persisted; acknowledged.
    Recorded,
    /// Can never succeed (undecodable, invalid or for a removed
    /// advertisement); acknowledged and dropped.
    Discarded,
    /// A dependency failed; left unacknowledged for the channel to redeliver.
    Redeliver,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Recorded => "recorded",
            DeliveryOutcome::Discarded => "discarded",
            DeliveryOutcome::Redeliver => "redeliver",
        }
    }

    fn should_ack(&self) -> bool {
        !matches!(self, DeliveryOutcome::Redeliver)
    }
}

/// Running set of partition workers.
pub struct ClickWorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl ClickWorkerPool {
    /// Subscribes to every partition of `broker` and spawns a worker for each.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Dependency`] if any partition cannot be subscribed.
    /// Workers already spawned are stopped before returning.
    pub async fn start(
        broker: Arc<dyn ClickBroker>,
        clicks: Arc<ClickService>,
    ) -> Result<Self, AppError> {
        let (shutdown, rx) = watch::channel(false);
        let mut pool = Self {
            handles: Vec::with_capacity(broker.partitions() as usize),
            shutdown,
        };

        for partition in 0..broker.partitions() {
            let consumer = match broker.subscribe(partition).await {
                Ok(consumer) => consumer,
                Err(e) => {
                    pool.shutdown().await;
                    return Err(e.into());
                }
            };
            pool.handles.push(tokio::spawn(run_partition_worker(
                partition,
                consumer,
                Arc::clone(&clicks),
                rx.clone(),
            )));
        }

        info!(
            channel = broker.channel(),
            workers = pool.handles.len(),
            "Click relay workers started"
        );
        Ok(pool)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Signals every worker to stop after its current message and waits for all of them.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Click relay worker panicked");
            }
        }
        info!("Click relay workers stopped");
    }
}

/// Consumes one partition in delivery order until shutdown or the partition closes.
pub async fn run_partition_worker(
    partition: u32,
    mut consumer: Box<dyn PartitionConsumer>,
    clicks: Arc<ClickService>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let received = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            received = consumer.next() => received,
        };

        match received {
            Ok(Some(delivery)) => {
                handle_delivery(consumer.as_mut(), &clicks, &delivery).await;
            }
            Ok(None) => {
                info!(partition, "Relay partition closed");
                break;
            }
            Err(e) => {
                warn!(partition, error = %e, "Relay receive failed");
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(RECEIVE_RETRY_DELAY) => {}
                }
            }
        }
    }
}

async fn handle_delivery(
    consumer: &mut dyn PartitionConsumer,
    clicks: &ClickService,
    delivery: &Delivery,
) {
    let started = Instant::now();
    let outcome = process_delivery(clicks, delivery).await;
    metrics::counter!("relay_messages_total", "outcome" => outcome.as_str()).increment(1);
    metrics::histogram!("relay_processing_duration_seconds", "outcome" => outcome.as_str())
        .record(started.elapsed().as_secs_f64());

    if outcome.should_ack()
        && let Err(e) = consumer.ack(delivery).await
    {
        warn!(
            partition = delivery.partition,
            id = %delivery.id,
            error = %e,
            "Failed to acknowledge relay message"
        );
    }
}

/// Decodes and records one relayed message. Never panics or propagates.
pub async fn process_delivery(clicks: &ClickService, delivery: &Delivery) -> DeliveryOutcome {
    let event = match ClickEvent::decode(&delivery.payload) {
        Ok(event) => event,
        Err(e) => {
            warn!(
                partition = delivery.partition,
                id = %delivery.id,
                error = %e,
                "Discarding undecodable relay message"
            );
            return DeliveryOutcome::Discarded;
        }
    };

    match clicks.record_relayed(event).await {
        Ok(()) => DeliveryOutcome::Recorded,
        Err(e) if e.is_permanent() => {
            warn!(
                partition = delivery.partition,
                id = %delivery.id,
                error = %e,
                "Discarding rejected relay message"
            );
            DeliveryOutcome::Discarded
        }
        Err(e) => {
            error!(
                partition = delivery.partition,
                id = %delivery.id,
                error = %e,
                "Relay message not recorded, leaving for redelivery"
            );
            DeliveryOutcome::Redeliver
        }
    }
}
