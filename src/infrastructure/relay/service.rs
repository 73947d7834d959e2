//! Broker abstraction for the click relay.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::AppError;

/// Default delay before an unacknowledged delivery is offered again.
pub const DEFAULT_REDELIVERY_AFTER: Duration = Duration::from_secs(5);

/// Errors raised by a broker implementation.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Relay connection error: {0}")]
    ConnectionError(String),
    #[error("Relay publish error: {0}")]
    PublishError(String),
    #[error("Relay receive error: {0}")]
    ReceiveError(String),
    #[error("Relay partition {0} does not exist")]
    UnknownPartition(u32),
}

impl From<RelayError> for AppError {
    fn from(e: RelayError) -> Self {
        AppError::dependency("relay", e.to_string())
    }
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// One message handed to a partition worker.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Broker-assigned identifier used to acknowledge the message.
    pub id: String,
    pub partition: u32,
    pub payload: Vec<u8>,
}

/// A partitioned, at-least-once channel.
///
/// # Implementations
///
/// - [`crate::infrastructure::relay::RedisStreamBroker`] - Redis Streams with consumer groups
/// - [`crate::infrastructure::relay::InMemoryBroker`] - Bounded tokio channels
#[async_trait]
pub trait ClickBroker: Send + Sync {
    /// Name of the channel, for logs.
    fn channel(&self) -> &str;

    /// Number of partitions; valid partition numbers are `0..partitions()`.
    fn partitions(&self) -> u32;

    /// Publishes `payload` to `partition`.
    ///
    /// Returns only once the broker has durably accepted the message,
    /// including any configured replica acknowledgements.
    ///
    /// # Errors
    ///
    /// Any failure is returned to the caller; nothing is dropped silently.
    async fn publish(&self, partition: u32, payload: &[u8]) -> RelayResult<()>;

    /// Opens the consumer side of `partition`.
    async fn subscribe(&self, partition: u32) -> RelayResult<Box<dyn PartitionConsumer>>;

    /// Checks if the broker is reachable.
    async fn health_check(&self) -> bool;
}

/// Ordered reader over a single partition.
#[async_trait]
pub trait PartitionConsumer: Send {
    /// Waits for the next message in partition order.
    ///
    /// Returns `Ok(None)` once the partition is closed for good.
    async fn next(&mut self) -> RelayResult<Option<Delivery>>;

    /// Marks `delivery` as handled so it is not redelivered.
    ///
    /// A delivery that is not acknowledged before the next call to
    /// [`PartitionConsumer::next`] is offered again once its redelivery delay
    /// has passed. Redelivered messages may arrive after later ones.
    async fn ack(&mut self, delivery: &Delivery) -> RelayResult<()>;
}

/// Deadline tracking for unacknowledged deliveries on one partition.
///
/// The first unacknowledged delivery starts the clock; once the deadline
/// passes, everything left unacknowledged so far is re-offered together.
#[derive(Debug, Clone)]
pub struct RedeliverySchedule {
    after: Duration,
    due: Option<Instant>,
}

impl RedeliverySchedule {
    pub fn new(after: Duration) -> Self {
        Self { after, due: None }
    }

    /// Records that a delivery was left unacknowledged.
    pub fn mark_pending(&mut self) {
        if self.due.is_none() {
            self.due = Some(Instant::now() + self.after);
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.due
    }

    /// Returns `true` once the deadline has passed, clearing it.
    pub fn take_due(&mut self) -> bool {
        match self.due {
            Some(due) if Instant::now() >= due => {
                self.due = None;
                true
            }
            _ => false,
        }
    }
}

/// Picks the partition for an advertisement.
///
/// FNV-1a over the id bytes: stable across processes and releases, so all
/// events of one advertisement share a partition and keep their order.
pub fn partition_for(ad_id: &str, partitions: u32) -> u32 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;

    if partitions <= 1 {
        return 0;
    }
    let hash = ad_id
        .bytes()
        .fold(OFFSET, |acc, b| (acc ^ u64::from(b)).wrapping_mul(PRIME));
    (hash % u64::from(partitions)) as u32
}
