//! Redis Streams broker.
//!
//! Each partition is its own stream, `{channel}:{partition}`, read through a
//! consumer group. Entries are acknowledged with `XACK` once handled; entries
//! left unacknowledged stay in the group's pending list. Once the redelivery
//! delay has passed the consumer claims idle pending entries (its own and
//! those of consumers that went away) with `XAUTOCLAIM` and re-reads them.
//! On startup the consumer's own pending entries are read first.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, RedisResult, aio::ConnectionManager};
use tracing::{debug, info, warn};

use super::service::{
    ClickBroker, Delivery, PartitionConsumer, RedeliverySchedule, RelayError, RelayResult,
};

const PAYLOAD_FIELD: &str = "payload";

/// Settings for [`RedisStreamBroker`].
#[derive(Debug, Clone)]
pub struct RedisStreamSettings {
    pub channel: String,
    pub partitions: u32,
    pub group: String,
    /// Consumer name within the group; keep it stable across restarts so
    /// pending entries are picked up again.
    pub consumer: String,
    /// Replicas that must acknowledge a publish (`WAIT`). Zero skips the wait.
    pub min_replicas: u32,
    pub replica_timeout: Duration,
    /// Delay before polling an empty partition again.
    pub poll_interval: Duration,
    /// Idle time after which a pending entry is claimed and re-read.
    pub redelivery_after: Duration,
    pub batch_size: usize,
}

/// Broker over Redis Streams.
pub struct RedisStreamBroker {
    client: ConnectionManager,
    settings: RedisStreamSettings,
}

impl RedisStreamBroker {
    /// Wraps an established connection manager.
    pub fn new(client: ConnectionManager, settings: RedisStreamSettings) -> Self {
        Self { client, settings }
    }

    /// Connects to Redis and validates the connection with a PING.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::ConnectionError`] if the connection cannot be
    /// established.
    pub async fn connect(redis_url: &str, settings: RedisStreamSettings) -> RelayResult<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| {
            RelayError::ConnectionError(format!("Failed to create Redis client: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            RelayError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        let mut test_conn = manager.clone();
        test_conn
            .ping::<()>()
            .await
            .map_err(|e| RelayError::ConnectionError(format!("Redis PING failed: {}", e)))?;

        info!(
            "Relay connected to Redis streams '{}' ({} partitions)",
            settings.channel, settings.partitions
        );
        Ok(Self::new(manager, settings))
    }

    fn stream_key(&self, partition: u32) -> String {
        format!("{}:{}", self.settings.channel, partition)
    }

    fn check_partition(&self, partition: u32) -> RelayResult<()> {
        if partition < self.settings.partitions {
            Ok(())
        } else {
            Err(RelayError::UnknownPartition(partition))
        }
    }

    async fn wait_for_replicas(&self, conn: &mut ConnectionManager) -> RelayResult<()> {
        let required = self.settings.min_replicas;
        if required == 0 {
            return Ok(());
        }

        let acked: i64 = redis::cmd("WAIT")
            .arg(required)
            .arg(self.settings.replica_timeout.as_millis() as u64)
            .query_async(conn)
            .await
            .map_err(|e| RelayError::PublishError(format!("WAIT failed: {}", e)))?;

        if acked < i64::from(required) {
            return Err(RelayError::PublishError(format!(
                "only {} of {} replicas acknowledged",
                acked, required
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ClickBroker for RedisStreamBroker {
    fn channel(&self) -> &str {
        &self.settings.channel
    }

    fn partitions(&self) -> u32 {
        self.settings.partitions
    }

    async fn publish(&self, partition: u32, payload: &[u8]) -> RelayResult<()> {
        self.check_partition(partition)?;
        let key = self.stream_key(partition);
        let mut conn = self.client.clone();

        let id: String = conn
            .xadd(&key, "*", &[(PAYLOAD_FIELD, payload)])
            .await
            .map_err(|e| RelayError::PublishError(format!("XADD {}: {}", key, e)))?;

        self.wait_for_replicas(&mut conn).await?;

        debug!("Relay XADD: {} -> {}", key, id);
        Ok(())
    }

    async fn subscribe(&self, partition: u32) -> RelayResult<Box<dyn PartitionConsumer>> {
        self.check_partition(partition)?;
        let key = self.stream_key(partition);
        let mut conn = self.client.clone();

        let created: RedisResult<()> = conn
            .xgroup_create_mkstream(&key, &self.settings.group, "0")
            .await;
        match created {
            Ok(()) => info!("Created consumer group '{}' on {}", self.settings.group, key),
            Err(e) if e.code() == Some("BUSYGROUP") => {}
            Err(e) => {
                return Err(RelayError::ConnectionError(format!(
                    "XGROUP CREATE {}: {}",
                    key, e
                )));
            }
        }

        Ok(Box::new(RedisStreamPartition {
            conn,
            key,
            partition,
            group: self.settings.group.clone(),
            consumer: self.settings.consumer.clone(),
            poll_interval: self.settings.poll_interval,
            batch_size: self.settings.batch_size.max(1),
            backlog_cursor: Some("0".to_string()),
            buffer: VecDeque::new(),
            in_flight: None,
            redelivery_after: self.settings.redelivery_after,
            schedule: RedeliverySchedule::new(self.settings.redelivery_after),
        }))
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.client.clone();
        conn.ping::<()>().await.is_ok()
    }
}

struct RedisStreamPartition {
    conn: ConnectionManager,
    key: String,
    partition: u32,
    group: String,
    consumer: String,
    poll_interval: Duration,
    batch_size: usize,
    /// While `Some`, this consumer's own pending entries after the cursor are
    /// re-read before any new entry.
    backlog_cursor: Option<String>,
    buffer: VecDeque<Delivery>,
    /// Id of the last delivery handed out and not yet acknowledged.
    in_flight: Option<String>,
    redelivery_after: Duration,
    schedule: RedeliverySchedule,
}

impl RedisStreamPartition {
    /// Moves pending entries idle for at least the redelivery delay to this
    /// consumer. Failure only delays redelivery, so it is logged and ignored.
    async fn claim_idle(&mut self) {
        let claimed: RedisResult<redis::Value> = redis::cmd("XAUTOCLAIM")
            .arg(&self.key)
            .arg(&self.group)
            .arg(&self.consumer)
            .arg(self.redelivery_after.as_millis() as u64)
            .arg("0-0")
            .arg("COUNT")
            .arg(self.batch_size)
            .arg("JUSTID")
            .query_async(&mut self.conn)
            .await;

        if let Err(e) = claimed {
            warn!(stream = %self.key, error = %e, "XAUTOCLAIM failed");
        }
    }

    async fn read_batch(&mut self) -> RelayResult<usize> {
        let start = self.backlog_cursor.as_deref().unwrap_or(">").to_string();
        let options = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(self.batch_size);

        let reply: Option<StreamReadReply> = self
            .conn
            .xread_options(&[self.key.as_str()], &[start.as_str()], &options)
            .await
            .map_err(|e| RelayError::ReceiveError(format!("XREADGROUP {}: {}", self.key, e)))?;

        let entries: Vec<_> = reply
            .map(|r| r.keys.into_iter().flat_map(|k| k.ids).collect())
            .unwrap_or_default();

        if self.backlog_cursor.is_some() {
            self.backlog_cursor = entries.last().map(|last| last.id.clone());
        }

        let read = entries.len();
        for entry in entries {
            let payload = entry.get::<Vec<u8>>(PAYLOAD_FIELD).unwrap_or_else(|| {
                warn!("Relay entry {} on {} has no payload field", entry.id, self.key);
                Vec::new()
            });
            self.buffer.push_back(Delivery {
                id: entry.id,
                partition: self.partition,
                payload,
            });
        }
        Ok(read)
    }
}

#[async_trait]
impl PartitionConsumer for RedisStreamPartition {
    async fn next(&mut self) -> RelayResult<Option<Delivery>> {
        if self.in_flight.take().is_some() {
            self.schedule.mark_pending();
        }

        loop {
            if let Some(delivery) = self.buffer.pop_front() {
                self.in_flight = Some(delivery.id.clone());
                return Ok(Some(delivery));
            }

            // The buffer is empty, so every pending entry of this consumer is
            // one that was left unacknowledged.
            if self.backlog_cursor.is_none() && self.schedule.take_due() {
                self.claim_idle().await;
                self.backlog_cursor = Some("0".to_string());
            }

            let in_backlog = self.backlog_cursor.is_some();
            let read = self.read_batch().await?;
            if read == 0 && !in_backlog {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
    }

    async fn ack(&mut self, delivery: &Delivery) -> RelayResult<()> {
        let _acked: i64 = self
            .conn
            .xack(&self.key, &self.group, &[delivery.id.as_str()])
            .await
            .map_err(|e| RelayError::ReceiveError(format!("XACK {}: {}", self.key, e)))?;

        if self.in_flight.as_deref() == Some(delivery.id.as_str()) {
            self.in_flight = None;
        }
        Ok(())
    }
}
