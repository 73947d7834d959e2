//! Redis-backed counter store.

use super::service::{CounterError, CounterResult, CounterStore};
use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::{debug, info};

/// Click counters stored as plain Redis integers under `clicks:{ad_id}`.
///
/// Uses a `ConnectionManager`, which reconnects transparently and is cheap to
/// clone per operation.
pub struct RedisCounter {
    client: ConnectionManager,
    key_prefix: String,
}

impl RedisCounter {
    /// Wraps an established connection manager.
    pub fn new(client: ConnectionManager) -> Self {
        Self {
            client,
            key_prefix: "clicks:".to_string(),
        }
    }

    /// Connects to Redis and validates the connection with a PING.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError::ConnectionError`] if the URL is invalid, the
    /// connection cannot be established, or the PING fails.
    pub async fn connect(redis_url: &str) -> CounterResult<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| {
            CounterError::ConnectionError(format!("Failed to create Redis client: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            CounterError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        let mut test_conn = manager.clone();
        test_conn
            .ping::<()>()
            .await
            .map_err(|e| CounterError::ConnectionError(format!("Redis PING failed: {}", e)))?;

        info!("Counter store connected to Redis");
        Ok(Self::new(manager))
    }

    fn build_key(&self, ad_id: &str) -> String {
        format!("{}{}", self.key_prefix, ad_id)
    }
}

#[async_trait]
impl CounterStore for RedisCounter {
    async fn increment(&self, ad_id: &str) -> CounterResult<i64> {
        let key = self.build_key(ad_id);
        let mut conn = self.client.clone();

        let value = conn
            .incr::<_, _, i64>(&key, 1)
            .await
            .map_err(|e| CounterError::OperationError(format!("INCR {}: {}", key, e)))?;

        debug!("Counter INCR: {} -> {}", key, value);
        Ok(value)
    }

    async fn get(&self, ad_id: &str) -> CounterResult<i64> {
        let key = self.build_key(ad_id);
        let mut conn = self.client.clone();

        let value = conn
            .get::<_, Option<i64>>(&key)
            .await
            .map_err(|e| CounterError::OperationError(format!("GET {}: {}", key, e)))?;

        Ok(value.unwrap_or(0))
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.client.clone();
        conn.ping::<()>().await.is_ok()
    }
}
