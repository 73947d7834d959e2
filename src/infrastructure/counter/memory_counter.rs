//! Process-local counter store.

use super::service::{CounterResult, CounterStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Counter store kept in process memory.
///
/// Used when Redis is not configured or unreachable at startup, and in tests.
/// Counts are lost on restart.
#[derive(Default)]
pub struct InMemoryCounter {
    counts: Mutex<HashMap<String, i64>>,
}

impl InMemoryCounter {
    pub fn new() -> Self {
        debug!("Using InMemoryCounter (counts are not shared or persisted)");
        Self::default()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounter {
    async fn increment(&self, ad_id: &str) -> CounterResult<i64> {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        let value = counts.entry(ad_id.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn get(&self, ad_id: &str) -> CounterResult<i64> {
        let counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        Ok(counts.get(ad_id).copied().unwrap_or(0))
    }

    async fn health_check(&self) -> bool {
        true
    }
}
