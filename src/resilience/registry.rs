//! Process-wide set of breakers, one per [`Dependency`].

use std::sync::Arc;

use tokio::sync::broadcast;

use super::circuit_breaker::{
    BreakerSettings, BreakerState, CircuitBreaker, Dependency, StateChange,
};

/// Holds the breaker for every downstream dependency.
///
/// Built once at startup and shared by handle (`Arc<BreakerRegistry>`) with
/// every component that talks to a dependency.
pub struct BreakerRegistry {
    database: CircuitBreaker,
    counter: CircuitBreaker,
    relay: CircuitBreaker,
    events: broadcast::Sender<StateChange>,
}

impl BreakerRegistry {
    pub fn new(settings: BreakerSettings) -> Self {
        let (events, _) = broadcast::channel(64);

        Self {
            database: CircuitBreaker::new(Dependency::Database, settings.clone(), events.clone()),
            counter: CircuitBreaker::new(Dependency::Counter, settings.clone(), events.clone()),
            relay: CircuitBreaker::new(Dependency::Relay, settings, events.clone()),
            events,
        }
    }

    /// Convenience constructor returning the registry behind an `Arc`.
    pub fn shared(settings: BreakerSettings) -> Arc<Self> {
        Arc::new(Self::new(settings))
    }

    pub fn get(&self, dependency: Dependency) -> &CircuitBreaker {
        match dependency {
            Dependency::Database => &self.database,
            Dependency::Counter => &self.counter,
            Dependency::Relay => &self.relay,
        }
    }

    /// Receives every state transition of every breaker in this registry.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.events.subscribe()
    }

    /// Snapshot of all breaker states, in [`Dependency::ALL`] order.
    pub fn states(&self) -> Vec<(Dependency, BreakerState)> {
        Dependency::ALL
            .iter()
            .map(|dep| (*dep, self.get(*dep).state()))
            .collect()
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(BreakerSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_breakers_are_isolated_per_dependency() {
        let registry = BreakerRegistry::new(BreakerSettings {
            failure_threshold: 0,
            ..BreakerSettings::default()
        });
        let mut rx = registry.subscribe();

        let _ = registry
            .get(Dependency::Counter)
            .call(|| async { Err::<(), _>("redis down") })
            .await;

        assert_eq!(
            registry.states(),
            vec![
                (Dependency::Database, BreakerState::Closed),
                (Dependency::Counter, BreakerState::Open),
                (Dependency::Relay, BreakerState::Closed),
            ]
        );

        let change = rx.recv().await.unwrap();
        assert_eq!(change.dependency, Dependency::Counter);
        assert_eq!(change.to, BreakerState::Open);
    }

    #[tokio::test]
    async fn test_get_returns_matching_breaker() {
        let registry = BreakerRegistry::default();
        for dep in Dependency::ALL {
            assert_eq!(registry.get(dep).dependency(), dep);
        }
    }
}
