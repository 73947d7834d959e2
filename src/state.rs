//! Shared application state injected into handlers.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::application::services::{AdService, ClickService, RateLimitPolicy, RelayPublisher};
use crate::domain::repositories::{AdRepository, ClickRepository};
use crate::infrastructure::counter::CounterStore;
use crate::infrastructure::relay::ClickBroker;
use crate::resilience::BreakerRegistry;

/// Services and dependency handles shared by every request.
///
/// Cheap to clone; everything inside is reference-counted.
#[derive(Clone)]
pub struct AppState {
    pub ad_service: Arc<AdService>,
    pub click_service: Arc<ClickService>,
    pub relay: Arc<RelayPublisher>,
    pub ads: Arc<dyn AdRepository>,
    pub counter: Arc<dyn CounterStore>,
    pub broker: Arc<dyn ClickBroker>,
    pub breakers: Arc<BreakerRegistry>,
    /// Renders `GET /metrics`; `None` when no recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wires the services over the given adapters.
    ///
    /// All services share `breakers`, so a tripped dependency is seen by
    /// every caller.
    pub fn new(
        ads: Arc<dyn AdRepository>,
        clicks: Arc<dyn ClickRepository>,
        counter: Arc<dyn CounterStore>,
        broker: Arc<dyn ClickBroker>,
        breakers: Arc<BreakerRegistry>,
        rate_limit: RateLimitPolicy,
    ) -> Self {
        let ad_service = Arc::new(AdService::new(Arc::clone(&ads), Arc::clone(&breakers)));
        let click_service = Arc::new(ClickService::new(
            Arc::clone(&ads),
            clicks,
            Arc::clone(&counter),
            Arc::clone(&breakers),
            rate_limit,
        ));
        let relay = Arc::new(RelayPublisher::new(
            Arc::clone(&broker),
            Arc::clone(&breakers),
        ));

        Self {
            ad_service,
            click_service,
            relay,
            ads,
            counter,
            broker,
            breakers,
            metrics: None,
        }
    }

    /// Exposes the given recorder at `GET /metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
