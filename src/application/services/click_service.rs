//! Ingestion coordinator: runs admission, persists the click and bumps its counter.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::application::services::admission::{AdmissionControl, RateLimitPolicy};
use crate::domain::click_event::ClickEvent;
use crate::domain::entities::NewClick;
use crate::domain::repositories::{AdRepository, ClickRepository};
use crate::error::AppError;
use crate::infrastructure::counter::CounterStore;
use crate::resilience::{BreakerRegistry, Dependency};

/// Stages a click passes through on its way to being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Validate,
    CheckExists,
    CheckRate,
    PersistDurable,
    IncrementCounter,
}

impl IngestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStage::Validate => "validate",
            IngestStage::CheckExists => "check_exists",
            IngestStage::CheckRate => "check_rate",
            IngestStage::PersistDurable => "persist_durable",
            IngestStage::IncrementCounter => "increment_counter",
        }
    }
}

/// Records clicks and serves aggregate counts.
///
/// The durable click log is the source of truth. The aggregate counter is a
/// best-effort mirror: once the insert succeeds the click counts as recorded,
/// and a failed increment is logged and swallowed (the counter then
/// under-counts by one). There is no compensating delete.
pub struct ClickService {
    admission: AdmissionControl,
    clicks: Arc<dyn ClickRepository>,
    counter: Arc<dyn CounterStore>,
    breakers: Arc<BreakerRegistry>,
}

impl ClickService {
    pub fn new(
        ads: Arc<dyn AdRepository>,
        clicks: Arc<dyn ClickRepository>,
        counter: Arc<dyn CounterStore>,
        breakers: Arc<BreakerRegistry>,
        rate_limit: RateLimitPolicy,
    ) -> Self {
        let admission =
            AdmissionControl::new(ads, Arc::clone(&clicks), Arc::clone(&breakers), rate_limit);
        Self {
            admission,
            clicks,
            counter,
            breakers,
        }
    }

    /// Full synchronous path: validate, check existence and rate, persist, count.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] for malformed fields (no store is touched).
    /// - [`AppError::NotFound`] for an unknown advertisement.
    /// - [`AppError::RateLimited`] when the source is over its ceiling.
    /// - [`AppError::Dependency`] when the durable store fails or its breaker is open.
    pub async fn record_click(&self, event: ClickEvent) -> Result<(), AppError> {
        let click = self.admit(event).await?;
        self.persist(click).await
    }

    /// Admission only. Used by the relay edge before publishing.
    ///
    /// # Errors
    ///
    /// Same as [`ClickService::record_click`], minus persistence failures.
    pub async fn admit(&self, event: ClickEvent) -> Result<NewClick, AppError> {
        let click = AdmissionControl::validate(&event)
            .map_err(|e| rejected(IngestStage::Validate, &event.ad_id, e))?;

        self.admission
            .check_exists(&click.ad_id)
            .await
            .map_err(|e| rejected(IngestStage::CheckExists, &click.ad_id, e))?;

        self.admission
            .check_rate(click.ip)
            .await
            .map_err(|e| rejected(IngestStage::CheckRate, &click.ad_id, e))?;

        Ok(click)
    }

    /// Consumer path for relayed events.
    ///
    /// Field checks run again because the payload crossed a process boundary;
    /// existence and rate were decided at the edge and are not repeated.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] for a malformed payload.
    /// - [`AppError::NotFound`] when the advertisement was removed after the
    ///   edge accepted the click.
    /// - [`AppError::Dependency`] when the durable store fails.
    pub async fn record_relayed(&self, event: ClickEvent) -> Result<(), AppError> {
        let click = AdmissionControl::validate(&event)
            .map_err(|e| rejected(IngestStage::Validate, &event.ad_id, e))?;
        self.persist(click).await
    }

    /// Writes the click to the durable log, then increments its counter.
    ///
    /// The counter is only touched after a successful insert.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Dependency`] if the insert fails, or a caller error
    /// if the database rejects the row. Counter failures never surface here.
    pub async fn persist(&self, click: NewClick) -> Result<(), AppError> {
        self.breakers
            .get(Dependency::Database)
            .call_with(|| self.clicks.save(&click), AppError::is_caller_fault)
            .await
            .map_err(|e| {
                let e = AppError::from(e);
                error!(
                    ad_id = %click.ad_id,
                    stage = IngestStage::PersistDurable.as_str(),
                    error = %e,
                    "Failed to persist click"
                );
                e
            })?;

        match self
            .breakers
            .get(Dependency::Counter)
            .call(|| self.counter.increment(&click.ad_id))
            .await
        {
            Ok(total) => {
                debug!(ad_id = %click.ad_id, total, "Counter incremented");
            }
            Err(e) => {
                let e = AppError::from(e);
                error!(
                    ad_id = %click.ad_id,
                    dependency = Dependency::Counter.as_str(),
                    stage = IngestStage::IncrementCounter.as_str(),
                    error = %e,
                    "Click persisted but counter increment failed"
                );
                metrics::counter!("counter_increment_failures_total").increment(1);
            }
        }

        metrics::counter!("clicks_recorded_total").increment(1);
        info!(ad_id = %click.ad_id, ip = %click.ip, "Click recorded");
        Ok(())
    }

    /// Current aggregate count for an advertisement. Unknown ids read as 0.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Dependency`] if the counter store is unreachable.
    pub async fn get_click_count(&self, ad_id: &str) -> Result<i64, AppError> {
        let count = self
            .breakers
            .get(Dependency::Counter)
            .call(|| self.counter.get(ad_id))
            .await?;
        Ok(count)
    }
}

fn rejected(stage: IngestStage, ad_id: &str, err: AppError) -> AppError {
    metrics::counter!("clicks_rejected_total", "reason" => err.kind()).increment(1);
    debug!(ad_id, stage = stage.as_str(), reason = err.kind(), error = %err, "Click rejected");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::{MockAdRepository, MockClickRepository};
    use crate::error::testing::SqlStateError;
    use crate::infrastructure::counter::{CounterError, InMemoryCounter, MockCounterStore};
    use crate::resilience::{BreakerSettings, BreakerState};

    fn event(ad_id: &str) -> ClickEvent {
        ClickEvent::received(ad_id, "203.0.113.5".parse().unwrap(), 42)
    }

    fn service(
        ads: MockAdRepository,
        clicks: MockClickRepository,
        counter: Arc<dyn CounterStore>,
    ) -> ClickService {
        ClickService::new(
            Arc::new(ads),
            Arc::new(clicks),
            counter,
            BreakerRegistry::shared(BreakerSettings::default()),
            RateLimitPolicy::default(),
        )
    }

    fn existing_ad() -> MockAdRepository {
        let mut ads = MockAdRepository::new();
        ads.expect_exists().returning(|_| Ok(true));
        ads
    }

    #[tokio::test]
    async fn test_record_click_end_to_end() {
        let mut clicks = MockClickRepository::new();
        clicks.expect_count_recent_by_ip().returning(|_, _| Ok(0));
        clicks
            .expect_save()
            .withf(|click| {
                click.ad_id == "1"
                    && click.ip.to_string() == "203.0.113.5"
                    && click.playback_time == 42
            })
            .times(1)
            .returning(|_| Ok(()));

        let counter = Arc::new(InMemoryCounter::new());
        let service = service(existing_ad(), clicks, counter);

        service.record_click(event("1")).await.unwrap();

        assert_eq!(service.get_click_count("1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_malformed_event_touches_no_store() {
        // Mocks without expectations panic if called.
        let service = service(
            MockAdRepository::new(),
            MockClickRepository::new(),
            Arc::new(MockCounterStore::new()),
        );

        let mut ev = event("1");
        ev.playback_time = 3601;

        let result = service.record_click(ev).await;
        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_unknown_ad_is_not_persisted() {
        let mut ads = MockAdRepository::new();
        ads.expect_exists().times(1).returning(|_| Ok(false));
        let mut clicks = MockClickRepository::new();
        clicks.expect_save().never();
        let mut counter = MockCounterStore::new();
        counter.expect_increment().never();

        let service = service(ads, clicks, Arc::new(counter));

        let result = service.record_click(event("missing")).await;
        assert!(matches!(result, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_source_over_ceiling_is_rate_limited() {
        let mut clicks = MockClickRepository::new();
        clicks
            .expect_count_recent_by_ip()
            .times(1)
            .returning(|_, _| Ok(31));
        clicks.expect_save().never();

        let service = service(existing_ad(), clicks, Arc::new(MockCounterStore::new()));

        let result = service.record_click(event("1")).await;
        assert!(matches!(result, Err(AppError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn test_failed_insert_never_increments() {
        let mut clicks = MockClickRepository::new();
        clicks.expect_count_recent_by_ip().returning(|_, _| Ok(0));
        clicks
            .expect_save()
            .times(1)
            .returning(|_| Err(AppError::dependency("postgres", "connection reset")));
        let mut counter = MockCounterStore::new();
        counter.expect_increment().never();

        let service = service(existing_ad(), clicks, Arc::new(counter));

        let result = service.record_click(event("1")).await;
        assert!(matches!(
            result,
            Err(AppError::Dependency {
                dependency: "postgres",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_counter_failure_still_reports_success() {
        let mut clicks = MockClickRepository::new();
        clicks.expect_count_recent_by_ip().returning(|_, _| Ok(0));
        clicks.expect_save().times(1).returning(|_| Ok(()));
        let mut counter = MockCounterStore::new();
        counter
            .expect_increment()
            .times(1)
            .returning(|_| Err(CounterError::ConnectionError("refused".to_string())));
        counter.expect_get().returning(|_| Ok(0));

        let service = service(existing_ad(), clicks, Arc::new(counter));

        service.record_click(event("1")).await.unwrap();
        assert_eq!(service.get_click_count("1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_ad_count_is_zero() {
        let service = service(
            MockAdRepository::new(),
            MockClickRepository::new(),
            Arc::new(InMemoryCounter::new()),
        );

        assert_eq!(service.get_click_count("never-clicked").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_relayed_event_skips_existence_and_rate_checks() {
        let mut clicks = MockClickRepository::new();
        clicks.expect_count_recent_by_ip().never();
        clicks.expect_save().times(1).returning(|_| Ok(()));

        let service = service(
            MockAdRepository::new(),
            clicks,
            Arc::new(InMemoryCounter::new()),
        );

        service.record_relayed(event("7")).await.unwrap();
        assert_eq!(service.get_click_count("7").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_nul_in_ad_id_is_rejected_before_any_store() {
        let breakers = BreakerRegistry::shared(BreakerSettings::default());
        let service = ClickService::new(
            Arc::new(MockAdRepository::new()),
            Arc::new(MockClickRepository::new()),
            Arc::new(MockCounterStore::new()),
            Arc::clone(&breakers),
            RateLimitPolicy::default(),
        );

        for _ in 0..10 {
            let result = service.record_click(event("x\u{0}y")).await;
            assert!(matches!(result, Err(AppError::Validation { .. })));
        }
        assert_eq!(
            breakers.get(Dependency::Database).state(),
            BreakerState::Closed
        );
    }

    #[tokio::test]
    async fn test_rejected_inserts_leave_database_breaker_closed() {
        let mut clicks = MockClickRepository::new();
        clicks
            .expect_save()
            .times(10)
            .returning(|_| {
                Err(SqlStateError::new("23503", Some("clicks_ad_id_fkey"))
                    .into_sqlx()
                    .into())
            });
        let mut counter = MockCounterStore::new();
        counter.expect_increment().never();

        let breakers = BreakerRegistry::shared(BreakerSettings::default());
        let service = ClickService::new(
            Arc::new(MockAdRepository::new()),
            Arc::new(clicks),
            Arc::new(counter),
            Arc::clone(&breakers),
            RateLimitPolicy::default(),
        );

        for _ in 0..10 {
            let result = service.record_relayed(event("gone")).await;
            assert!(matches!(result, Err(AppError::NotFound { .. })));
        }
        assert_eq!(
            breakers.get(Dependency::Database).state(),
            BreakerState::Closed
        );
    }

    #[tokio::test]
    async fn test_open_database_breaker_fails_fast() {
        let mut clicks = MockClickRepository::new();
        clicks.expect_count_recent_by_ip().returning(|_, _| Ok(0));
        // Threshold 5 trips on the sixth consecutive failure; the seventh call
        // must not reach the repository.
        clicks
            .expect_save()
            .times(6)
            .returning(|_| Err(AppError::dependency("postgres", "down")));

        let breakers = BreakerRegistry::shared(BreakerSettings::default());
        let service = ClickService::new(
            Arc::new(MockAdRepository::new()),
            Arc::new(clicks),
            Arc::new(MockCounterStore::new()),
            Arc::clone(&breakers),
            RateLimitPolicy::default(),
        );

        for _ in 0..6 {
            assert!(service.record_relayed(event("1")).await.is_err());
        }
        assert_eq!(
            breakers.get(Dependency::Database).state(),
            BreakerState::Open
        );

        let result = service.record_relayed(event("1")).await;
        assert!(matches!(
            result,
            Err(AppError::Dependency {
                dependency: "postgres",
                ..
            })
        ));
    }
}
