#![allow(dead_code)]

use ad_click_tracker::AppError;
use ad_click_tracker::application::services::RateLimitPolicy;
use ad_click_tracker::domain::entities::{Advertisement, NewClick};
use ad_click_tracker::domain::repositories::{AdRepository, ClickRepository};
use ad_click_tracker::infrastructure::counter::InMemoryCounter;
use ad_click_tracker::infrastructure::relay::InMemoryBroker;
use ad_click_tracker::resilience::{BreakerRegistry, BreakerSettings};
use ad_click_tracker::state::AppState;
use async_trait::async_trait;
use axum::extract::ConnectInfo;
use sqlx::PgPool;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::Layer;

pub const PEER: &str = "203.0.113.5:40000";

/// Advertisement catalogue held in memory.
pub struct FakeAds {
    ads: Vec<Advertisement>,
    pub down: AtomicBool,
}

impl FakeAds {
    pub fn with_ids(ids: &[&str]) -> Self {
        Self {
            ads: ids
                .iter()
                .map(|id| {
                    Advertisement::new(
                        *id,
                        format!("https://cdn.example/{}.png", id),
                        format!("https://shop.example/{}", id),
                    )
                })
                .collect(),
            down: AtomicBool::new(false),
        }
    }

    fn check(&self) -> Result<(), AppError> {
        if self.down.load(Ordering::SeqCst) {
            Err(AppError::dependency("postgres", "connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AdRepository for FakeAds {
    async fn fetch_all(&self) -> Result<Vec<Advertisement>, AppError> {
        self.check()?;
        Ok(self.ads.clone())
    }

    async fn exists(&self, ad_id: &str) -> Result<bool, AppError> {
        self.check()?;
        Ok(self.ads.iter().any(|ad| ad.id == ad_id))
    }

    async fn health_check(&self) -> bool {
        self.check().is_ok()
    }
}

/// Click log held in memory. Rate counts ignore the window; every stored
/// click is recent.
#[derive(Default)]
pub struct FakeClicks {
    pub saved: Mutex<Vec<NewClick>>,
    pub down: AtomicBool,
}

impl FakeClicks {
    pub fn saved(&self) -> Vec<NewClick> {
        self.saved.lock().unwrap().clone()
    }

    pub fn preload(&self, ad_id: &str, ip: IpAddr, count: usize) {
        let mut saved = self.saved.lock().unwrap();
        for _ in 0..count {
            saved.push(NewClick {
                ad_id: ad_id.to_string(),
                timestamp: chrono::Utc::now(),
                ip,
                playback_time: 1,
            });
        }
    }
}

#[async_trait]
impl ClickRepository for FakeClicks {
    async fn count_recent_by_ip(&self, ip: IpAddr, _window: Duration) -> Result<i64, AppError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(AppError::dependency("postgres", "connection refused"));
        }
        let saved = self.saved.lock().unwrap();
        Ok(saved.iter().filter(|c| c.ip == ip).count() as i64)
    }

    async fn save(&self, click: &NewClick) -> Result<(), AppError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(AppError::dependency("postgres", "connection refused"));
        }
        self.saved.lock().unwrap().push(click.clone());
        Ok(())
    }
}

/// Handles to the fakes behind a test [`AppState`].
pub struct TestContext {
    pub state: AppState,
    pub ads: Arc<FakeAds>,
    pub clicks: Arc<FakeClicks>,
    pub counter: Arc<InMemoryCounter>,
    pub broker: Arc<InMemoryBroker>,
    pub breakers: Arc<BreakerRegistry>,
}

pub fn create_test_context(ad_ids: &[&str]) -> TestContext {
    let ads = Arc::new(FakeAds::with_ids(ad_ids));
    let clicks = Arc::new(FakeClicks::default());
    let counter = Arc::new(InMemoryCounter::new());
    let broker = Arc::new(InMemoryBroker::new("ad-clicks", 4, 64));
    let breakers = BreakerRegistry::shared(BreakerSettings::default());

    let state = AppState::new(
        ads.clone(),
        clicks.clone(),
        counter.clone(),
        broker.clone(),
        breakers.clone(),
        RateLimitPolicy::default(),
    );

    TestContext {
        state,
        ads,
        clicks,
        counter,
        broker,
        breakers,
    }
}

pub async fn create_test_ad(pool: &PgPool, id: &str) {
    sqlx::query("INSERT INTO ads (id, image_url, target_url) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(format!("https://cdn.example/{}.png", id))
        .bind(format!("https://shop.example/{}", id))
        .execute(pool)
        .await
        .unwrap();
}

/// Injects a fixed peer address, standing in for
/// `into_make_service_with_connect_info`.
#[derive(Clone)]
pub struct MockConnectInfoLayer;

impl<S> Layer<S> for MockConnectInfoLayer {
    type Service = MockConnectInfoService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MockConnectInfoService { inner }
    }
}

#[derive(Clone)]
pub struct MockConnectInfoService<S> {
    inner: S,
}

impl<S, B> tower::Service<axum::http::Request<B>> for MockConnectInfoService<S>
where
    S: tower::Service<axum::http::Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: axum::http::Request<B>) -> Self::Future {
        let addr: SocketAddr = PEER.parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        self.inner.call(req)
    }
}
