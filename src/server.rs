//! HTTP server initialization and runtime setup.
//!
//! Handles database connections, counter and relay setup, relay workers, and
//! the Axum server lifecycle including graceful shutdown.

use crate::api::middleware::{http_metrics, rate_limit};
use crate::config::Config;
use crate::domain::click_worker::ClickWorkerPool;
use crate::infrastructure::counter::{CounterStore, InMemoryCounter, RedisCounter};
use crate::infrastructure::persistence::{PgAdRepository, PgClickRepository};
use crate::infrastructure::relay::{ClickBroker, InMemoryBroker, RedisStreamBroker};
use crate::resilience::BreakerRegistry;
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

/// Per-partition buffer of the in-process relay.
const IN_MEMORY_RELAY_CAPACITY: usize = 10_000;

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - Prometheus recorder, served at `GET /metrics`
/// - PostgreSQL connection pool (with startup retries) and migrations
/// - Counter store and relay broker (Redis, or in-process without it)
/// - Circuit breakers for the three dependencies
/// - One relay worker per partition
/// - Axum HTTP server
///
/// On SIGINT/SIGTERM the server stops accepting connections and drains
/// in-flight requests, then the relay workers finish their current message,
/// and only then is the pool closed.
///
/// # Errors
///
/// Returns an error if any dependency cannot be reached at startup, the
/// bind fails, or the server fails at runtime.
pub async fn run(config: Config) -> Result<()> {
    let metrics = http_metrics::install().context("Failed to install metrics recorder")?;

    let pool = connect_database(&config).await?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let (counter, broker) = connect_counter_and_relay(&config).await?;

    let breakers = BreakerRegistry::shared(config.breaker_settings());

    let pool_arc = Arc::new(pool.clone());
    let state = AppState::new(
        Arc::new(PgAdRepository::new(pool_arc.clone())),
        Arc::new(PgClickRepository::new(pool_arc)),
        counter,
        broker.clone(),
        breakers,
        config.rate_limit_policy(),
    )
    .with_metrics(metrics);

    let workers = ClickWorkerPool::start(broker, state.click_service.clone())
        .await
        .context("Failed to start relay workers")?;

    let throttle = rate_limit::layer(config.edge_rate_per_second, config.edge_burst)?;
    let app = app_router(state, throttle);

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", config.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on http://{addr}");

    let served = axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    tracing::info!("HTTP server stopped, draining relay workers");
    workers.shutdown().await;
    pool.close().await;
    tracing::info!("Shutdown complete");

    served.context("HTTP server error")
}

/// Builds the pool, retrying the first connection with jittered exponential backoff.
async fn connect_database(config: &Config) -> Result<PgPool> {
    let options = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime));

    let strategy = ExponentialBackoff::from_millis(2)
        .factor(100)
        .max_delay(Duration::from_secs(5))
        .map(jitter)
        .take(5);

    Retry::spawn(strategy, || {
        let options = options.clone();
        async move {
            options
                .connect(&config.database_url)
                .await
                .inspect_err(|e| tracing::warn!(error = %e, "Database connection attempt failed"))
        }
    })
    .await
    .context("Failed to connect to PostgreSQL")
}

async fn connect_counter_and_relay(
    config: &Config,
) -> Result<(Arc<dyn CounterStore>, Arc<dyn ClickBroker>)> {
    match &config.redis_url {
        Some(redis_url) => {
            let counter = RedisCounter::connect(redis_url)
                .await
                .context("Failed to connect counter store to Redis")?;
            let broker = RedisStreamBroker::connect(redis_url, config.relay_settings())
                .await
                .context("Failed to connect relay to Redis")?;
            tracing::info!(
                channel = %config.relay_channel,
                partitions = config.relay_partitions,
                "Counter store and relay on Redis"
            );
            Ok((Arc::new(counter), Arc::new(broker)))
        }
        None => {
            tracing::warn!(
                "Redis not configured: counters and relayed clicks live in process memory only"
            );
            let broker = InMemoryBroker::new(
                config.relay_channel.clone(),
                config.relay_partitions,
                IN_MEMORY_RELAY_CAPACITY,
            )
            .with_redelivery_after(config.relay_redelivery_after());
            Ok((Arc::new(InMemoryCounter::new()), Arc::new(broker)))
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
