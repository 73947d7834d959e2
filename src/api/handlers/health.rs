//! Handler for health check endpoint.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{CheckStatus, HealthChecks, HealthResponse};
use crate::resilience::{BreakerState, Dependency};
use crate::state::AppState;

/// Returns service health status with component checks.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response Codes
///
/// - **200 OK**: every dependency answered and no breaker is open
/// - **503 Service Unavailable**: otherwise
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "checks": {
///     "database": { "status": "ok", "breaker": "closed" },
///     "counter":  { "status": "ok", "breaker": "closed" },
///     "relay":    { "status": "ok", "breaker": "closed" }
///   }
/// }
/// ```
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let (db_ok, counter_ok, relay_ok) = tokio::join!(
        state.ads.health_check(),
        state.counter.health_check(),
        state.broker.health_check(),
    );

    let checks = HealthChecks {
        database: check(&state, Dependency::Database, db_ok),
        counter: check(&state, Dependency::Counter, counter_ok),
        relay: check(&state, Dependency::Relay, relay_ok),
    };

    let all_healthy = [&checks.database, &checks.counter, &checks.relay]
        .iter()
        .all(|c| c.status == "ok");

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks,
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

fn check(state: &AppState, dependency: Dependency, reachable: bool) -> CheckStatus {
    let breaker = state.breakers.get(dependency).state();

    let (status, message) = match (reachable, breaker) {
        (false, _) => ("error", Some(format!("{} unreachable", dependency))),
        (true, BreakerState::Open) => ("error", Some("circuit open".to_string())),
        (true, _) => ("ok", None),
    };

    CheckStatus {
        status: status.to_string(),
        breaker: breaker.as_str(),
        message,
    }
}
