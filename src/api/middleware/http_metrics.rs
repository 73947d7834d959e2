//! Prometheus recorder setup and per-request HTTP metrics.

use std::time::{Duration, Instant};

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Histogram buckets, in seconds, for every `*_seconds` metric.
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Builder with the service's histogram buckets applied.
///
/// # Errors
///
/// Returns an error if the bucket list is rejected.
pub fn builder() -> anyhow::Result<PrometheusBuilder> {
    Ok(PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Suffix("_seconds".to_string()), LATENCY_BUCKETS)?)
}

/// Installs the process-wide recorder and starts its upkeep task.
///
/// # Errors
///
/// Returns an error if a global recorder is already installed.
pub fn install() -> anyhow::Result<PrometheusHandle> {
    let handle = builder()?.install_recorder()?;

    let upkeep = handle.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(UPKEEP_INTERVAL);
        loop {
            tick.tick().await;
            upkeep.run_upkeep();
        }
    });

    Ok(handle)
}

/// Counts requests and records their latency, labelled by route template.
///
/// Requests that matched no route share the `unmatched` label so arbitrary
/// paths cannot blow up label cardinality.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let started = Instant::now();
    let response = next.run(request).await;
    let status = response.status().as_u16().to_string();

    metrics::counter!(
        "http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path
    )
    .record(started.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, middleware, routing::get};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_requests_are_counted_by_route_template() {
        let recorder = builder().unwrap().build_recorder();
        let handle = recorder.handle();
        let _guard = metrics::set_default_local_recorder(&recorder);

        let app = Router::new()
            .route("/ads/{id}", get(|| async { "ok" }))
            .layer(middleware::from_fn(track_requests));

        for uri in ["/ads/1", "/ads/2", "/nowhere"] {
            let request = axum::http::Request::builder()
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            app.clone().oneshot(request).await.unwrap();
        }

        let rendered = handle.render();
        assert!(rendered.contains("http_requests_total"));
        assert!(rendered.contains(r#"path="/ads/{id}""#));
        assert!(!rendered.contains(r#"path="/ads/1""#));
        assert!(rendered.contains("http_request_duration_seconds_bucket"));
    }
}
