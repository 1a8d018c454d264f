//! `/healthz` and `/metrics` HTTP surface shared by all three service
//! binaries. Grounded in `src/profiler/profiler.go` (each service in the
//! source starts a background profiling listener alongside its gRPC
//! server); the Rust stack swaps Go's `net/http/pprof` for an axum router
//! over a `prometheus::Registry`, matching
//! `services/user-management/src/metrics.rs`'s registry-plus-encoder
//! pattern and its `/health`+`/metrics` routes.

use std::net::SocketAddr;

use axum::routing::get;
use axum::{Router, http::StatusCode};
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::{debug, info, warn};

/// Builds the shared router: `GET /healthz` always returns `200 OK`, `GET
/// /metrics` renders everything registered in `registry` in Prometheus
/// text exposition format.
pub fn router(registry: Registry) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(move || metrics(registry.clone())))
}

/// Binds `router` on `addr` and serves it until cancelled. Intended to be
/// spawned alongside a binary's gRPC server and raced against the shared
/// shutdown signal.
pub async fn serve(addr: SocketAddr, registry: Registry) -> std::io::Result<()> {
    let app = router(registry);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "profiler HTTP surface listening");
    axum::serve(listener, app).await
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(registry: Registry) -> (StatusCode, String) {
    let encoder = TextEncoder::new();
    let families = registry.gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&families, &mut buffer) {
        warn!(error = %err, "failed to encode prometheus metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
    }
    match String::from_utf8(buffer) {
        Ok(body) => {
            debug!(families = families.len(), "metrics scraped");
            (StatusCode::OK, body)
        }
        Err(err) => {
            warn!(error = %err, "prometheus encoder produced non-utf8 output");
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn healthz_reports_ok() {
        let app = router(Registry::new());
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_renders_registered_counters() {
        let registry = Registry::new();
        let counter = prometheus::IntCounter::new("probe_total", "test counter").unwrap();
        counter.inc();
        registry.register(Box::new(counter)).unwrap();

        let app = router(registry);
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
