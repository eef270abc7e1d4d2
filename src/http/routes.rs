//! HTTP route handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::debug;

use crate::metrics::Metrics;
use crate::policy::{PolicyResolver, RequestIdentity};
use crate::ratelimit::{HotKeyLimiter, RateLimiter};

/// Shared state behind every handler.
pub struct AppState {
    /// Maps request identifiers to ordered hierarchical keys.
    pub resolver: PolicyResolver,
    /// Local fast path for skewed traffic.
    pub hot_keys: HotKeyLimiter,
    /// Authoritative distributed decision path.
    pub authority: Arc<dyn RateLimiter>,
    /// Process-wide counters.
    pub metrics: Arc<Metrics>,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/check", get(check_admission))
        .route("/metrics", get(metrics_snapshot))
        .route("/prometheus/metrics", get(metrics_prometheus))
        .with_state(state)
}

/// Body of an admission decision.
#[derive(Debug, Serialize)]
struct AdmissionResponse {
    allowed: bool,
    /// Which layer made the decision: `local` or `remote`.
    source: &'static str,
}

/// Decide whether the identified request is admitted.
///
/// The hot-key layer is consulted first on the user principal; a local
/// admission never reaches the store. Otherwise the identifiers resolve
/// to hierarchical keys and the distributed limiter decides.
async fn check_admission(
    State(state): State<Arc<AppState>>,
    Query(identity): Query<RequestIdentity>,
) -> impl IntoResponse {
    if let Some(user) = identity.user.as_deref().filter(|u| !u.is_empty()) {
        if state.hot_keys.allow(user) {
            debug!(user = %user, "admitted by hot-key layer");
            return (
                StatusCode::OK,
                Json(AdmissionResponse {
                    allowed: true,
                    source: "local",
                }),
            );
        }
    }

    let keys = state.resolver.resolve_keys(&identity);
    let allowed = state.authority.allow(&keys).await;

    let status = if allowed {
        StatusCode::OK
    } else {
        StatusCode::TOO_MANY_REQUESTS
    };
    (
        status,
        Json(AdmissionResponse {
            allowed,
            source: "remote",
        }),
    )
}

/// JSON snapshot of the metrics surface.
async fn metrics_snapshot(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

/// Prometheus text exposition of the metrics surface.
async fn metrics_prometheus(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.snapshot().to_prometheus(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Authority stub with a fixed answer.
    struct StaticLimiter(bool);

    #[async_trait]
    impl RateLimiter for StaticLimiter {
        async fn allow(&self, _keys: &[String]) -> bool {
            self.0
        }
    }

    fn state_with_authority(allowed: bool, shard_capacity: u64) -> Arc<AppState> {
        let metrics = Arc::new(Metrics::new());
        Arc::new(AppState {
            resolver: PolicyResolver::new(),
            hot_keys: HotKeyLimiter::new(1, shard_capacity, 0.0, metrics.clone()),
            authority: Arc::new(StaticLimiter(allowed)),
            metrics,
        })
    }

    fn identity(user: Option<&str>) -> Query<RequestIdentity> {
        Query(RequestIdentity {
            ip: Some("1.2.3.4".to_string()),
            user: user.map(String::from),
            org: None,
        })
    }

    fn status_of(response: impl IntoResponse) -> StatusCode {
        response.into_response().status()
    }

    #[tokio::test]
    async fn test_local_fast_path_admits() {
        let state = state_with_authority(false, 5);

        // The remote authority rejects everything, but the hot-key layer
        // has tokens for the user
        let status = status_of(check_admission(State(state), identity(Some("u"))).await);
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_exhausted_local_path_falls_through_to_remote() {
        let state = state_with_authority(false, 1);

        // First call drains the single local token, second falls through
        // to the rejecting authority
        let first = status_of(check_admission(State(state.clone()), identity(Some("u"))).await);
        let second = status_of(check_admission(State(state.clone()), identity(Some("u"))).await);
        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_request_without_user_goes_straight_to_remote() {
        let state = state_with_authority(true, 5);

        let status = status_of(check_admission(State(state.clone()), identity(None)).await);
        assert_eq!(status, StatusCode::OK);
        // No local decision was made
        assert_eq!(state.metrics.snapshot().local_hits, 0);
    }

    #[tokio::test]
    async fn test_metrics_endpoints_render() {
        let state = state_with_authority(true, 5);
        state.metrics.record_admitted();

        let response = metrics_snapshot(State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let response = metrics_prometheus(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
    }
}
