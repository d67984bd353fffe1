//! HTTP routes for the broker's demo server.
//!
//! Defines the Axum router and application state.

use crate::broker::TokenBroker;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Upper bound for a whole request, including IdP round trips.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broker shared by every request; its configuration can be swapped at runtime.
    pub broker: Arc<TokenBroker>,
}

/// Build the application routes.
///
/// - `/v1/health` - liveness probe, public
/// - `/metrics` - Prometheus metrics, public
/// - `/user` - current principal, requires authentication
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        broker: state.broker.clone(),
    });

    let public_routes = Router::new().route("/v1/health", get(handlers::health_check));

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route("/user", get(handlers::get_user))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer (innermost)
    // 2. TraceLayer
    // 3. http_metrics_middleware (outermost, sees every response)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(middleware::from_fn(http_metrics_middleware))
}
