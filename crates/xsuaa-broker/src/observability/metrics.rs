//! Metrics definitions for the XSUAA broker.
//!
//! All metrics follow Prometheus naming conventions:
//! - `xsuaa_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 4 values (oauth2, basic, client_credentials, none)
//! - `status`: success, error
//! - `error_type`: bounded by `AuthError` variants
//! - `grant`: password, client_credentials
//! - `outcome`: success, rejected, unavailable
//!
//! Subjects, client ids and other credential-derived values are never labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle used by `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("xsuaa_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("xsuaa_authentication".to_string()),
            &[
                0.0005, 0.001, 0.005, 0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500,
            ],
        )
        .map_err(|e| format!("Failed to set authentication buckets: {e}"))?
        // Token endpoint calls are bounded by the IdP timeout
        .set_buckets_for_metric(
            Matcher::Prefix("xsuaa_idp_token_request".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set IdP request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion.
///
/// Metric: `xsuaa_http_requests_total`, `xsuaa_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let endpoint = normalize_endpoint(endpoint);

    histogram!("xsuaa_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status" => categorize_status_code(status_code)
    )
    .record(duration.as_secs_f64());

    counter!("xsuaa_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        401 | 403 => "unauthorized",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Unknown paths collapse to `/other` to bound cardinality.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/v1/health" => "/v1/health",
        "/metrics" => "/metrics",
        "/user" => "/user",
        _ => "/other",
    }
}

// ============================================================================
// Authentication Metrics
// ============================================================================

/// Record the outcome of one `TokenBroker::authenticate` call.
///
/// Metric: `xsuaa_authentications_total`, `xsuaa_authentication_duration_seconds`
/// Labels: `method`, `status`, `error_type`
///
/// `method` is the method that produced the result, or `none` when resolution
/// failed before any method was tried.
pub fn record_authentication(
    method: &str,
    status: &str,
    error_type: Option<&str>,
    duration: Duration,
) {
    histogram!("xsuaa_authentication_duration_seconds",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("xsuaa_authentications_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "error_type" => error_type.unwrap_or("none").to_string()
    )
    .increment(1);
}

/// Record a result cache lookup.
///
/// Metric: `xsuaa_token_cache_total`
/// Labels: `result` (hit, miss)
pub fn record_cache_lookup(hit: bool) {
    counter!("xsuaa_token_cache_total",
        "result" => if hit { "hit" } else { "miss" }
    )
    .increment(1);
}

/// Record the number of live result cache entries.
///
/// Metric: `xsuaa_token_cache_entries`
pub fn set_cache_entries(entries: usize) {
    gauge!("xsuaa_token_cache_entries").set(entries as f64);
}

// ============================================================================
// Identity Provider Metrics
// ============================================================================

/// Record a token endpoint request.
///
/// Metric: `xsuaa_idp_token_requests_total`, `xsuaa_idp_token_request_duration_seconds`
/// Labels: `grant`, `outcome`
pub fn record_idp_token_request(grant: &str, outcome: &str, duration: Duration) {
    histogram!("xsuaa_idp_token_request_duration_seconds",
        "grant" => grant.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("xsuaa_idp_token_requests_total",
        "grant" => grant.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a `token_keys` fetch.
///
/// Metric: `xsuaa_jwks_refresh_total`
/// Labels: `status`
pub fn record_jwks_refresh(status: &str) {
    counter!("xsuaa_jwks_refresh_total",
        "status" => status.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    // These execute the recording functions against the global no-op
    // recorder; values are checked in the /metrics integration test.

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/user", 200, Duration::from_millis(4));
        record_http_request("GET", "/user", 401, Duration::from_millis(1));
        record_http_request("GET", "/does-not-exist", 404, Duration::from_millis(1));
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(204), "success");
        assert_eq!(categorize_status_code(401), "unauthorized");
        assert_eq!(categorize_status_code(403), "unauthorized");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(500), "error");
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("/user"), "/user");
        assert_eq!(normalize_endpoint("/v1/health"), "/v1/health");
        assert_eq!(normalize_endpoint("/metrics"), "/metrics");
        assert_eq!(normalize_endpoint("/user/123"), "/other");
        assert_eq!(normalize_endpoint("/"), "/other");
    }

    #[test]
    fn test_record_authentication() {
        record_authentication("oauth2", "success", None, Duration::from_millis(3));
        record_authentication(
            "basic",
            "error",
            Some("INVALID_CREDENTIALS"),
            Duration::from_millis(120),
        );
        record_authentication(
            "none",
            "error",
            Some("MISSING_CREDENTIAL"),
            Duration::from_micros(10),
        );
    }

    #[test]
    fn test_record_cache_metrics() {
        record_cache_lookup(true);
        record_cache_lookup(false);
        set_cache_entries(0);
        set_cache_entries(42);
    }

    #[test]
    fn test_record_idp_metrics() {
        record_idp_token_request("password", "success", Duration::from_millis(80));
        record_idp_token_request("client_credentials", "unavailable", Duration::from_secs(10));
        record_jwks_refresh("success");
        record_jwks_refresh("error");
    }
}
