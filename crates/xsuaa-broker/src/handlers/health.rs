//! Liveness handler.
//!
//! Does not call the IdP: an unreachable XSUAA shows up as authentication
//! failures, not as a dead process.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Handler for GET /v1/health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let Json(response) = health_check().await;
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"status":"healthy"}"#
        );
    }
}
