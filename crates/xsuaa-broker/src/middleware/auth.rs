//! Authentication middleware for protected routes.
//!
//! Hands the request's path and headers to the [`TokenBroker`] and, on
//! success, stores the [`VerifiedIdentity`](crate::auth::VerifiedIdentity)
//! in the request extensions.
//! Failures short-circuit with the broker's error response.

use crate::auth::RequestInfo;
use crate::broker::TokenBroker;
use crate::errors::AuthError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub broker: Arc<TokenBroker>,
}

/// Authentication middleware.
///
/// # Response
///
/// - 401 or 403 with a JSON error body if authentication fails
/// - Continues to the next handler with `VerifiedIdentity` in extensions
#[instrument(skip_all, name = "xsuaa.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthError> {
    // The body is not Sync, so only the parts are borrowed across the await
    let (mut parts, body) = req.into_parts();

    let identity = {
        let request = RequestInfo::new(parts.uri.path(), &parts.headers);
        state.broker.authenticate(&request).await?
    };

    tracing::debug!(
        target: "xsuaa.middleware.auth",
        method = %identity.method(),
        "Request authenticated"
    );
    parts.extensions.insert(identity);

    Ok(next.run(Request::from_parts(parts, body)).await)
}
