//! Current principal handler.
//!
//! Returns what the broker verified about the caller.

use crate::auth::{AuthenticationMethod, VerifiedIdentity};
use axum::{Extension, Json};
use serde::Serialize;
use tracing::instrument;

/// Response for `/user` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    /// XSUAA principal name, e.g. `user/useridp/Mustermann`.
    pub principal: String,

    pub subject: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    pub issuer: String,

    /// Method that accepted the credential.
    pub method: AuthenticationMethod,

    pub scopes: Vec<String>,

    /// Token expiry, Unix epoch seconds.
    pub expires_at: i64,
}

impl From<&VerifiedIdentity> for UserResponse {
    fn from(identity: &VerifiedIdentity) -> Self {
        Self {
            principal: identity.principal_name(),
            subject: identity.subject().to_string(),
            client_id: identity.client_id().map(str::to_string),
            issuer: identity.issuer().to_string(),
            method: identity.method(),
            scopes: identity.scopes().to_vec(),
            expires_at: identity.expires_at(),
        }
    }
}

/// Handler for GET /user
///
/// Requires the auth middleware.
///
/// ```json
/// {
///   "principal": "user/useridp/Mustermann",
///   "subject": "0cbc3b4f-1d5a-4c1e-9f7a-1b2d3c4e5f60",
///   "client_id": "sb-java-hello-world",
///   "issuer": "http://localhost:8080/uaa/oauth/token",
///   "method": "basic",
///   "scopes": ["java-hello-world.Display"],
///   "expires_at": 1234567890
/// }
/// ```
#[instrument(skip_all, name = "xsuaa.handlers.user")]
pub async fn get_user(Extension(identity): Extension<VerifiedIdentity>) -> Json<UserResponse> {
    Json(UserResponse::from(&identity))
}
