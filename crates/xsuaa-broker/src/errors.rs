//! Authentication error taxonomy.
//!
//! Every failure the broker can produce is an [`AuthError`]. Each kind maps to
//! an HTTP status and a stable error `code` via the `IntoResponse` impl. The
//! message returned to clients is generic; the detail carried by the variant
//! is only logged server-side.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Authentication error type.
///
/// Maps to HTTP status codes:
/// - `IdentityMismatch`, `AudienceMismatch`: 403 Forbidden
/// - `Internal`: 500 Internal Server Error
/// - everything else: 401 Unauthorized with a `WWW-Authenticate` challenge
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingCredential,

    #[error("Unsupported authentication scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Malformed credential: {0}")]
    MalformedCredential(String),

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Invalid token signature: {0}")]
    SignatureInvalid(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Token not yet valid")]
    TokenNotYetValid,

    #[error("Issuer mismatch: {0}")]
    IssuerMismatch(String),

    #[error("Audience mismatch")]
    AudienceMismatch,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Presented client id does not match this service")]
    IdentityMismatch,

    #[error("Identity provider unreachable: {0}")]
    IdpUnreachable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::IdentityMismatch | AuthError::AudienceMismatch => 403,
            AuthError::Internal(_) => 500,
            _ => 401,
        }
    }

    /// Stable machine-readable code, also used as the metrics `error_type` label.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "MISSING_CREDENTIAL",
            AuthError::UnsupportedScheme(_) => "UNSUPPORTED_SCHEME",
            AuthError::MalformedCredential(_) => "MALFORMED_CREDENTIAL",
            AuthError::MalformedToken(_) => "MALFORMED_TOKEN",
            AuthError::SignatureInvalid(_) => "SIGNATURE_INVALID",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::TokenNotYetValid => "TOKEN_NOT_YET_VALID",
            AuthError::IssuerMismatch(_) => "ISSUER_MISMATCH",
            AuthError::AudienceMismatch => "AUDIENCE_MISMATCH",
            AuthError::InvalidCredentials(_) => "INVALID_CREDENTIALS",
            AuthError::IdentityMismatch => "IDENTITY_MISMATCH",
            AuthError::IdpUnreachable(_) => "IDP_UNREACHABLE",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True when the failure says nothing about the credential itself and a
    /// later retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::IdpUnreachable(_))
    }

    fn client_message(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "Authentication required",
            AuthError::UnsupportedScheme(_) => {
                "The authentication scheme is not accepted for this resource"
            }
            AuthError::MalformedCredential(_) => "The Authorization header is malformed",
            AuthError::MalformedToken(_)
            | AuthError::SignatureInvalid(_)
            | AuthError::TokenExpired
            | AuthError::TokenNotYetValid
            | AuthError::IssuerMismatch(_) => "The access token is invalid or expired",
            AuthError::AudienceMismatch => "The access token was not issued for this service",
            AuthError::InvalidCredentials(_) => "Invalid credentials",
            AuthError::IdentityMismatch => "The client is not allowed to access this service",
            AuthError::IdpUnreachable(_) => "Authentication service unavailable",
            AuthError::Internal(_) => "An internal error occurred",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            AuthError::IdpUnreachable(reason) => {
                tracing::warn!(target: "xsuaa.availability", reason = %reason, "Identity provider unavailable");
            }
            AuthError::Internal(reason) => {
                tracing::error!(target: "xsuaa.internal", reason = %reason, "Internal authentication error");
            }
            other => {
                tracing::debug!(target: "xsuaa.auth", error = %other, "Request rejected");
            }
        }

        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.client_message().to_string(),
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // RFC 6750: no error attribute when the request carried no credential
        if status == StatusCode::UNAUTHORIZED {
            let challenge = match self {
                AuthError::MissingCredential => "Bearer realm=\"xsuaa\"",
                _ => "Bearer realm=\"xsuaa\", error=\"invalid_token\"",
            };
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
        }

        response
    }
}
