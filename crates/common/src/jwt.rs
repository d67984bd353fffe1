//! JWT utilities shared by the XSUAA broker crates.
//!
//! This module provides the pre-verification checks every bearer token goes
//! through before any key lookup or signature work:
//! - Size limits for DoS prevention
//! - Clock skew constants for `iat`/`exp`/`nbf` validation
//! - Unverified header inspection (`kid`, `alg`, `jku`)
//! - `iat` validation logic
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Header values are only used to select a key from a trusted JWKS
//! - Generic error messages prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{extract_header, validate_iat, DEFAULT_CLOCK_SKEW};
//!
//! // Size check + kid/alg extraction in one step
//! let header = extract_header(token)?;
//! let jwk = jwks_client.get_key(&header.kid).await?;
//!
//! // After signature verification, validate iat
//! validate_iat(claims.iat, DEFAULT_CLOCK_SKEW)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any parsing or cryptographic
/// operations.
///
/// XSUAA user tokens carry scope arrays and `ext_attr` blocks and typically
/// land between 1 and 3KB, well under this limit.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (1 minute).
///
/// Applied to `exp`, `nbf` and `iat` checks to absorb clock drift between the
/// IdP and this service.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Prevents misconfiguration from silently accepting long-expired tokens.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while inspecting a JWT before verification.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token is missing required `kid` header.
    #[error("The access token is invalid or expired")]
    MissingKid,

    /// Token is missing the `alg` header.
    #[error("The access token is invalid or expired")]
    MissingAlgorithm,

    /// Token `iat` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

// =============================================================================
// Header Types
// =============================================================================

/// The subset of the JOSE header used for key selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Key ID used to look up the verification key.
    pub kid: String,

    /// Signing algorithm as declared by the token (e.g. `RS256`, `EdDSA`).
    pub alg: String,

    /// JWKS URL hint. XSUAA sets this; it is informational only and never
    /// used to fetch keys.
    pub jku: Option<String>,
}

#[derive(Deserialize)]
struct RawHeader {
    #[serde(default)]
    kid: Option<serde_json::Value>,
    #[serde(default)]
    alg: Option<String>,
    #[serde(default)]
    jku: Option<String>,
}

// =============================================================================
// Functions
// =============================================================================

/// Extract the key-selection header fields from a JWT without verifying it.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - This function does NOT validate the token signature
/// - The returned values must only be used for key lookup in a trusted JWKS
///
/// # Errors
///
/// Returns `JwtValidationError` variants:
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong structure, bad base64, or invalid JSON
/// - `MissingKid` - Header has no non-empty string `kid`
/// - `MissingAlgorithm` - Header has no `alg`
pub fn extract_header(token: &str) -> Result<TokenHeader, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    let header_part = parts.first().ok_or(JwtValidationError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: RawHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    // kid must be a non-empty string
    let kid = header
        .kid
        .as_ref()
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)?;

    let alg = header
        .alg
        .filter(|s| !s.is_empty())
        .ok_or(JwtValidationError::MissingAlgorithm)?;

    Ok(TokenHeader {
        kid,
        alg,
        jku: header.jku,
    })
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// Rejects tokens with `iat` more than `clock_skew` in the future.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if the iat timestamp is more than
/// `clock_skew` in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW (600 seconds)
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now + clock_skew_secs;

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

/// Decode an Ed25519 public key from JWK `x` field (base64url format).
///
/// # Errors
///
/// Returns `base64::DecodeError` if the base64url content cannot be decoded.
pub fn decode_ed25519_public_key_jwk(x_b64url: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(x_b64url)
}

// =============================================================================
// Tests
// =============================================================================
