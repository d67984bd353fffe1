//! JWT validation for XSUAA access tokens.
//!
//! Validates tokens with the keys XSUAA publishes at `token_keys`.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only RS256/RS384/RS512 and EdDSA are accepted; the JWK key type must
//!   match the header algorithm
//! - `exp` and `nbf` are validated with clock skew tolerance, `iat` must not
//!   lie beyond it
//! - Issuer and audience are checked after the signature

use crate::auth::audience::{AudienceValidator, IssuerValidator};
use crate::auth::claims::XsuaaClaims;
use crate::auth::jwks::{Jwk, JwksClient};
use crate::errors::AuthError;
use common::jwt::{decode_ed25519_public_key_jwk, extract_header, validate_iat, JwtValidationError};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// A token whose signature, lifetime, issuer and audience have been checked.
#[derive(Debug, Clone)]
pub struct ValidatedToken {
    pub claims: XsuaaClaims,
    pub raw_claims: Map<String, Value>,
}

/// JWT validator using the XSUAA JWKS.
pub struct JwtValidator {
    jwks_client: Arc<JwksClient>,
    clock_skew: Duration,
    issuer: IssuerValidator,
    audience: AudienceValidator,
}

impl JwtValidator {
    /// Create a new JWT validator.
    ///
    /// # Arguments
    ///
    /// * `jwks_client` - Client for fetching public keys
    /// * `clock_skew` - Tolerance for `exp`, `nbf` and `iat`
    /// * `issuer` - Trusted issuer rule
    /// * `audience` - Accepted audience rule
    pub fn new(
        jwks_client: Arc<JwksClient>,
        clock_skew: Duration,
        issuer: IssuerValidator,
        audience: AudienceValidator,
    ) -> Self {
        Self {
            jwks_client,
            clock_skew,
            issuer,
            audience,
        }
    }

    /// Validate an access token.
    ///
    /// # Checks
    ///
    /// 1. Size, structure and header (`kid`, `alg`) before any crypto
    /// 2. Public key lookup by `kid`
    /// 3. Signature, `exp`, `nbf`
    /// 4. `iat` not in the future beyond clock skew
    /// 5. Issuer, then audience
    ///
    /// # Errors
    ///
    /// One distinct `AuthError` kind per failed check; details are logged at
    /// debug level only.
    #[instrument(skip_all)]
    pub async fn validate(&self, token: &str) -> Result<ValidatedToken, AuthError> {
        let header = extract_header(token).map_err(|e| {
            tracing::debug!(target: "xsuaa.auth.jwt", error = ?e, "Token header extraction failed");
            AuthError::MalformedToken(e.to_string())
        })?;

        let algorithm = supported_algorithm(&header.alg)?;

        tracing::debug!(
            target: "xsuaa.auth.jwt",
            kid = %header.kid,
            alg = %header.alg,
            jku = ?header.jku,
            "Validating token"
        );

        let jwk = self.jwks_client.get_key(&header.kid).await?;

        let (claims, raw_claims) = verify_token(token, &jwk, algorithm, self.clock_skew)?;

        if let Some(iat) = claims.iat {
            if let Err(e) = validate_iat(iat, self.clock_skew) {
                tracing::debug!(target: "xsuaa.auth.jwt", error = ?e, "Token iat validation failed");
                return Err(match e {
                    JwtValidationError::IatTooFarInFuture => AuthError::TokenNotYetValid,
                    other => AuthError::MalformedToken(other.to_string()),
                });
            }
        }

        if !self.issuer.is_trusted(&claims.iss) {
            tracing::debug!(target: "xsuaa.auth.jwt", iss = %claims.iss, "Untrusted token issuer");
            return Err(AuthError::IssuerMismatch(claims.iss));
        }

        if !self.audience.is_accepted(&claims) {
            tracing::debug!(
                target: "xsuaa.auth.jwt",
                client_id = ?claims.client_id(),
                aud = ?claims.aud,
                "Token audience does not match this service"
            );
            return Err(AuthError::AudienceMismatch);
        }

        tracing::debug!(target: "xsuaa.auth.jwt", "Token validated successfully");
        Ok(ValidatedToken { claims, raw_claims })
    }
}

fn supported_algorithm(alg: &str) -> Result<Algorithm, AuthError> {
    match alg {
        "RS256" => Ok(Algorithm::RS256),
        "RS384" => Ok(Algorithm::RS384),
        "RS512" => Ok(Algorithm::RS512),
        "EdDSA" => Ok(Algorithm::EdDSA),
        other => {
            tracing::debug!(target: "xsuaa.auth.jwt", alg = %other, "Rejected token algorithm");
            Err(AuthError::MalformedToken(format!(
                "unsupported algorithm '{}'",
                other
            )))
        }
    }
}

/// Build the decoding key for `algorithm` from a JWK.
fn decoding_key(jwk: &Jwk, algorithm: Algorithm) -> Result<DecodingKey, AuthError> {
    let key_error = |reason: &str| {
        tracing::warn!(target: "xsuaa.auth.jwt", kid = %jwk.kid, kty = %jwk.kty, reason, "Unusable JWK");
        AuthError::SignatureInvalid(format!("unusable key '{}': {}", jwk.kid, reason))
    };

    if let Some(jwk_alg) = &jwk.alg {
        if jwk_alg != algorithm_name(algorithm) {
            return Err(key_error("key algorithm does not match token algorithm"));
        }
    }

    match (jwk.kty.as_str(), algorithm) {
        ("RSA", Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512) => {
            if let (Some(n), Some(e)) = (&jwk.n, &jwk.e) {
                DecodingKey::from_rsa_components(n, e).map_err(|_| key_error("invalid RSA components"))
            } else if let Some(pem) = &jwk.value {
                DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|_| key_error("invalid RSA PEM"))
            } else {
                Err(key_error("RSA key without n/e or value"))
            }
        }
        ("OKP", Algorithm::EdDSA) => {
            let x = jwk.x.as_ref().ok_or_else(|| key_error("OKP key without x"))?;
            let public_key_bytes =
                decode_ed25519_public_key_jwk(x).map_err(|_| key_error("invalid x encoding"))?;
            Ok(DecodingKey::from_ed_der(&public_key_bytes))
        }
        _ => Err(key_error("key type does not match token algorithm")),
    }
}

fn algorithm_name(algorithm: Algorithm) -> &'static str {
    match algorithm {
        Algorithm::RS256 => "RS256",
        Algorithm::RS384 => "RS384",
        Algorithm::RS512 => "RS512",
        Algorithm::EdDSA => "EdDSA",
        _ => "unsupported",
    }
}

/// Verify signature and lifetime, returning typed and raw claims.
fn verify_token(
    token: &str,
    jwk: &Jwk,
    algorithm: Algorithm,
    clock_skew: Duration,
) -> Result<(XsuaaClaims, Map<String, Value>), AuthError> {
    let decoding_key = decoding_key(jwk, algorithm)?;

    let mut validation = Validation::new(algorithm);
    validation.leeway = clock_skew.as_secs();
    validation.validate_exp = true;
    validation.validate_nbf = true;
    // Audience is checked against XSUAA rules, not the `aud` claim alone
    validation.validate_aud = false;

    let token_data =
        decode::<Map<String, Value>>(token, &decoding_key, &validation).map_err(|e| {
            tracing::debug!(target: "xsuaa.auth.jwt", error = %e, "Token verification failed");
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidRsaKey(_)
                | ErrorKind::InvalidEcdsaKey
                | ErrorKind::InvalidKeyFormat => AuthError::SignatureInvalid(e.to_string()),
                _ => AuthError::MalformedToken(e.to_string()),
            }
        })?;

    let raw_claims = token_data.claims;
    let claims: XsuaaClaims =
        serde_json::from_value(Value::Object(raw_claims.clone())).map_err(|e| {
            tracing::debug!(target: "xsuaa.auth.jwt", error = %e, "Token claims do not match XSUAA layout");
            AuthError::MalformedToken(format!("unexpected claims: {}", e))
        })?;

    Ok((claims, raw_claims))
}
