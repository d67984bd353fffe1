//! Client for the XSUAA `token_keys` endpoint.
//!
//! Fetches the JSON Web Key Set XSUAA signs access tokens with and caches it
//! with a configurable TTL. A token signed with a key id the cache does not
//! know triggers a refresh, at most once per [`MIN_REFRESH_INTERVAL`], so that
//! key rotation is picked up before the TTL runs out.

use crate::errors::AuthError;
use crate::observability::metrics;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::instrument;

/// Default cache TTL in seconds (5 minutes).
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

/// Minimum time between two refreshes caused by an unknown key id.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON Web Key as published by XSUAA.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type: "RSA" (XSUAA default) or "OKP".
    pub kty: String,

    pub kid: String,

    #[serde(default)]
    pub alg: Option<String>,

    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// RSA public key as PEM; XSUAA publishes it alongside `n`/`e`.
    #[serde(default)]
    pub value: Option<String>,

    /// OKP curve name.
    #[serde(default)]
    pub crv: Option<String>,

    /// OKP public key (base64url).
    #[serde(default)]
    pub x: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<Jwk>,
}

struct CachedJwks {
    keys: HashMap<String, Jwk>,
    fetched_at: Instant,
    expires_at: Instant,
}

/// Thread-safe `token_keys` client with a TTL cache.
pub struct JwksClient {
    jwks_url: String,
    http_client: reqwest::Client,
    cache: Arc<RwLock<Option<CachedJwks>>>,
    cache_ttl: Duration,
}

impl JwksClient {
    /// Create a client for `{uaa_url}/token_keys` with the default TTL.
    pub fn new(jwks_url: String) -> Self {
        Self::with_ttl(jwks_url, Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS))
    }

    pub fn with_ttl(jwks_url: String, cache_ttl: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "xsuaa.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self::with_http_client(jwks_url, cache_ttl, http_client)
    }

    /// Use a preconfigured HTTP client (shared connection pool, proxy, timeout).
    pub fn with_http_client(
        jwks_url: String,
        cache_ttl: Duration,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            jwks_url,
            http_client,
            cache: Arc::new(RwLock::new(None)),
            cache_ttl,
        }
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Get a JWK by key ID, fetching `token_keys` if the cache is empty,
    /// expired, or does not know the key.
    ///
    /// # Errors
    ///
    /// - `AuthError::IdpUnreachable` if `token_keys` cannot be fetched.
    /// - `AuthError::SignatureInvalid` if the key id is unknown.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Jwk, AuthError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                let now = Instant::now();
                if cached.expires_at > now {
                    if let Some(key) = cached.keys.get(kid) {
                        tracing::debug!(target: "xsuaa.auth.jwks", kid = %kid, "JWKS cache hit");
                        return Ok(key.clone());
                    }
                    if now.duration_since(cached.fetched_at) < MIN_REFRESH_INTERVAL {
                        tracing::debug!(target: "xsuaa.auth.jwks", kid = %kid, "Key not found in recently refreshed JWKS cache");
                        return Err(unknown_key(kid));
                    }
                    tracing::debug!(target: "xsuaa.auth.jwks", kid = %kid, "Key not found in JWKS cache, refreshing");
                }
            }
        }

        self.refresh_cache().await?;

        let cache = self.cache.read().await;
        if let Some(key) = cache.as_ref().and_then(|cached| cached.keys.get(kid)) {
            return Ok(key.clone());
        }

        tracing::warn!(target: "xsuaa.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
        Err(unknown_key(kid))
    }

    #[instrument(skip(self))]
    async fn refresh_cache(&self) -> Result<(), AuthError> {
        tracing::debug!(target: "xsuaa.auth.jwks", url = %self.jwks_url, "Fetching token keys");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "xsuaa.auth.jwks", error = %e, "Failed to fetch token keys");
                metrics::record_jwks_refresh("error");
                AuthError::IdpUnreachable(format!("token_keys request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                target: "xsuaa.auth.jwks",
                status = %status,
                "token_keys endpoint returned error"
            );
            metrics::record_jwks_refresh("error");
            return Err(AuthError::IdpUnreachable(format!(
                "token_keys returned {}",
                status
            )));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "xsuaa.auth.jwks", error = %e, "Failed to parse token keys response");
            metrics::record_jwks_refresh("error");
            AuthError::IdpUnreachable(format!("token_keys response unusable: {}", e))
        })?;

        let keys: HashMap<String, Jwk> = jwks
            .keys
            .into_iter()
            .filter(|key| key.key_use.as_deref().map_or(true, |u| u == "sig"))
            .map(|key| (key.kid.clone(), key))
            .collect();

        tracing::info!(
            target: "xsuaa.auth.jwks",
            key_count = keys.len(),
            "JWKS cache refreshed"
        );
        metrics::record_jwks_refresh("success");

        let now = Instant::now();
        let mut cache = self.cache.write().await;
        *cache = Some(CachedJwks {
            keys,
            fetched_at: now,
            expires_at: now + self.cache_ttl,
        });

        Ok(())
    }

    /// Force refresh the cache, e.g. after an out-of-band key rotation notice.
    pub async fn force_refresh(&self) -> Result<(), AuthError> {
        self.refresh_cache().await
    }

    #[cfg(test)]
    pub(crate) async fn seed_cache(&self, keys: Vec<Jwk>) {
        let now = Instant::now();
        let mut cache = self.cache.write().await;
        *cache = Some(CachedJwks {
            keys: keys.into_iter().map(|k| (k.kid.clone(), k)).collect(),
            fetched_at: now,
            expires_at: now + self.cache_ttl,
        });
    }
}

fn unknown_key(kid: &str) -> AuthError {
    AuthError::SignatureInvalid(format!("unknown key id '{}'", kid))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_jwk_deserialization_xsuaa_rsa() {
        let json = r#"{
            "kty": "RSA",
            "e": "AQAB",
            "use": "sig",
            "kid": "key-id-1",
            "alg": "RS256",
            "value": "-----BEGIN PUBLIC KEY-----\nMIIB\n-----END PUBLIC KEY-----",
            "n": "0Vlai5QB"
        }"#;

        let jwk: Jwk = serde_json::from_str(json).unwrap();

        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.kid, "key-id-1");
        assert_eq!(jwk.alg.as_deref(), Some("RS256"));
        assert_eq!(jwk.key_use.as_deref(), Some("sig"));
        assert_eq!(jwk.n.as_deref(), Some("0Vlai5QB"));
        assert_eq!(jwk.e.as_deref(), Some("AQAB"));
        assert!(jwk.value.unwrap().starts_with("-----BEGIN PUBLIC KEY-----"));
        assert!(jwk.x.is_none());
    }

    #[test]
    fn test_jwk_deserialization_okp() {
        let json = r#"{
            "kty": "OKP",
            "kid": "test-key-01",
            "crv": "Ed25519",
            "x": "dGVzdC1wdWJsaWMta2V5LWRhdGE",
            "alg": "EdDSA"
        }"#;

        let jwk: Jwk = serde_json::from_str(json).unwrap();

        assert_eq!(jwk.kty, "OKP");
        assert_eq!(jwk.crv.as_deref(), Some("Ed25519"));
        assert!(jwk.n.is_none());
        assert!(jwk.key_use.is_none());
    }

    #[test]
    fn test_jwks_response_deserialization() {
        let json = r#"{
            "keys": [
                {"kty": "RSA", "kid": "key-1"},
                {"kty": "OKP", "kid": "key-2"}
            ]
        }"#;

        let jwks: JwksResponse = serde_json::from_str(json).unwrap();

        assert_eq!(jwks.keys.len(), 2);
        assert_eq!(jwks.keys.first().unwrap().kid, "key-1");
        assert_eq!(jwks.keys.get(1).unwrap().kid, "key-2");
    }

    #[test]
    fn test_jwks_client_creation() {
        let client = JwksClient::new("http://localhost:8080/uaa/token_keys".to_string());
        assert_eq!(client.jwks_url(), "http://localhost:8080/uaa/token_keys");
        assert_eq!(
            client.cache_ttl,
            Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS)
        );
    }

    #[tokio::test]
    async fn test_seeded_cache_serves_known_key_without_network() {
        // Port 9 (discard) is never contacted on a cache hit
        let client = JwksClient::new("http://127.0.0.1:9/token_keys".to_string());
        client
            .seed_cache(vec![Jwk {
                kty: "RSA".to_string(),
                kid: "key-id-1".to_string(),
                alg: Some("RS256".to_string()),
                key_use: Some("sig".to_string()),
                n: Some("AQAB".to_string()),
                e: Some("AQAB".to_string()),
                value: None,
                crv: None,
                x: None,
            }])
            .await;

        let key = client.get_key("key-id-1").await.unwrap();
        assert_eq!(key.kty, "RSA");
    }

    #[tokio::test]
    async fn test_unknown_kid_in_fresh_cache_is_rejected_without_refresh() {
        let client = JwksClient::new("http://127.0.0.1:9/token_keys".to_string());
        client.seed_cache(Vec::new()).await;

        let err = client.get_key("rotated-key").await.unwrap_err();
        assert!(matches!(err, AuthError::SignatureInvalid(_)));
    }
}
