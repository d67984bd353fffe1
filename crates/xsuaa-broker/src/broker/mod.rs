//! Token broker: turns an inbound request into a verified identity.
//!
//! Per request the broker loads one snapshot of the authentication
//! configuration, resolves the ordered attempts from the `Authorization`
//! header, and runs them in order:
//!
//! ```text
//! Start -> TryMethod(0) -> Accepted
//!                       -> TryMethod(1) -> ... -> Rejected(last error)
//! ```
//!
//! Failed attempts are logged at debug level; when every attempt fails the
//! error of the last one is returned. Successful results are cached by a hash
//! of method and credential.

pub mod cache;

use crate::auth::audience::{AudienceValidator, IssuerValidator};
use crate::auth::extractor::{
    AuthenticationInformationExtractor, DefaultAuthenticationInformationExtractor, RequestInfo,
};
use crate::auth::jwks::JwksClient;
use crate::auth::jwt::JwtValidator;
use crate::auth::resolver::{resolve, ResolvedAttempt};
use crate::auth::validators::CredentialValidators;
use crate::auth::VerifiedIdentity;
use crate::config::Config;
use crate::errors::AuthError;
use crate::identity::ClientIdentity;
use crate::observability::metrics;
use crate::services::{IdpClient, TokenExchange};
use arc_swap::ArcSwap;
use cache::{CacheKey, TokenCache};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// The swappable part of the broker's configuration.
pub struct AuthenticationConfig {
    extractor: Box<dyn AuthenticationInformationExtractor>,
}

impl AuthenticationConfig {
    pub fn new(extractor: impl AuthenticationInformationExtractor + 'static) -> Self {
        Self {
            extractor: Box::new(extractor),
        }
    }

    pub fn extractor(&self) -> &dyn AuthenticationInformationExtractor {
        self.extractor.as_ref()
    }
}

impl fmt::Debug for AuthenticationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationConfig")
            .field("extractor", &self.extractor)
            .finish()
    }
}

/// Validates inbound credentials on behalf of this service.
pub struct TokenBroker {
    identity: Arc<ClientIdentity>,
    validators: CredentialValidators,
    config: ArcSwap<AuthenticationConfig>,
    cache: Option<TokenCache>,
}

impl TokenBroker {
    pub fn new(
        identity: Arc<ClientIdentity>,
        validators: CredentialValidators,
        config: AuthenticationConfig,
        cache: Option<TokenCache>,
    ) -> Self {
        Self {
            identity,
            validators,
            config: ArcSwap::from_pointee(config),
            cache,
        }
    }

    /// Wire a broker from environment configuration.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if the token endpoint client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, AuthError> {
        let idp_client = IdpClient::new(
            &config.xsuaa_url,
            config.cert_url.as_deref(),
            &config.client_identity,
            Duration::from_secs(config.idp_timeout_seconds),
        )?;

        Ok(Self::from_config_with_exchange(config, Arc::new(idp_client)))
    }

    /// As [`TokenBroker::from_config`] with a caller-supplied token exchange.
    pub fn from_config_with_exchange(
        config: &Config,
        token_exchange: Arc<dyn TokenExchange>,
    ) -> Self {
        let jwks_client = Arc::new(JwksClient::with_ttl(
            config.jwks_url(),
            Duration::from_secs(config.jwks_cache_ttl_seconds),
        ));

        let clock_skew =
            Duration::from_secs(u64::try_from(config.jwt_clock_skew_seconds).unwrap_or(0));

        let jwt_validator = Arc::new(JwtValidator::new(
            jwks_client,
            clock_skew,
            IssuerValidator::new(&config.xsuaa_url, config.uaa_domain.as_deref()),
            AudienceValidator::new(config.client_id(), config.xsappname.as_str()),
        ));

        let cache = (config.token_cache_ttl_seconds > 0).then(|| {
            TokenCache::new(
                Duration::from_secs(config.token_cache_ttl_seconds),
                config.token_cache_max_entries,
            )
        });

        Self::new(
            Arc::new(config.client_identity.clone()),
            CredentialValidators::new(jwt_validator, token_exchange),
            AuthenticationConfig::new(DefaultAuthenticationInformationExtractor::new(
                config.auth_methods.clone(),
            )),
            cache,
        )
    }

    /// Replace the authentication configuration.
    ///
    /// Takes effect for requests that start after the call; requests already
    /// in flight finish with the snapshot they loaded.
    pub fn set_authentication_config(
        &self,
        extractor: impl AuthenticationInformationExtractor + 'static,
    ) {
        let config = AuthenticationConfig::new(extractor);
        tracing::info!(target: "xsuaa.broker", config = ?config, "Authentication configuration replaced");
        self.config.store(Arc::new(config));
    }

    /// Current authentication configuration snapshot.
    pub fn authentication_config(&self) -> Arc<AuthenticationConfig> {
        self.config.load_full()
    }

    /// Authenticate a request.
    ///
    /// # Errors
    ///
    /// Resolution errors (`MissingCredential`, `UnsupportedScheme`,
    /// `MalformedCredential`) are returned before any network call. Otherwise
    /// the error of the last failed attempt is returned.
    #[instrument(skip_all, fields(path = %request.path()))]
    pub async fn authenticate(
        &self,
        request: &RequestInfo<'_>,
    ) -> Result<VerifiedIdentity, AuthError> {
        let started = Instant::now();
        let config = self.config.load_full();
        let methods = config.extractor().authentication_methods(request);

        let attempts = match resolve(request.authorization(), methods, self.identity.id()) {
            Ok(attempts) => attempts,
            Err(e) => {
                tracing::debug!(target: "xsuaa.broker", error = %e, "Credential resolution failed");
                metrics::record_authentication("none", "error", Some(e.code()), started.elapsed());
                return Err(e);
            }
        };

        let result = self.run_attempts(&attempts).await;

        match &result {
            Ok(identity) => metrics::record_authentication(
                identity.method().as_str(),
                "success",
                None,
                started.elapsed(),
            ),
            Err(e) => metrics::record_authentication(
                attempts
                    .last()
                    .map_or("none", |attempt| attempt.method.as_str()),
                "error",
                Some(e.code()),
                started.elapsed(),
            ),
        }

        result
    }

    async fn run_attempts(
        &self,
        attempts: &[ResolvedAttempt],
    ) -> Result<VerifiedIdentity, AuthError> {
        let mut last_error = None;

        for attempt in attempts {
            match self.try_attempt(attempt).await {
                Ok(identity) => {
                    tracing::debug!(
                        target: "xsuaa.broker",
                        method = %attempt.method,
                        "Authentication accepted"
                    );
                    return Ok(identity);
                }
                Err(e) => {
                    tracing::debug!(
                        target: "xsuaa.broker",
                        method = %attempt.method,
                        error = %e,
                        "Authentication attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(AuthError::MissingCredential))
    }

    async fn try_attempt(&self, attempt: &ResolvedAttempt) -> Result<VerifiedIdentity, AuthError> {
        let Some(cache) = &self.cache else {
            return self
                .validators
                .validate(attempt.method, &attempt.credential, &self.identity)
                .await;
        };

        let key = CacheKey::new(attempt.method, &attempt.credential);
        if let Some(identity) = cache.get(&key).await {
            tracing::debug!(target: "xsuaa.broker", method = %attempt.method, "Result cache hit");
            return Ok(identity);
        }

        let identity = self
            .validators
            .validate(attempt.method, &attempt.credential, &self.identity)
            .await?;
        cache.insert(key, identity.clone()).await;
        Ok(identity)
    }
}
