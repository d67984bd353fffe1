//! Credential validation strategies, one per authentication method.
//!
//! Every strategy ends in the JWT path: a bearer token is validated directly,
//! Basic credentials are first exchanged for an access token at the XSUAA
//! token endpoint.

use crate::auth::claims::VerifiedIdentity;
use crate::auth::jwt::{JwtValidator, ValidatedToken};
use crate::auth::method::AuthenticationMethod;
use crate::auth::resolver::RawCredential;
use crate::errors::AuthError;
use crate::identity::ClientIdentity;
use crate::services::TokenExchange;
use common::secret::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::instrument;

/// The closed set of validation strategies.
#[derive(Clone)]
pub struct CredentialValidators {
    jwt_validator: Arc<JwtValidator>,
    token_exchange: Arc<dyn TokenExchange>,
}

impl CredentialValidators {
    pub fn new(jwt_validator: Arc<JwtValidator>, token_exchange: Arc<dyn TokenExchange>) -> Self {
        Self {
            jwt_validator,
            token_exchange,
        }
    }

    /// Validate `credential` with the strategy for `method`.
    ///
    /// # Errors
    ///
    /// - OAuth2: any JWT validation error
    /// - Basic: `InvalidCredentials` or `IdpUnreachable` from the token
    ///   endpoint, then any JWT validation error
    /// - ClientCredentials: `IdentityMismatch` if the username is not this
    ///   service's client id, then as Basic
    /// - `UnsupportedScheme` if the credential kind does not fit the method
    pub async fn validate(
        &self,
        method: AuthenticationMethod,
        credential: &RawCredential,
        identity: &ClientIdentity,
    ) -> Result<VerifiedIdentity, AuthError> {
        match (method, credential) {
            (AuthenticationMethod::OAuth2, RawCredential::Bearer(token)) => {
                self.validate_bearer(token).await
            }
            (
                AuthenticationMethod::Basic,
                RawCredential::UsernamePassword { username, password },
            ) => self.validate_password(username, password, identity).await,
            (
                AuthenticationMethod::ClientCredentials,
                RawCredential::UsernamePassword { username, password },
            ) => {
                self.validate_client_credentials(username, password, identity)
                    .await
            }
            (method, _) => Err(AuthError::UnsupportedScheme(format!(
                "credential kind does not fit {}",
                method
            ))),
        }
    }

    #[instrument(skip_all, name = "xsuaa.validate.oauth2")]
    async fn validate_bearer(&self, token: &SecretString) -> Result<VerifiedIdentity, AuthError> {
        let validated = self.jwt_validator.validate(token.expose_secret()).await?;
        Ok(into_identity(validated, AuthenticationMethod::OAuth2))
    }

    #[instrument(skip_all, name = "xsuaa.validate.basic")]
    async fn validate_password(
        &self,
        username: &str,
        password: &SecretString,
        identity: &ClientIdentity,
    ) -> Result<VerifiedIdentity, AuthError> {
        let access_token = self
            .token_exchange
            .password_grant(identity, username, password)
            .await?;

        let validated = self
            .jwt_validator
            .validate(access_token.access_token.expose_secret())
            .await?;
        Ok(into_identity(validated, AuthenticationMethod::Basic))
    }

    #[instrument(skip_all, name = "xsuaa.validate.client_credentials")]
    async fn validate_client_credentials(
        &self,
        client_id: &str,
        client_secret: &SecretString,
        identity: &ClientIdentity,
    ) -> Result<VerifiedIdentity, AuthError> {
        if client_id != identity.id() {
            tracing::debug!(target: "xsuaa.broker", "Presented client id is not this service's client id");
            return Err(AuthError::IdentityMismatch);
        }

        let access_token = self
            .token_exchange
            .client_credentials_grant(client_id, client_secret)
            .await?;

        let validated = self
            .jwt_validator
            .validate(access_token.access_token.expose_secret())
            .await?;

        // The IdP must have issued the token to the client that asked for it
        if validated.claims.client_id() != Some(identity.id()) {
            tracing::warn!(
                target: "xsuaa.broker",
                token_client_id = ?validated.claims.client_id(),
                "Client credentials token issued to a different client"
            );
            return Err(AuthError::IdentityMismatch);
        }

        Ok(into_identity(
            validated,
            AuthenticationMethod::ClientCredentials,
        ))
    }
}

fn into_identity(validated: ValidatedToken, method: AuthenticationMethod) -> VerifiedIdentity {
    VerifiedIdentity::new(validated.claims, validated.raw_claims, method)
}
