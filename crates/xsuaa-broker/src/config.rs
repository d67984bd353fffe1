//! XSUAA broker configuration.
//!
//! Configuration is loaded from environment variables mirroring the fields of
//! an XSUAA service binding (`url`, `uaadomain`, `clientid`, `clientsecret`,
//! `certurl`, `certificate`, `key`, `xsappname`). Credential material is
//! redacted in Debug output.

use crate::auth::method::{parse_method_list, AuthenticationMethod};
use crate::identity::ClientIdentity;
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default `token_keys` cache TTL in seconds.
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 300;

/// Default result cache TTL in seconds.
pub const DEFAULT_TOKEN_CACHE_TTL_SECONDS: u64 = 300;

/// Default result cache capacity.
pub const DEFAULT_TOKEN_CACHE_MAX_ENTRIES: usize = 10_000;

/// Default token endpoint timeout in seconds.
pub const DEFAULT_IDP_TIMEOUT_SECONDS: u64 = 10;

/// Default connection drain period on shutdown in seconds.
pub const DEFAULT_DRAIN_SECONDS: u64 = 5;

/// Upper bound for the drain period.
pub const MAX_DRAIN_SECONDS: u64 = 300;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// XSUAA broker configuration.
#[derive(Clone)]
pub struct Config {
    /// XSUAA base URL; `token_keys` and `oauth/token` live below it.
    pub xsuaa_url: String,

    /// Trusted issuer domain (`uaadomain` of the binding).
    pub uaa_domain: Option<String>,

    /// mTLS base URL for certificate identities (`certurl`).
    pub cert_url: Option<String>,

    /// This service's identity; the secret or key is redacted in Debug output.
    pub client_identity: ClientIdentity,

    /// Application name used in scope prefixes and audiences.
    pub xsappname: String,

    /// Ordered methods accepted by default.
    pub auth_methods: Vec<AuthenticationMethod>,

    /// Tolerance for `exp`, `nbf` and `iat`.
    pub jwt_clock_skew_seconds: i64,

    pub jwks_cache_ttl_seconds: u64,

    /// 0 disables the result cache.
    pub token_cache_ttl_seconds: u64,

    pub token_cache_max_entries: usize,

    pub idp_timeout_seconds: u64,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Seconds to keep serving after a shutdown signal; 0 skips the drain.
    pub drain_seconds: u64,
}

/// Custom Debug implementation that redacts credentials.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("xsuaa_url", &self.xsuaa_url)
            .field("uaa_domain", &self.uaa_domain)
            .field("cert_url", &self.cert_url)
            .field("client_identity", &self.client_identity)
            .field("xsappname", &self.xsappname)
            .field("auth_methods", &self.auth_methods)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("jwks_cache_ttl_seconds", &self.jwks_cache_ttl_seconds)
            .field("token_cache_ttl_seconds", &self.token_cache_ttl_seconds)
            .field("token_cache_max_entries", &self.token_cache_max_entries)
            .field("idp_timeout_seconds", &self.idp_timeout_seconds)
            .field("bind_address", &self.bind_address)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid client identity: {0}")]
    InvalidClientIdentity(String),

    #[error("Invalid authentication methods: {0}")]
    InvalidAuthMethods(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid cache configuration: {0}")]
    InvalidCacheSetting(String),

    #[error("Invalid timeout configuration: {0}")]
    InvalidTimeout(String),
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional(vars: &HashMap<String, String>, name: &str) -> Option<String> {
    vars.get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse an unsigned integer, rejecting zero unless `allow_zero`.
fn parse_u64(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    allow_zero: bool,
    error: fn(String) -> ConfigError,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.trim().parse().map_err(|e| {
        error(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 && !allow_zero {
        return Err(error(format!("{} must be greater than 0", name)));
    }

    Ok(value)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let xsuaa_url = required(vars, "XSUAA_URL")?
            .trim_end_matches('/')
            .to_string();
        let client_id = required(vars, "XSUAA_CLIENTID")?;
        let xsappname = required(vars, "XSUAA_XSAPPNAME")?;
        let uaa_domain = optional(vars, "XSUAA_UAADOMAIN");
        let cert_url = optional(vars, "XSUAA_CERTURL").map(|u| u.trim_end_matches('/').to_string());

        let client_identity = match (
            optional(vars, "XSUAA_CLIENTSECRET"),
            optional(vars, "XSUAA_CERTIFICATE"),
            optional(vars, "XSUAA_KEY"),
        ) {
            (Some(secret), None, None) => ClientIdentity::with_secret(client_id, secret),
            (None, Some(certificate), Some(key)) => {
                if cert_url.is_none() {
                    return Err(ConfigError::InvalidClientIdentity(
                        "XSUAA_CERTURL is required with a certificate credential".to_string(),
                    ));
                }
                ClientIdentity::with_certificate(client_id, certificate, key)
            }
            (None, None, None) => {
                return Err(ConfigError::InvalidClientIdentity(
                    "either XSUAA_CLIENTSECRET or XSUAA_CERTIFICATE and XSUAA_KEY must be set"
                        .to_string(),
                ))
            }
            (None, _, _) => {
                return Err(ConfigError::InvalidClientIdentity(
                    "XSUAA_CERTIFICATE and XSUAA_KEY must be set together".to_string(),
                ))
            }
            (Some(_), _, _) => {
                return Err(ConfigError::InvalidClientIdentity(
                    "XSUAA_CLIENTSECRET cannot be combined with a certificate credential"
                        .to_string(),
                ))
            }
        };

        if !client_identity.is_valid() {
            return Err(ConfigError::InvalidClientIdentity(
                "credential is empty or not PEM encoded".to_string(),
            ));
        }

        let auth_methods = match vars.get("AUTH_METHODS") {
            Some(value) => {
                let methods = parse_method_list(value)
                    .map_err(|e| ConfigError::InvalidAuthMethods(e.to_string()))?;
                if methods.is_empty() {
                    return Err(ConfigError::InvalidAuthMethods(
                        "AUTH_METHODS must name at least one method".to_string(),
                    ));
                }
                methods
            }
            None => vec![AuthenticationMethod::OAuth2],
        };

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.trim().parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            let max = i64::try_from(MAX_CLOCK_SKEW.as_secs()).unwrap_or(i64::MAX);
            if value > max {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    max, value
                )));
            }

            value
        } else {
            i64::try_from(DEFAULT_CLOCK_SKEW.as_secs()).unwrap_or(60)
        };

        let jwks_cache_ttl_seconds = parse_u64(
            vars,
            "JWKS_CACHE_TTL_SECONDS",
            DEFAULT_JWKS_CACHE_TTL_SECONDS,
            false,
            ConfigError::InvalidCacheSetting,
        )?;

        let token_cache_ttl_seconds = parse_u64(
            vars,
            "TOKEN_CACHE_TTL_SECONDS",
            DEFAULT_TOKEN_CACHE_TTL_SECONDS,
            true,
            ConfigError::InvalidCacheSetting,
        )?;

        let token_cache_max_entries = parse_u64(
            vars,
            "TOKEN_CACHE_MAX_ENTRIES",
            DEFAULT_TOKEN_CACHE_MAX_ENTRIES as u64,
            false,
            ConfigError::InvalidCacheSetting,
        )?;
        let token_cache_max_entries = usize::try_from(token_cache_max_entries).map_err(|_| {
            ConfigError::InvalidCacheSetting("TOKEN_CACHE_MAX_ENTRIES is too large".to_string())
        })?;

        let idp_timeout_seconds = parse_u64(
            vars,
            "IDP_TIMEOUT_SECONDS",
            DEFAULT_IDP_TIMEOUT_SECONDS,
            false,
            ConfigError::InvalidTimeout,
        )?;

        let drain_seconds = parse_u64(
            vars,
            "BROKER_DRAIN_SECONDS",
            DEFAULT_DRAIN_SECONDS,
            true,
            ConfigError::InvalidTimeout,
        )?;
        if drain_seconds > MAX_DRAIN_SECONDS {
            return Err(ConfigError::InvalidTimeout(format!(
                "BROKER_DRAIN_SECONDS must not exceed {} seconds, got {}",
                MAX_DRAIN_SECONDS, drain_seconds
            )));
        }

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        Ok(Config {
            xsuaa_url,
            uaa_domain,
            cert_url,
            client_identity,
            xsappname,
            auth_methods,
            jwt_clock_skew_seconds,
            jwks_cache_ttl_seconds,
            token_cache_ttl_seconds,
            token_cache_max_entries,
            idp_timeout_seconds,
            bind_address,
            drain_seconds,
        })
    }

    pub fn client_id(&self) -> &str {
        self.client_identity.id()
    }

    /// `token_keys` endpoint of the configured XSUAA.
    pub fn jwks_url(&self) -> String {
        format!("{}/token_keys", self.xsuaa_url)
    }
}
