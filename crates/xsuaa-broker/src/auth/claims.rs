//! XSUAA access token claims and the verified identity built from them.
//!
//! `sub` and `user_name` identify people and are redacted in Debug output.

use crate::auth::method::AuthenticationMethod;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Grant type XSUAA puts into client credentials tokens.
pub const GRANT_TYPE_CLIENT_CREDENTIALS: &str = "client_credentials";

/// Typed view of the XSUAA claims the broker relies on.
#[derive(Clone, Serialize, Deserialize)]
pub struct XsuaaClaims {
    /// Subject: user GUID or, for client tokens, the client id.
    pub sub: String,

    pub iss: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Audiences; XSUAA sends a string or an array.
    #[serde(default, deserialize_with = "one_or_many")]
    pub aud: Vec<String>,

    /// Granted scopes; an array in XSUAA tokens, a space-separated string elsewhere.
    #[serde(default, deserialize_with = "scope_list")]
    pub scope: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Older spelling of `client_id`; XSUAA usually sends both.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    /// Identity provider origin of the user (e.g. `useridp`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    /// Zone (tenant) id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext_attr: Option<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
        None => Vec::new(),
    })
}

fn scope_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(value)) => value.split_whitespace().map(str::to_string).collect(),
        Some(OneOrMany::Many(values)) => values,
        None => Vec::new(),
    })
}

impl fmt::Debug for XsuaaClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XsuaaClaims")
            .field("sub", &"[REDACTED]")
            .field("iss", &self.iss)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("nbf", &self.nbf)
            .field("aud", &self.aud)
            .field("scope", &self.scope)
            .field("client_id", &self.client_id())
            .field("user_name", &self.user_name.as_ref().map(|_| "[REDACTED]"))
            .field("origin", &self.origin)
            .field("zid", &self.zid)
            .field("grant_type", &self.grant_type)
            .finish_non_exhaustive()
    }
}

impl XsuaaClaims {
    /// `client_id`, falling back to `cid`.
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref().or(self.cid.as_deref())
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.iter().any(|s| s == scope)
    }

    pub fn is_client_credentials(&self) -> bool {
        self.grant_type.as_deref() == Some(GRANT_TYPE_CLIENT_CREDENTIALS)
    }

    /// Audiences to check: explicit `aud`, or the application prefixes of the
    /// scopes (`java-hello-world.Display` yields `java-hello-world`) when `aud`
    /// is absent.
    pub fn effective_audiences(&self) -> Vec<&str> {
        if !self.aud.is_empty() {
            return self.aud.iter().map(String::as_str).collect();
        }

        let mut audiences: Vec<&str> = Vec::new();
        for scope in &self.scope {
            if let Some((app, _)) = scope.split_once('.') {
                if !app.is_empty() && !audiences.contains(&app) {
                    audiences.push(app);
                }
            }
        }
        audiences
    }
}

/// A principal whose credential has been verified.
///
/// Immutable. Cheap to clone: the raw claim map is shared.
#[derive(Clone)]
pub struct VerifiedIdentity {
    claims: XsuaaClaims,
    raw_claims: Arc<Map<String, Value>>,
    method: AuthenticationMethod,
}

impl VerifiedIdentity {
    pub fn new(
        claims: XsuaaClaims,
        raw_claims: Map<String, Value>,
        method: AuthenticationMethod,
    ) -> Self {
        Self {
            claims,
            raw_claims: Arc::new(raw_claims),
            method,
        }
    }

    pub fn subject(&self) -> &str {
        &self.claims.sub
    }

    pub fn client_id(&self) -> Option<&str> {
        self.claims.client_id()
    }

    pub fn issuer(&self) -> &str {
        &self.claims.iss
    }

    /// Token expiry, Unix epoch seconds (UTC).
    pub fn expires_at(&self) -> i64 {
        self.claims.exp
    }

    pub fn method(&self) -> AuthenticationMethod {
        self.method
    }

    pub fn scopes(&self) -> &[String] {
        &self.claims.scope
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.claims.has_scope(scope)
    }

    pub fn zone_id(&self) -> Option<&str> {
        self.claims.zid.as_deref()
    }

    pub fn claims(&self) -> &XsuaaClaims {
        &self.claims
    }

    /// Every claim of the token, including ones the typed view ignores.
    pub fn raw_claims(&self) -> &Map<String, Value> {
        &self.raw_claims
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.raw_claims.get(name)
    }

    /// XSUAA principal name.
    ///
    /// `client/<client_id>` for client credentials tokens and tokens without
    /// a user, otherwise `user/<origin>/<user_name>`.
    pub fn principal_name(&self) -> String {
        let client_principal = || {
            format!(
                "client/{}",
                self.claims.client_id().unwrap_or(&self.claims.sub)
            )
        };

        if self.claims.is_client_credentials() {
            return client_principal();
        }

        match (&self.claims.origin, &self.claims.user_name) {
            (Some(origin), Some(user_name)) => format!("user/{}/{}", origin, user_name),
            (None, Some(user_name)) => format!("user/{}", user_name),
            (_, None) => client_principal(),
        }
    }
}

impl fmt::Debug for VerifiedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifiedIdentity")
            .field("method", &self.method)
            .field("claims", &self.claims)
            .finish_non_exhaustive()
    }
}
