//! Builders for XSUAA-shaped access tokens.
//!
//! Defaults describe a password-grant token for the test user, issued to the
//! service under test and valid for an hour.

use crate::crypto_fixtures::{RsaTestKey, TestKeypair};
use crate::test_ids::*;
use chrono::Utc;
use serde_json::{json, Map, Value};

/// Fluent builder for access token claims.
#[derive(Debug, Clone)]
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// User token for [`TEST_USER_NAME`] issued by `issuer`.
    pub fn new(issuer: &str) -> Self {
        let now = Utc::now().timestamp();
        let claims = json!({
            "jti": "2a8c4b2e1f6d4e7a9b3c5d7e9f1a2b3c",
            "sub": TEST_USER_ID,
            "iss": issuer,
            "iat": now,
            "exp": now + 3600,
            "client_id": TEST_CLIENT_ID,
            "cid": TEST_CLIENT_ID,
            "azp": TEST_CLIENT_ID,
            "aud": [TEST_CLIENT_ID, TEST_XSAPPNAME, "openid"],
            "scope": [format!("{}.Display", TEST_XSAPPNAME), "openid"],
            "grant_type": "password",
            "user_name": TEST_USER_NAME,
            "origin": TEST_ORIGIN,
            "zid": TEST_ZONE_ID,
            "ext_attr": { "enhancer": "XSUAA" }
        });

        Self {
            claims: claims.as_object().cloned().unwrap_or_default(),
        }
    }

    /// Client credentials token for `client_id`: no user claims.
    pub fn client_credentials(mut self, client_id: &str) -> Self {
        self.claims.remove("user_name");
        self.claims.remove("origin");
        self.set("sub", client_id)
            .set("client_id", client_id)
            .set("cid", client_id)
            .set("azp", client_id)
            .set("grant_type", "client_credentials")
    }

    pub fn subject(self, sub: &str) -> Self {
        self.set("sub", sub)
    }

    pub fn issuer(self, iss: &str) -> Self {
        self.set("iss", iss)
    }

    /// Sets both `client_id` and `cid`.
    pub fn client_id(self, client_id: &str) -> Self {
        self.set("client_id", client_id).set("cid", client_id)
    }

    pub fn user(self, user_name: &str, origin: &str) -> Self {
        self.set("user_name", user_name).set("origin", origin)
    }

    pub fn scopes(self, scopes: &[&str]) -> Self {
        self.set("scope", json!(scopes))
    }

    pub fn audiences(self, audiences: &[&str]) -> Self {
        self.set("aud", json!(audiences))
    }

    /// `exp` relative to now; negative values produce an expired token.
    pub fn expires_in(self, seconds: i64) -> Self {
        self.set("exp", Utc::now().timestamp() + seconds)
    }

    /// Expired an hour ago, issued two hours ago.
    pub fn expired(self) -> Self {
        let now = Utc::now().timestamp();
        self.set("iat", now - 7200).set("exp", now - 3600)
    }

    /// `nbf` relative to now.
    pub fn not_before_in(self, seconds: i64) -> Self {
        self.set("nbf", Utc::now().timestamp() + seconds)
    }

    /// `iat` relative to now.
    pub fn issued_in(self, seconds: i64) -> Self {
        self.set("iat", Utc::now().timestamp() + seconds)
    }

    /// Set any claim.
    pub fn claim(self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value)
    }

    /// Remove a claim.
    pub fn without(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    pub fn claims(&self) -> Value {
        Value::Object(self.claims.clone())
    }

    pub fn sign_rs256(&self, key: &RsaTestKey) -> String {
        key.sign(&self.claims())
    }

    pub fn sign_eddsa(&self, key: &TestKeypair) -> String {
        key.sign(&self.claims())
    }

    fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.claims.insert(name.to_string(), value.into());
        self
    }
}
