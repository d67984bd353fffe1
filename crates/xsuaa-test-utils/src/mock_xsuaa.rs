//! Mock XSUAA identity provider.
//!
//! Serves `GET /token_keys` with an RSA and an Ed25519 key, and
//! `POST /oauth/token` for whichever grants a test mounts. Token requests no
//! mounted grant matches are answered with 401, as XSUAA does for bad
//! credentials.

use crate::crypto_fixtures::{RsaTestKey, TestKeypair};
use crate::test_ids::*;
use crate::token_builders::TestTokenBuilder;
use serde_json::json;
use std::collections::HashMap;
use wiremock::matchers::{basic_auth, method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

const TOKEN_PATH: &str = "/oauth/token";
const TOKEN_KEYS_PATH: &str = "/token_keys";

/// Priority of the catch-all 401; lower numbers match first.
const FALLBACK_PRIORITY: u8 = 10;

pub struct MockXsuaa {
    server: MockServer,
    rsa_key: RsaTestKey,
    ed25519_key: TestKeypair,
}

impl MockXsuaa {
    /// Start a mock with `token_keys` and a rejecting token endpoint.
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let rsa_key = RsaTestKey::new(RSA_KEY_ID);
        let ed25519_key =
            TestKeypair::new(1, ED25519_KEY_ID).expect("Failed to create test keypair");

        Mock::given(method("GET"))
            .and(path(TOKEN_KEYS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": [rsa_key.jwk_json(), ed25519_key.jwk_json()]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "unauthorized",
                "error_description": "Bad credentials"
            })))
            .with_priority(FALLBACK_PRIORITY)
            .mount(&server)
            .await;

        Self {
            server,
            rsa_key,
            ed25519_key,
        }
    }

    /// Base URL, the binding's `url`.
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// `iss` of tokens this mock issues.
    pub fn issuer(&self) -> String {
        format!("{}{}", self.server.uri(), TOKEN_PATH)
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    pub fn rsa_key(&self) -> &RsaTestKey {
        &self.rsa_key
    }

    pub fn ed25519_key(&self) -> &TestKeypair {
        &self.ed25519_key
    }

    /// Builder preset with this mock's issuer.
    pub fn token_builder(&self) -> TestTokenBuilder {
        TestTokenBuilder::new(&self.issuer())
    }

    /// Sign with the RSA key, as XSUAA does.
    pub fn sign(&self, builder: &TestTokenBuilder) -> String {
        builder.sign_rs256(&self.rsa_key)
    }

    /// Valid user token for the service under test.
    pub fn user_token(&self) -> String {
        self.sign(&self.token_builder())
    }

    /// Accept the password grant for `username`/`password` when the service
    /// authenticates with the test client credentials.
    pub async fn mount_password_grant(&self, username: &str, password: &str) {
        let access_token = self.sign(&self.token_builder());

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(basic_auth(TEST_CLIENT_ID, TEST_CLIENT_SECRET))
            .and(form_fields([
                ("grant_type", "password"),
                ("username", username),
                ("password", password),
            ]))
            .respond_with(token_response(&access_token))
            .mount(&self.server)
            .await;
    }

    /// Accept the client credentials grant for `client_id`/`client_secret`.
    pub async fn mount_client_credentials_grant(&self, client_id: &str, client_secret: &str) {
        self.mount_client_credentials_grant_issuing(
            client_id,
            client_secret,
            self.token_builder().client_credentials(client_id),
        )
        .await;
    }

    /// As `mount_client_credentials_grant` with caller-chosen token claims.
    pub async fn mount_client_credentials_grant_issuing(
        &self,
        client_id: &str,
        client_secret: &str,
        token: TestTokenBuilder,
    ) {
        let access_token = self.sign(&token);

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(basic_auth(client_id, client_secret))
            .and(form_fields([("grant_type", "client_credentials")]))
            .respond_with(token_response(&access_token))
            .mount(&self.server)
            .await;
    }

    /// Answer every token request with 503.
    pub async fn mount_unavailable_token_endpoint(&self) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(503))
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    /// Number of requests received at `/oauth/token`.
    pub async fn token_requests(&self) -> usize {
        self.requests_to(TOKEN_PATH).await
    }

    /// Number of requests received at `/token_keys`.
    pub async fn token_keys_requests(&self) -> usize {
        self.requests_to(TOKEN_KEYS_PATH).await
    }

    async fn requests_to(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == request_path)
            .count()
    }

    /// Environment for `Config::from_vars` bound to this mock.
    pub fn config_vars(&self, auth_methods: &str) -> HashMap<String, String> {
        HashMap::from([
            ("XSUAA_URL".to_string(), self.url()),
            ("XSUAA_CLIENTID".to_string(), TEST_CLIENT_ID.to_string()),
            (
                "XSUAA_CLIENTSECRET".to_string(),
                TEST_CLIENT_SECRET.to_string(),
            ),
            ("XSUAA_XSAPPNAME".to_string(), TEST_XSAPPNAME.to_string()),
            ("AUTH_METHODS".to_string(), auth_methods.to_string()),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ])
    }
}

/// Matches an `application/x-www-form-urlencoded` body in which each named
/// field occurs exactly once with exactly the given value.
pub struct FormFieldsMatcher(Vec<(String, String)>);

/// Build a [`FormFieldsMatcher`].
pub fn form_fields<'a>(fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> FormFieldsMatcher {
    FormFieldsMatcher(
        fields
            .into_iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
    )
}

impl FormFieldsMatcher {
    fn accepts(&self, body: &[u8]) -> bool {
        let form: Vec<(String, String)> = url::form_urlencoded::parse(body).into_owned().collect();

        self.0.iter().all(|(name, expected)| {
            let mut values = form.iter().filter(|(key, _)| key == name);
            matches!(
                (values.next(), values.next()),
                (Some((_, value)), None) if value == expected
            )
        })
    }
}

impl Match for FormFieldsMatcher {
    fn matches(&self, request: &Request) -> bool {
        self.accepts(&request.body)
    }
}

fn token_response(access_token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": 3599,
        "scope": format!("{}.Display openid", TEST_XSAPPNAME),
        "jti": "2a8c4b2e1f6d4e7a9b3c5d7e9f1a2b3c"
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_keys_served() {
        let xsuaa = MockXsuaa::start().await;

        let body: serde_json::Value = reqwest::get(format!("{}/token_keys", xsuaa.url()))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["keys"][0]["kid"], RSA_KEY_ID);
        assert_eq!(body["keys"][1]["kid"], ED25519_KEY_ID);
        assert_eq!(xsuaa.token_keys_requests().await, 1);
    }

    #[tokio::test]
    async fn test_unmounted_grant_is_rejected() {
        let xsuaa = MockXsuaa::start().await;

        let response = reqwest::Client::new()
            .post(format!("{}/oauth/token", xsuaa.url()))
            .basic_auth(TEST_CLIENT_ID, Some(TEST_CLIENT_SECRET))
            .form(&[("grant_type", "password")])
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 401);
        assert_eq!(xsuaa.token_requests().await, 1);
    }

    async fn password_grant_status(xsuaa: &MockXsuaa, username: &str, password: &str) -> u16 {
        reqwest::Client::new()
            .post(format!("{}/oauth/token", xsuaa.url()))
            .basic_auth(TEST_CLIENT_ID, Some(TEST_CLIENT_SECRET))
            .form(&[
                ("grant_type", "password"),
                ("username", username),
                ("password", password),
            ])
            .send()
            .await
            .unwrap()
            .status()
            .as_u16()
    }

    #[tokio::test]
    async fn test_password_grant_matches_fields_exactly() {
        let xsuaa = MockXsuaa::start().await;
        xsuaa.mount_password_grant(TEST_USER, TEST_PASSWORD).await;

        assert_eq!(password_grant_status(&xsuaa, TEST_USER, TEST_PASSWORD).await, 200);

        let padded = format!("{}X", TEST_PASSWORD);
        let truncated = &TEST_PASSWORD[..TEST_PASSWORD.len() - 1];
        let prefixed_user = format!("{}X", TEST_USER);
        for (username, password) in [
            (TEST_USER, padded.as_str()),
            (TEST_USER, truncated),
            (prefixed_user.as_str(), TEST_PASSWORD),
        ] {
            assert_eq!(
                password_grant_status(&xsuaa, username, password).await,
                401,
                "{}:{}",
                username,
                password
            );
        }
    }

    #[test]
    fn test_form_fields_requires_single_exact_value() {
        let matcher = form_fields([("password", "basic.password")]);

        assert!(matcher.accepts(b"grant_type=password&password=basic.password"));
        assert!(matcher.accepts(b"password=basic%2Epassword"));
        assert!(!matcher.accepts(b"password=basic.password&password=other"));
        assert!(!matcher.accepts(b"password=basic.passwordX"));
        assert!(!matcher.accepts(b"grant_type=password"));
    }
}
