//! XSUAA token endpoint client integration tests.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use common::secret::{ExposeSecret, SecretString};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{basic_auth, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xsuaa_broker::errors::AuthError;
use xsuaa_broker::identity::ClientIdentity;
use xsuaa_broker::services::{IdpClient, TokenExchange};
use xsuaa_test_utils::*;

fn secret_identity() -> ClientIdentity {
    ClientIdentity::with_secret(TEST_CLIENT_ID, TEST_CLIENT_SECRET)
}

fn client(server: &MockServer) -> IdpClient {
    IdpClient::new(
        &server.uri(),
        None,
        &secret_identity(),
        Duration::from_secs(2),
    )
    .unwrap()
}

fn token_body() -> serde_json::Value {
    json!({"access_token": "issued.jwt.token", "token_type": "bearer", "expires_in": 3599})
}

#[tokio::test]
async fn test_password_grant_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(basic_auth(TEST_CLIENT_ID, TEST_CLIENT_SECRET))
        .and(form_fields([
            ("grant_type", "password"),
            ("username", TEST_USER),
            ("password", TEST_PASSWORD),
            ("response_type", "token"),
        ]))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(1)
        .mount(&server)
        .await;

    let token = client(&server)
        .password_grant(
            &secret_identity(),
            TEST_USER,
            &SecretString::from(TEST_PASSWORD),
        )
        .await
        .unwrap();

    assert_eq!(token.access_token.expose_secret(), "issued.jwt.token");
    assert_eq!(token.expires_in, Some(3599));
}

#[tokio::test]
async fn test_client_credentials_grant_uses_presented_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(basic_auth(TEST_CLIENT_ID, "presented.secret"))
        .and(form_fields([("grant_type", "client_credentials")]))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .client_credentials_grant(TEST_CLIENT_ID, &SecretString::from("presented.secret"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_status_mapping() {
    let cases = [
        (400, false),
        (401, false),
        (403, false),
        (408, true),
        (429, true),
        (500, true),
        (503, true),
    ];

    for (status, transient) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_json(json!({"error": "invalid_grant", "error_description": "x"})),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .password_grant(&secret_identity(), TEST_USER, &SecretString::from("p"))
            .await
            .unwrap_err();

        if transient {
            assert!(matches!(err, AuthError::IdpUnreachable(_)), "{}: {:?}", status, err);
        } else {
            assert!(matches!(err, AuthError::InvalidCredentials(_)), "{}: {:?}", status, err);
        }
    }
}

#[tokio::test]
async fn test_unparsable_success_body_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server)
        .client_credentials_grant(TEST_CLIENT_ID, &SecretString::from(TEST_CLIENT_SECRET))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::IdpUnreachable(_)));
}

#[tokio::test]
async fn test_slow_endpoint_times_out_as_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body())
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = IdpClient::new(
        &server.uri(),
        None,
        &secret_identity(),
        Duration::from_millis(200),
    )
    .unwrap();

    let err = client
        .password_grant(&secret_identity(), TEST_USER, &SecretString::from(TEST_PASSWORD))
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_certificate_identity_password_grant_goes_to_cert_url() {
    let identity = ClientIdentity::with_certificate(
        TEST_CLIENT_ID,
        CLIENT_CERTIFICATE_PEM,
        CLIENT_KEY_PEM,
    );
    assert!(identity.is_valid());

    let xsuaa_server = MockServer::start().await;
    let cert_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(form_fields([
            ("grant_type", "password"),
            ("username", TEST_USER),
            ("password", TEST_PASSWORD),
            ("client_id", TEST_CLIENT_ID),
        ]))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(1)
        .mount(&cert_server)
        .await;

    let client = IdpClient::new(
        &xsuaa_server.uri(),
        Some(&cert_server.uri()),
        &identity,
        Duration::from_secs(2),
    )
    .unwrap();
    assert_eq!(
        client.token_url(),
        format!("{}/oauth/token", xsuaa_server.uri())
    );

    let token = client
        .password_grant(&identity, TEST_USER, &SecretString::from(TEST_PASSWORD))
        .await
        .unwrap();
    assert_eq!(token.access_token.expose_secret(), "issued.jwt.token");

    let requests = cert_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = requests.first().unwrap();
    assert!(!request.headers.contains_key("authorization"));
    assert!(xsuaa_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_certificate_identity_without_cert_url_is_internal() {
    let identity = ClientIdentity::with_certificate(
        TEST_CLIENT_ID,
        CLIENT_CERTIFICATE_PEM,
        CLIENT_KEY_PEM,
    );
    let client = IdpClient::new(
        "https://xsuaa.example.com",
        None,
        &identity,
        Duration::from_secs(1),
    )
    .unwrap();

    let err = client
        .password_grant(&identity, TEST_USER, &SecretString::from(TEST_PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Internal(_)));
}
