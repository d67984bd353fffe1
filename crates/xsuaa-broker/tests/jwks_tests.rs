//! `token_keys` client integration tests.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xsuaa_broker::auth::JwksClient;
use xsuaa_broker::errors::AuthError;
use xsuaa_test_utils::*;

async fn token_keys_server(keys: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/token_keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_keys_are_fetched_once_and_cached() {
    let rsa = RsaTestKey::new(RSA_KEY_ID);
    let server = token_keys_server(json!([rsa.jwk_json()])).await;
    let client = JwksClient::new(format!("{}/token_keys", server.uri()));

    let first = client.get_key(RSA_KEY_ID).await.unwrap();
    let second = client.get_key(RSA_KEY_ID).await.unwrap();

    assert_eq!(first.kty, "RSA");
    assert_eq!(first.n, second.n);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_kid_right_after_fetch_does_not_refetch() {
    let rsa = RsaTestKey::new(RSA_KEY_ID);
    let server = token_keys_server(json!([rsa.jwk_json()])).await;
    let client = JwksClient::new(format!("{}/token_keys", server.uri()));

    client.get_key(RSA_KEY_ID).await.unwrap();
    let err = client.get_key("rotated-key").await.unwrap_err();

    assert!(matches!(err, AuthError::SignatureInvalid(_)));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_expired_cache_is_refreshed() {
    let rsa = RsaTestKey::new(RSA_KEY_ID);
    let server = token_keys_server(json!([rsa.jwk_json()])).await;
    let client = JwksClient::with_ttl(
        format!("{}/token_keys", server.uri()),
        Duration::from_millis(50),
    );

    client.get_key(RSA_KEY_ID).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.get_key(RSA_KEY_ID).await.unwrap();

    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_encryption_keys_are_ignored() {
    let ed = TestKeypair::new(1, ED25519_KEY_ID).unwrap();
    let mut enc = RsaTestKey::new("enc-key").jwk_json();
    enc["use"] = json!("enc");
    let server = token_keys_server(json!([ed.jwk_json(), enc])).await;
    let client = JwksClient::new(format!("{}/token_keys", server.uri()));

    assert!(client.get_key(ED25519_KEY_ID).await.is_ok());
    assert!(matches!(
        client.get_key("enc-key").await,
        Err(AuthError::SignatureInvalid(_))
    ));
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/token_keys"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let client = JwksClient::new(format!("{}/token_keys", server.uri()));

    let err = client.get_key(RSA_KEY_ID).await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_unparsable_response_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/token_keys"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;
    let client = JwksClient::new(format!("{}/token_keys", server.uri()));

    let err = client.get_key(RSA_KEY_ID).await.unwrap_err();
    assert!(matches!(err, AuthError::IdpUnreachable(_)));
}

#[tokio::test]
async fn test_force_refresh_picks_up_rotated_key() {
    let server = MockServer::start().await;
    let old = RsaTestKey::new("old-key");
    let new = TestKeypair::new(3, "new-key").unwrap();

    Mock::given(method("GET"))
        .and(path("/token_keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "keys": [old.jwk_json()] })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/token_keys"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "keys": [old.jwk_json(), new.jwk_json()] })),
        )
        .mount(&server)
        .await;

    let client = JwksClient::new(format!("{}/token_keys", server.uri()));
    client.get_key("old-key").await.unwrap();
    assert!(client.get_key("new-key").await.is_err());

    client.force_refresh().await.unwrap();
    assert!(client.get_key("new-key").await.is_ok());
}
