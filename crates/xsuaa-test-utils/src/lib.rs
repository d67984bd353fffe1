//! # XSUAA Test Utilities
//!
//! Shared test utilities for the XSUAA token broker.
//!
//! This crate provides:
//! - Deterministic signing keys (`crypto_fixtures`)
//! - XSUAA-shaped token builder (`token_builders`)
//! - A wiremock XSUAA with `token_keys` and `oauth/token` (`mock_xsuaa`)
//! - Server harness for end-to-end tests (`server_harness`)
//! - Fixed identifiers of the test binding (`test_ids`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use xsuaa_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let xsuaa = MockXsuaa::start().await;
//!     let server = TestBrokerServer::spawn(&xsuaa, "oauth2").await?;
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/user", server.url()))
//!         .bearer_auth(xsuaa.user_token())
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_xsuaa;
pub mod server_harness;
pub mod test_ids;
pub mod token_builders;

pub use crypto_fixtures::*;
pub use mock_xsuaa::*;
pub use server_harness::*;
pub use test_ids::*;
pub use token_builders::*;
