//! Outbound services.
//!
//! - `idp_client` - XSUAA token endpoint client and the `TokenExchange` seam

pub mod idp_client;

pub use idp_client::mock::MockTokenExchange;
pub use idp_client::{AccessToken, IdpClient, TokenExchange};
