//! XSUAA Token Broker Library
//!
//! Validates inbound credentials against an XSUAA identity provider and
//! turns them into a [`auth::VerifiedIdentity`]:
//!
//! - `Bearer` access tokens, verified against the IdP's `token_keys`
//! - `Basic` end-user credentials, exchanged via the password grant
//! - `Basic` client credentials of this service, exchanged via the client
//!   credentials grant
//!
//! # Architecture
//!
//! ```text
//! middleware::require_auth -> broker::TokenBroker
//!     -> auth::resolve (header -> ordered attempts)
//!     -> auth::CredentialValidators -> services::IdpClient / auth::JwtValidator
//! ```
//!
//! # Modules
//!
//! - `auth` - methods, resolution, validation strategies, JWT/JWKS
//! - `broker` - the token broker and its result cache
//! - `config` - configuration from environment
//! - `errors` - error taxonomy with HTTP status mapping
//! - `identity` - this service's client identity
//! - `services` - XSUAA token endpoint client
//! - `handlers`, `middleware`, `routes` - the HTTP boundary

pub mod auth;
pub mod broker;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod services;
