//! HTTP middleware for the broker.
//!
//! - `auth` - runs the token broker in front of protected routes
//! - `http_metrics` - records every HTTP response

pub mod auth;
pub mod http_metrics;

pub use auth::{require_auth, AuthState};
pub use http_metrics::http_metrics_middleware;
