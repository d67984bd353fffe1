//! HTTP request handlers for the broker's demo server.

pub mod health;
pub mod metrics;
pub mod user;

pub use health::health_check;
pub use metrics::metrics_handler;
pub use user::get_user;
