//! Observability: metrics recorded by the broker.

pub mod metrics;
