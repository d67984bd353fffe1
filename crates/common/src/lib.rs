//! Common utilities shared across the XSUAA broker crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (size limits, header inspection, clock skew)
pub mod jwt;
