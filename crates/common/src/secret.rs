//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for every credential that passes
//! through the broker: client secrets, Basic-auth passwords, bearer tokens and
//! private keys.
//!
//! `SecretString` implements `Debug` with redaction, so any struct deriving
//! `Debug` that holds one is safe to log. Secrets are zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct BasicCredentials {
//!     username: String,
//!     password: SecretString,
//! }
//!
//! let creds = BasicCredentials {
//!     username: "basic.user".to_string(),
//!     password: SecretString::from("basic.password"),
//! };
//!
//! // Password is redacted in Debug output
//! assert!(!format!("{creds:?}").contains("basic.password"));
//!
//! // Access requires an explicit call
//! let password: &str = creds.password.expose_secret();
//! assert_eq!(password, "basic.password");
//! ```

pub use secrecy::{ExposeSecret, SecretString};
