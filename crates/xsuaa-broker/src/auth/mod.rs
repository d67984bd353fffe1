//! Authentication: method selection, credential resolution and validation.
//!
//! - `method` - authentication methods and list parsing
//! - `extractor` - per-request acceptable methods
//! - `resolver` - `Authorization` header to ordered attempts
//! - `validators` - one validation strategy per method
//! - `jwt`, `jwks`, `audience` - XSUAA access token validation
//! - `claims` - token claims and the verified identity

pub mod audience;
pub mod claims;
pub mod extractor;
pub mod jwks;
pub mod jwt;
pub mod method;
pub mod resolver;
pub mod validators;

pub use claims::{VerifiedIdentity, XsuaaClaims};
pub use extractor::{
    AuthenticationInformationExtractor, DefaultAuthenticationInformationExtractor,
    PathAuthenticationInformationExtractor, RequestInfo,
};
pub use jwks::JwksClient;
pub use jwt::JwtValidator;
pub use method::AuthenticationMethod;
pub use resolver::{resolve, RawCredential, ResolvedAttempt};
pub use validators::CredentialValidators;
