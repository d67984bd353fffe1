//! Authentication methods a resource may accept.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One way of authenticating an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationMethod {
    /// `Authorization: Bearer <jwt>` issued by XSUAA.
    #[serde(rename = "oauth2")]
    OAuth2,
    /// `Authorization: Basic` with end-user name and password (password grant).
    Basic,
    /// `Authorization: Basic` with a client id and secret (client credentials grant).
    ClientCredentials,
}

impl AuthenticationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthenticationMethod::OAuth2 => "oauth2",
            AuthenticationMethod::Basic => "basic",
            AuthenticationMethod::ClientCredentials => "client_credentials",
        }
    }

    /// Whether this method consumes an `Authorization: Basic` header.
    pub fn uses_basic_scheme(&self) -> bool {
        matches!(
            self,
            AuthenticationMethod::Basic | AuthenticationMethod::ClientCredentials
        )
    }
}

impl fmt::Display for AuthenticationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown authentication method '{0}' (expected oauth2, basic or client_credentials)")]
pub struct ParseMethodError(String);

impl FromStr for AuthenticationMethod {
    type Err = ParseMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oauth2" => Ok(AuthenticationMethod::OAuth2),
            "basic" => Ok(AuthenticationMethod::Basic),
            "client_credentials" | "client-credentials" => {
                Ok(AuthenticationMethod::ClientCredentials)
            }
            _ => Err(ParseMethodError(s.trim().to_string())),
        }
    }
}

/// Parse a comma-separated, ordered method list such as `oauth2,basic`.
///
/// Duplicates keep their first position.
pub fn parse_method_list(value: &str) -> Result<Vec<AuthenticationMethod>, ParseMethodError> {
    let mut methods = Vec::new();
    for part in value.split(',').filter(|p| !p.trim().is_empty()) {
        let method: AuthenticationMethod = part.parse()?;
        if !methods.contains(&method) {
            methods.push(method);
        }
    }
    Ok(methods)
}
