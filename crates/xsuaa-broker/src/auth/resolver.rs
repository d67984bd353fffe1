//! Authentication method resolution.
//!
//! Maps the `Authorization` header and the acceptable methods for a request
//! to the ordered attempts the broker will run. Pure: no I/O and no logging of
//! credential material.
//!
//! # Basic header disambiguation
//!
//! A Basic header can carry end-user credentials (password grant) or this
//! service's own client id and secret (client credentials grant). When both
//! methods are acceptable the decoded username decides: the service's own
//! client id selects `ClientCredentials`, anything else selects `Basic`. When
//! only one of the two is acceptable it is used as is, and `ClientCredentials`
//! then rejects a foreign client id without contacting the IdP.

use crate::auth::method::AuthenticationMethod;
use crate::errors::AuthError;
use base64::{engine::general_purpose::STANDARD, Engine};
use common::secret::SecretString;

/// Credential material taken from the `Authorization` header.
#[derive(Debug, Clone)]
pub enum RawCredential {
    Bearer(SecretString),
    UsernamePassword {
        username: String,
        password: SecretString,
    },
}

/// One method to try with the credential it consumes.
#[derive(Debug, Clone)]
pub struct ResolvedAttempt {
    pub method: AuthenticationMethod,
    pub credential: RawCredential,
}

enum Scheme<'a> {
    Bearer(&'a str),
    Basic(&'a str),
    Other(&'a str),
}

fn split_scheme(header: &str) -> Result<Scheme<'_>, AuthError> {
    let header = header.trim();
    let (scheme, value) = match header.split_once(char::is_whitespace) {
        Some((scheme, value)) => (scheme, value.trim()),
        None => (header, ""),
    };

    if scheme.is_empty() {
        return Err(AuthError::MalformedCredential(
            "empty Authorization header".to_string(),
        ));
    }

    if scheme.eq_ignore_ascii_case("bearer") {
        Ok(Scheme::Bearer(value))
    } else if scheme.eq_ignore_ascii_case("basic") {
        Ok(Scheme::Basic(value))
    } else {
        Ok(Scheme::Other(scheme))
    }
}

fn decode_basic(value: &str) -> Result<(String, SecretString), AuthError> {
    let bytes = STANDARD
        .decode(value)
        .map_err(|_| AuthError::MalformedCredential("Basic payload is not base64".to_string()))?;

    let decoded = String::from_utf8(bytes)
        .map_err(|_| AuthError::MalformedCredential("Basic payload is not UTF-8".to_string()))?;

    let (username, password) = decoded.split_once(':').ok_or_else(|| {
        AuthError::MalformedCredential("Basic payload lacks ':' separator".to_string())
    })?;

    if username.is_empty() {
        return Err(AuthError::MalformedCredential(
            "Basic payload has an empty username".to_string(),
        ));
    }

    Ok((username.to_string(), SecretString::from(password)))
}

/// Resolve the ordered attempts for a request.
///
/// # Errors
///
/// - `MissingCredential` if there is no `Authorization` header
/// - `UnsupportedScheme` if the scheme matches none of `methods`
/// - `MalformedCredential` if the header value cannot be parsed
pub fn resolve(
    authorization: Option<&str>,
    methods: &[AuthenticationMethod],
    own_client_id: &str,
) -> Result<Vec<ResolvedAttempt>, AuthError> {
    let header = authorization.ok_or(AuthError::MissingCredential)?;

    match split_scheme(header)? {
        Scheme::Bearer(token) => {
            if !methods.contains(&AuthenticationMethod::OAuth2) {
                return Err(AuthError::UnsupportedScheme("Bearer".to_string()));
            }
            if token.is_empty() {
                return Err(AuthError::MalformedCredential(
                    "empty bearer token".to_string(),
                ));
            }
            Ok(vec![ResolvedAttempt {
                method: AuthenticationMethod::OAuth2,
                credential: RawCredential::Bearer(SecretString::from(token)),
            }])
        }
        Scheme::Basic(value) => {
            if !methods.iter().any(AuthenticationMethod::uses_basic_scheme) {
                return Err(AuthError::UnsupportedScheme("Basic".to_string()));
            }
            let (username, password) = decode_basic(value)?;
            let method = select_basic_method(methods, username == own_client_id);
            Ok(vec![ResolvedAttempt {
                method,
                credential: RawCredential::UsernamePassword { username, password },
            }])
        }
        Scheme::Other(scheme) => Err(AuthError::UnsupportedScheme(scheme.to_string())),
    }
}

/// Caller guarantees at least one Basic-scheme method is present.
fn select_basic_method(
    methods: &[AuthenticationMethod],
    is_own_client_id: bool,
) -> AuthenticationMethod {
    let basic = methods.contains(&AuthenticationMethod::Basic);
    let client_credentials = methods.contains(&AuthenticationMethod::ClientCredentials);

    match (basic, client_credentials) {
        (true, true) if is_own_client_id => AuthenticationMethod::ClientCredentials,
        (true, _) => AuthenticationMethod::Basic,
        _ => AuthenticationMethod::ClientCredentials,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;
    use AuthenticationMethod::{Basic, ClientCredentials, OAuth2};

    const CLIENT_ID: &str = "sb-java-hello-world";

    fn basic_header(user: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
    }

    #[test]
    fn test_bearer_resolves_to_oauth2() {
        let attempts = resolve(Some("Bearer abc.def.ghi"), &[OAuth2], CLIENT_ID).unwrap();

        assert_eq!(attempts.len(), 1);
        let attempt = attempts.first().unwrap();
        assert_eq!(attempt.method, OAuth2);
        match &attempt.credential {
            RawCredential::Bearer(token) => assert_eq!(token.expose_secret(), "abc.def.ghi"),
            other => panic!("unexpected credential {:?}", other),
        }
    }

    #[test]
    fn test_scheme_is_case_insensitive_and_trimmed() {
        let attempts = resolve(Some("  bEaReR   abc.def.ghi  "), &[OAuth2], CLIENT_ID).unwrap();
        match &attempts.first().unwrap().credential {
            RawCredential::Bearer(token) => assert_eq!(token.expose_secret(), "abc.def.ghi"),
            other => panic!("unexpected credential {:?}", other),
        }

        let header = basic_header("basic.user", "basic.password").replace("Basic", "BASIC");
        let attempts = resolve(Some(&header), &[Basic], CLIENT_ID).unwrap();
        assert_eq!(attempts.first().unwrap().method, Basic);
    }

    #[test]
    fn test_missing_header() {
        let err = resolve(None, &[OAuth2], CLIENT_ID).unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential));
    }

    #[test]
    fn test_bearer_without_oauth2_is_unsupported() {
        let err = resolve(Some("Bearer abc"), &[Basic, ClientCredentials], CLIENT_ID).unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedScheme(s) if s == "Bearer"));
    }

    #[test]
    fn test_basic_with_oauth2_only_is_unsupported() {
        let header = basic_header("basic.user", "basic.password");
        let err = resolve(Some(&header), &[OAuth2], CLIENT_ID).unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedScheme(s) if s == "Basic"));
    }

    #[test]
    fn test_unknown_scheme_is_unsupported() {
        let err = resolve(Some("Digest username=\"x\""), &[OAuth2, Basic], CLIENT_ID).unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedScheme(s) if s == "Digest"));
    }

    #[test]
    fn test_empty_bearer_is_malformed() {
        let err = resolve(Some("Bearer"), &[OAuth2], CLIENT_ID).unwrap_err();
        assert!(matches!(err, AuthError::MalformedCredential(_)));

        let err = resolve(Some("Bearer    "), &[OAuth2], CLIENT_ID).unwrap_err();
        assert!(matches!(err, AuthError::MalformedCredential(_)));
    }

    #[test]
    fn test_empty_header_is_malformed() {
        let err = resolve(Some("   "), &[OAuth2], CLIENT_ID).unwrap_err();
        assert!(matches!(err, AuthError::MalformedCredential(_)));
    }

    #[test]
    fn test_malformed_basic_payloads() {
        let not_base64 = "Basic !!!not-base64!!!";
        let not_utf8 = format!("Basic {}", STANDARD.encode([0xff, 0xfe, b':', b'x']));
        let no_separator = format!("Basic {}", STANDARD.encode("useronly"));
        let empty_user = format!("Basic {}", STANDARD.encode(":password"));

        for header in [not_base64.to_string(), not_utf8, no_separator, empty_user] {
            let err = resolve(Some(&header), &[Basic], CLIENT_ID).unwrap_err();
            assert!(
                matches!(err, AuthError::MalformedCredential(_)),
                "expected MalformedCredential for {header}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_basic_password_may_contain_colons() {
        let header = basic_header("basic.user", "pa:ss:word");
        let attempts = resolve(Some(&header), &[Basic], CLIENT_ID).unwrap();
        match &attempts.first().unwrap().credential {
            RawCredential::UsernamePassword { username, password } => {
                assert_eq!(username, "basic.user");
                assert_eq!(password.expose_secret(), "pa:ss:word");
            }
            other => panic!("unexpected credential {:?}", other),
        }
    }

    #[test]
    fn test_basic_disambiguation_with_both_methods() {
        let user = basic_header("basic.user", "basic.password");
        let client = basic_header(CLIENT_ID, "basic.clientsecret");

        for methods in [[Basic, ClientCredentials], [ClientCredentials, Basic]] {
            let attempts = resolve(Some(&user), &methods, CLIENT_ID).unwrap();
            assert_eq!(attempts.len(), 1);
            assert_eq!(attempts.first().unwrap().method, Basic);

            let attempts = resolve(Some(&client), &methods, CLIENT_ID).unwrap();
            assert_eq!(attempts.len(), 1);
            assert_eq!(attempts.first().unwrap().method, ClientCredentials);
        }
    }

    #[test]
    fn test_basic_single_method_is_kept() {
        let user = basic_header("basic.user", "basic.password");
        let client = basic_header(CLIENT_ID, "basic.clientsecret");

        let attempts = resolve(Some(&client), &[OAuth2, Basic], CLIENT_ID).unwrap();
        assert_eq!(attempts.first().unwrap().method, Basic);

        // Foreign username still goes to ClientCredentials, which rejects it
        let attempts = resolve(Some(&user), &[OAuth2, ClientCredentials], CLIENT_ID).unwrap();
        assert_eq!(attempts.first().unwrap().method, ClientCredentials);
    }
}
