//! Per-request selection of acceptable authentication methods.
//!
//! The broker asks an [`AuthenticationInformationExtractor`] which methods a
//! request may use. The extractor is part of the swappable authentication
//! configuration (see `TokenBroker::set_authentication_config`).

use crate::auth::method::AuthenticationMethod;
use axum::http::{header, HeaderMap};
use std::fmt;

/// The parts of an inbound request the broker looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestInfo<'a> {
    path: &'a str,
    headers: &'a HeaderMap,
}

impl<'a> RequestInfo<'a> {
    pub fn new(path: &'a str, headers: &'a HeaderMap) -> Self {
        Self { path, headers }
    }

    pub fn path(&self) -> &'a str {
        self.path
    }

    pub fn headers(&self) -> &'a HeaderMap {
        self.headers
    }

    /// The `Authorization` header value.
    ///
    /// A header with non-visible-ASCII bytes is returned as an empty string so
    /// that it is reported as malformed rather than missing.
    pub fn authorization(&self) -> Option<&'a str> {
        self.headers
            .get(header::AUTHORIZATION)
            .map(|value| value.to_str().unwrap_or_default())
    }
}

/// Decides which authentication methods apply to a request, in priority order.
pub trait AuthenticationInformationExtractor: Send + Sync + fmt::Debug {
    fn authentication_methods<'s>(&'s self, request: &RequestInfo<'_>)
        -> &'s [AuthenticationMethod];
}

/// Same ordered method list for every request.
#[derive(Debug, Clone)]
pub struct DefaultAuthenticationInformationExtractor {
    methods: Vec<AuthenticationMethod>,
}

impl DefaultAuthenticationInformationExtractor {
    pub fn new(methods: impl Into<Vec<AuthenticationMethod>>) -> Self {
        Self {
            methods: methods.into(),
        }
    }
}

impl Default for DefaultAuthenticationInformationExtractor {
    /// Bearer tokens only.
    fn default() -> Self {
        Self::new(vec![AuthenticationMethod::OAuth2])
    }
}

impl AuthenticationInformationExtractor for DefaultAuthenticationInformationExtractor {
    fn authentication_methods<'s>(
        &'s self,
        _request: &RequestInfo<'_>,
    ) -> &'s [AuthenticationMethod] {
        &self.methods
    }
}

/// Method lists chosen by the longest matching path prefix.
///
/// Prefixes match on segment boundaries: `/api` matches `/api` and `/api/x`
/// but not `/apix`.
#[derive(Debug, Clone)]
pub struct PathAuthenticationInformationExtractor {
    rules: Vec<(String, Vec<AuthenticationMethod>)>,
    default_methods: Vec<AuthenticationMethod>,
}

impl PathAuthenticationInformationExtractor {
    pub fn new(default_methods: impl Into<Vec<AuthenticationMethod>>) -> Self {
        Self {
            rules: Vec::new(),
            default_methods: default_methods.into(),
        }
    }

    /// Add a rule. A later rule for the same prefix replaces the earlier one.
    #[must_use]
    pub fn with_rule(
        mut self,
        prefix: impl Into<String>,
        methods: impl Into<Vec<AuthenticationMethod>>,
    ) -> Self {
        let prefix = normalize_prefix(prefix.into());
        let methods = methods.into();
        match self.rules.iter_mut().find(|(p, _)| *p == prefix) {
            Some(rule) => rule.1 = methods,
            None => self.rules.push((prefix, methods)),
        }
        self
    }
}

fn normalize_prefix(prefix: String) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

impl AuthenticationInformationExtractor for PathAuthenticationInformationExtractor {
    fn authentication_methods<'s>(
        &'s self,
        request: &RequestInfo<'_>,
    ) -> &'s [AuthenticationMethod] {
        self.rules
            .iter()
            .filter(|(prefix, _)| prefix_matches(prefix, request.path()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map_or(&self.default_methods, |(_, methods)| methods)
    }
}
