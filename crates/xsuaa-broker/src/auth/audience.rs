//! Issuer and audience checks for XSUAA tokens.

use crate::auth::claims::XsuaaClaims;
use reqwest::Url;

/// Accepts tokens issued by the configured XSUAA tenant.
///
/// `iss` is trusted when it equals the configured IdP URL (a trailing `/` or
/// `/oauth/token` suffix is ignored), or, with a `uaadomain` configured, when it
/// is an `https` URL whose host is that domain or a subdomain of it.
#[derive(Debug, Clone)]
pub struct IssuerValidator {
    issuer_base: String,
    uaa_domain: Option<String>,
}

impl IssuerValidator {
    pub fn new(xsuaa_url: &str, uaa_domain: Option<&str>) -> Self {
        Self {
            issuer_base: normalize_issuer(xsuaa_url).to_string(),
            uaa_domain: uaa_domain
                .map(|d| d.trim().trim_end_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty()),
        }
    }

    pub fn is_trusted(&self, iss: &str) -> bool {
        if normalize_issuer(iss) == self.issuer_base {
            return true;
        }

        let Some(domain) = &self.uaa_domain else {
            return false;
        };

        let Ok(url) = Url::parse(iss) else {
            return false;
        };

        if url.scheme() != "https" {
            return false;
        }

        match url.host_str() {
            Some(host) => {
                let host = host.to_ascii_lowercase();
                host == *domain
                    || host
                        .strip_suffix(domain.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }
            None => false,
        }
    }
}

fn normalize_issuer(url: &str) -> &str {
    let url = url.trim().trim_end_matches('/');
    url.strip_suffix("/oauth/token").unwrap_or(url)
}

/// Accepts tokens meant for this application.
///
/// A token is accepted when it was requested by this service's own client, or
/// when one of its audiences (explicit `aud`, else derived from scopes) names
/// the client id or the xsappname. Audiences are compared on the part before
/// the first `.`, so `java-hello-world.Display` counts as `java-hello-world`.
#[derive(Debug, Clone)]
pub struct AudienceValidator {
    client_id: String,
    xsappname: String,
}

impl AudienceValidator {
    pub fn new(client_id: impl Into<String>, xsappname: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            xsappname: xsappname.into(),
        }
    }

    pub fn is_accepted(&self, claims: &XsuaaClaims) -> bool {
        if claims.client_id() == Some(self.client_id.as_str()) {
            return true;
        }

        claims.effective_audiences().into_iter().any(|audience| {
            let audience = audience.split('.').next().unwrap_or(audience);
            audience == self.client_id || audience == self.xsappname
        })
    }
}
