// Per-request credentials read from the inbound request.
//
// Nothing here is persisted; the context is built from headers, consulted
// while resolving the descriptor's auth requirement, and dropped with the
// request.

use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};

use crate::config::SessionConfig;
use crate::endpoint::AuthRequirement;
use crate::error::{AuthErrorKind, ProxyError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BearerSource {
    Header,
    Cookie,
}

#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    /// Token from `Authorization: Bearer`, or the token cookie set at login
    pub bearer: Option<(String, BearerSource)>,
    /// `Authorization` was present but not a usable Bearer value
    pub malformed_authorization: bool,
    pub session_cookie: Option<String>,
    pub csrf_cookie: Option<String>,
    pub csrf_header: Option<String>,
}

/// Credential attached to the upstream request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Anonymous,
    Bearer(String),
    Cookie { session: String, csrf: Option<String> },
}

impl SessionContext {
    pub fn from_headers(headers: &HeaderMap, config: &SessionConfig) -> Self {
        let cookies = parse_cookies(headers);
        let lookup = |name: &str| {
            cookies
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
                .filter(|v| !v.is_empty())
        };

        let (header_token, malformed_authorization) = match extract_bearer(headers) {
            Ok(token) => (token, false),
            Err(()) => (None, true),
        };

        let bearer = header_token
            .map(|t| (t, BearerSource::Header))
            .or_else(|| lookup(&config.token_cookie).map(|t| (t, BearerSource::Cookie)));

        let csrf_header = headers
            .get(config.csrf_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Self {
            bearer,
            malformed_authorization,
            session_cookie: lookup(&config.session_cookie),
            csrf_cookie: lookup(&config.csrf_cookie),
            csrf_header,
        }
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer.as_ref().map(|(t, _)| t.as_str())
    }

    /// Resolve the credential an endpoint needs, failing before any upstream call
    pub fn resolve(&self, requirement: AuthRequirement, unsafe_method: bool) -> Result<Credential, ProxyError> {
        match requirement {
            AuthRequirement::None => Ok(Credential::Anonymous),
            AuthRequirement::OptionalBearer | AuthRequirement::RequiredBearer => {
                if self.malformed_authorization {
                    return Err(ProxyError::auth(AuthErrorKind::InvalidCredential));
                }
                match (self.bearer_token(), requirement) {
                    (Some(token), _) => Ok(Credential::Bearer(token.to_string())),
                    (None, AuthRequirement::RequiredBearer) => {
                        Err(ProxyError::auth(AuthErrorKind::Unauthenticated))
                    }
                    (None, _) => Ok(Credential::Anonymous),
                }
            }
            AuthRequirement::CookieSession => {
                let session = self
                    .session_cookie
                    .clone()
                    .ok_or_else(|| ProxyError::auth(AuthErrorKind::Unauthenticated))?;
                // Django checks the header against the cookie; the header wins when both exist
                let csrf = self.csrf_header.clone().or_else(|| self.csrf_cookie.clone());
                if unsafe_method && csrf.is_none() {
                    return Err(ProxyError::auth(AuthErrorKind::CsrfMissing));
                }
                Ok(Credential::Cookie { session, csrf })
            }
        }
    }
}

impl Credential {
    /// Short, non-reversible identifier for log lines
    pub fn fingerprint(&self) -> Option<String> {
        match self {
            Credential::Anonymous => None,
            Credential::Bearer(token) => Some(fingerprint(token)),
            Credential::Cookie { session, .. } => Some(fingerprint(session)),
        }
    }
}

pub fn fingerprint(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    digest.iter().take(4).map(|b| format!("{:02x}", b)).collect()
}

/// Bearer token from the Authorization header.
/// `Ok(None)` when the header is absent, `Err` when it is present but unusable.
fn extract_bearer(headers: &HeaderMap) -> Result<Option<String>, ()> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| ())?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .ok_or(())?
        .trim();
    if token.is_empty() {
        return Err(());
    }
    Ok(Some(token.to_string()))
}

fn parse_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|line| line.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let value = value.trim().trim_matches('"');
            Some((name.trim().to_string(), value.to_string()))
        })
        .collect()
}
