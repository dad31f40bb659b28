// Session side effects attached to specific endpoints.
//
// Hooks run after a non-error outcome (2xx or a documented status) and only
// record cookie directives; the router turns them into `Set-Cookie` headers
// on the inbound response.

use std::fmt;

use serde_json::Value;

use crate::config::SessionConfig;
use crate::proxy::Outcome;
use crate::session::SessionContext;

pub struct HookContext<'a> {
    pub outcome: &'a Outcome,
    /// Raw `Set-Cookie` values from the upstream response
    pub upstream_cookies: &'a [String],
    pub session: &'a SessionContext,
    pub config: &'a SessionConfig,
}

pub trait SessionHook: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn on_success(&self, ctx: &HookContext<'_>, effects: &mut SessionEffects);
}

/// Cookie directives accumulated by hooks for one response
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionEffects {
    set_cookies: Vec<String>,
}

impl SessionEffects {
    pub fn set_cookie(&mut self, config: &SessionConfig, name: &str, value: &str, max_age_secs: u64) {
        self.set_cookies.push(format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
            name,
            value,
            max_age_secs,
            if config.cookie_secure { "; Secure" } else { "" }
        ));
    }

    pub fn clear_cookie(&mut self, config: &SessionConfig, name: &str) {
        self.set_cookie(config, name, "", 0);
    }

    pub fn relay(&mut self, raw: &str) {
        self.set_cookies.push(raw.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.set_cookies.is_empty()
    }

    pub fn set_cookies(&self) -> &[String] {
        &self.set_cookies
    }
}

/// Stores the access token from an authenticated response in the token cookie
#[derive(Debug, Clone)]
pub struct StoreAccessToken {
    pointer: &'static str,
}

impl StoreAccessToken {
    pub fn new() -> Self {
        Self {
            pointer: "/meta/access_token",
        }
    }
}

impl Default for StoreAccessToken {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHook for StoreAccessToken {
    fn name(&self) -> &'static str {
        "store_access_token"
    }

    fn on_success(&self, ctx: &HookContext<'_>, effects: &mut SessionEffects) {
        match ctx.outcome.body().and_then(|b| b.pointer(self.pointer)).and_then(Value::as_str) {
            Some(token) if !token.is_empty() => {
                effects.set_cookie(ctx.config, &ctx.config.token_cookie, token, ctx.config.token_max_age_secs);
            }
            _ => {
                tracing::debug!("No access token at {} in response, session cookie left unchanged", self.pointer);
            }
        }
    }
}

/// Expires the token cookie, e.g. after logout
#[derive(Debug, Clone, Default)]
pub struct ClearSession;

impl SessionHook for ClearSession {
    fn name(&self) -> &'static str {
        "clear_session"
    }

    fn on_success(&self, ctx: &HookContext<'_>, effects: &mut SessionEffects) {
        if ctx.session.bearer.is_some() {
            effects.clear_cookie(ctx.config, &ctx.config.token_cookie);
        }
    }
}

/// Passes the upstream's Django session and CSRF cookies through to the browser
#[derive(Debug, Clone, Default)]
pub struct RelayUpstreamCookies;

impl SessionHook for RelayUpstreamCookies {
    fn name(&self) -> &'static str {
        "relay_upstream_cookies"
    }

    fn on_success(&self, ctx: &HookContext<'_>, effects: &mut SessionEffects) {
        for raw in ctx.upstream_cookies {
            let name = raw.split('=').next().unwrap_or_default().trim();
            if name == ctx.config.session_cookie || name == ctx.config.csrf_cookie {
                effects.relay(raw);
            }
        }
    }
}
