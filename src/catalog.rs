// The default endpoint table.
//
// Authentication and account management go to django-allauth's headless
// "app" client with bearer tokens; content resources go to the Django REST
// API with either bearer tokens or the browser session cookie. Upstream
// payloads are snake_case; content resources are exposed camelCase.

use crate::endpoint::{AuthRequirement, Catalog, CatalogError, Endpoint};
use crate::hooks::{ClearSession, RelayUpstreamCookies, StoreAccessToken};
use crate::schema::shared::{self, data_envelope, paginated, status_envelope};
use crate::schema::Schema;

use AuthRequirement::{CookieSession, OptionalBearer, RequiredBearer};

macro_rules! allauth {
    ($path:literal) => {
        concat!("/_allauth/app/v1", $path)
    };
}

pub fn default_catalog() -> Result<Catalog, CatalogError> {
    let mut endpoints = auth_endpoints();
    endpoints.extend(account_endpoints());
    endpoints.extend(mfa_endpoints());
    endpoints.extend(content_endpoints());
    endpoints.extend(browser_session_endpoints());
    Catalog::new(endpoints)
}

fn password() -> Schema {
    Schema::string().min(8).max(128)
}

fn auth_endpoints() -> Vec<Endpoint> {
    // allauth answers 401 with the pending flows whenever a request ends up unauthenticated
    let session_or_flows = |endpoint: Endpoint| {
        endpoint
            .returns(shared::SESSION.clone())
            .documented(401, "authentication_pending", shared::UNAUTHENTICATED.clone())
    };

    vec![
        Endpoint::get("auth.config", "/api/auth/config", allauth!("/config"))
            .returns(data_envelope(Schema::object().passthrough())),
        session_or_flows(Endpoint::get("auth.session", "/api/auth/session", allauth!("/auth/session")))
            .auth(OptionalBearer),
        session_or_flows(Endpoint::post("auth.login", "/api/auth/login", allauth!("/auth/login")))
            .body(
                Schema::object()
                    .optional("email", Schema::email())
                    .optional("username", Schema::string().min(1).max(150))
                    .field("password", Schema::string().min(1)),
            )
            .hook(StoreAccessToken::new()),
        session_or_flows(Endpoint::post("auth.signup", "/api/auth/signup", allauth!("/auth/signup")))
            .body(
                Schema::object()
                    .field("email", Schema::email())
                    .optional("username", Schema::string().min(1).max(150))
                    .field("password", password()),
            )
            .hook(StoreAccessToken::new()),
        Endpoint::delete("auth.logout", "/api/auth/session", allauth!("/auth/session"))
            .auth(RequiredBearer)
            .returns(status_envelope(200))
            .documented(401, "logged_out", shared::UNAUTHENTICATED.clone())
            .hook(ClearSession),
        session_or_flows(Endpoint::post("auth.reauthenticate", "/api/auth/reauthenticate", allauth!("/auth/reauthenticate")))
            .auth(RequiredBearer)
            .body(Schema::object().field("password", Schema::string().min(1))),
        session_or_flows(Endpoint::post("auth.2fa.authenticate", "/api/auth/2fa/authenticate", allauth!("/auth/2fa/authenticate")))
            .auth(OptionalBearer)
            .body(Schema::object().field("code", Schema::string().min(6).max(16)))
            .hook(StoreAccessToken::new()),
        session_or_flows(Endpoint::post("auth.email.verify", "/api/auth/email/verify", allauth!("/auth/email/verify")))
            .auth(OptionalBearer)
            .body(Schema::object().field("key", Schema::string().min(1))),
        Endpoint::post("auth.password.request", "/api/auth/password/request", allauth!("/auth/password/request"))
            .body(shared::EMAIL_BODY.clone())
            .returns(status_envelope(200)),
        session_or_flows(Endpoint::post("auth.password.reset", "/api/auth/password/reset", allauth!("/auth/password/reset")))
            .body(
                Schema::object()
                    .field("key", Schema::string().min(1))
                    .field("password", password()),
            )
            .hook(StoreAccessToken::new()),
        Endpoint::get("auth.sessions.list", "/api/auth/sessions", allauth!("/auth/sessions"))
            .auth(RequiredBearer)
            .returns(data_envelope(Schema::array_of(shared::USER_SESSION.clone()))),
        Endpoint::delete("auth.sessions.end", "/api/auth/sessions", allauth!("/auth/sessions"))
            .auth(RequiredBearer)
            .body(Schema::object().field("sessions", Schema::array_of(Schema::integer()).min(1)))
            .returns(data_envelope(Schema::array_of(shared::USER_SESSION.clone()))),
    ]
}

fn account_endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::get("account.email.list", "/api/account/email", allauth!("/account/email"))
            .auth(RequiredBearer)
            .returns(shared::EMAIL_LIST.clone()),
        Endpoint::post("account.email.add", "/api/account/email", allauth!("/account/email"))
            .auth(RequiredBearer)
            .body(shared::EMAIL_BODY.clone())
            .returns(shared::EMAIL_LIST.clone()),
        Endpoint::put("account.email.resend", "/api/account/email", allauth!("/account/email"))
            .auth(RequiredBearer)
            .body(shared::EMAIL_BODY.clone())
            .returns(status_envelope(200)),
        Endpoint::patch("account.email.primary", "/api/account/email", allauth!("/account/email"))
            .auth(RequiredBearer)
            .body(
                Schema::object()
                    .field("email", Schema::email())
                    .field("primary", Schema::literal(true)),
            )
            .returns(shared::EMAIL_LIST.clone()),
        Endpoint::delete("account.email.remove", "/api/account/email", allauth!("/account/email"))
            .auth(RequiredBearer)
            .body(shared::EMAIL_BODY.clone())
            .returns(shared::EMAIL_LIST.clone()),
        Endpoint::post("account.password.change", "/api/account/password/change", allauth!("/account/password/change"))
            .auth(RequiredBearer)
            .body(
                Schema::object()
                    .optional("current_password", Schema::string().min(1))
                    .field("new_password", password()),
            )
            .returns(status_envelope(200))
            .documented(401, "reauthentication_required", shared::UNAUTHENTICATED.clone()),
    ]
}

fn mfa_endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::get("account.authenticators", "/api/account/authenticators", allauth!("/account/authenticators"))
            .auth(RequiredBearer)
            .returns(data_envelope(Schema::array_of(shared::AUTHENTICATOR.clone()))),
        Endpoint::get("account.totp.get", "/api/account/authenticators/totp", allauth!("/account/authenticators/totp"))
            .auth(RequiredBearer)
            .returns(shared::TOTP.clone())
            .documented(404, "totp_not_configured", shared::TOTP_NOT_CONFIGURED.clone()),
        Endpoint::post("account.totp.activate", "/api/account/authenticators/totp", allauth!("/account/authenticators/totp"))
            .auth(RequiredBearer)
            .body(Schema::object().field("code", Schema::digits(6)))
            .returns(shared::TOTP.clone()),
        Endpoint::delete("account.totp.deactivate", "/api/account/authenticators/totp", allauth!("/account/authenticators/totp"))
            .auth(RequiredBearer)
            .returns(status_envelope(200)),
        Endpoint::get(
            "account.recovery_codes.get",
            "/api/account/authenticators/recovery-codes",
            allauth!("/account/authenticators/recovery-codes"),
        )
        .auth(RequiredBearer)
        .returns(shared::RECOVERY_CODES.clone()),
        Endpoint::post(
            "account.recovery_codes.regenerate",
            "/api/account/authenticators/recovery-codes",
            allauth!("/account/authenticators/recovery-codes"),
        )
        .auth(RequiredBearer)
        .returns(shared::RECOVERY_CODES.clone()),
    ]
}

fn content_endpoints() -> Vec<Endpoint> {
    let post_id = || Schema::integer().min(1);
    let post_body = || {
        Schema::object()
            .field("title", Schema::string().min(1).max(200))
            .field("content", Schema::string().min(1))
            .optional("tags", Schema::array_of(Schema::string().min(1).max(50)).max(10))
            .optional("published_at", Schema::string().nullable())
    };

    vec![
        Endpoint::get("posts.list", "/api/posts", "/api/v1/posts/")
            .auth(OptionalBearer)
            .camel_case()
            .query(
                Schema::object()
                    .optional("page", Schema::integer().min(1))
                    .optional("page_size", Schema::integer().min(1).max(100))
                    .optional("search", Schema::string().max(200))
                    .optional("tag", Schema::array_of(Schema::string()))
                    .optional("ordering", Schema::one_of(&["published_at", "-published_at", "title", "-title"])),
            )
            .returns(paginated(shared::POST.clone())),
        Endpoint::get("posts.get", "/api/posts/:id", "/api/v1/posts/{id}/")
            .auth(OptionalBearer)
            .camel_case()
            .path_param("id", post_id())
            .returns(shared::POST.clone()),
        Endpoint::post("posts.create", "/api/posts", "/api/v1/posts/")
            .auth(RequiredBearer)
            .camel_case()
            .body(post_body())
            .returns(shared::POST.clone()),
        Endpoint::patch("posts.update", "/api/posts/:id", "/api/v1/posts/{id}/")
            .auth(RequiredBearer)
            .camel_case()
            .path_param("id", post_id())
            .body(
                Schema::object()
                    .optional("title", Schema::string().min(1).max(200))
                    .optional("content", Schema::string().min(1))
                    .optional("tags", Schema::array_of(Schema::string().min(1).max(50)).max(10))
                    .optional("published_at", Schema::string().nullable()),
            )
            .returns(shared::POST.clone()),
        Endpoint::delete("posts.delete", "/api/posts/:id", "/api/v1/posts/{id}/")
            .auth(RequiredBearer)
            .path_param("id", post_id())
            .returns(Schema::null()),
        Endpoint::get("posts.comments.list", "/api/posts/:id/comments", "/api/v1/posts/{id}/comments/")
            .auth(OptionalBearer)
            .camel_case()
            .path_param("id", post_id())
            .query(Schema::object().optional("page", Schema::integer().min(1)))
            .returns(paginated(shared::COMMENT.clone())),
        Endpoint::post("posts.comments.create", "/api/posts/:id/comments", "/api/v1/posts/{id}/comments/")
            .auth(RequiredBearer)
            .camel_case()
            .path_param("id", post_id())
            .body(Schema::object().field("body", Schema::string().min(1).max(5000)))
            .returns(shared::COMMENT.clone()),
    ]
}

fn browser_session_endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::get("profile.get", "/api/profile", "/api/v1/users/me/")
            .auth(CookieSession)
            .camel_case()
            .returns(shared::PROFILE.clone())
            .hook(RelayUpstreamCookies),
        Endpoint::patch("profile.update", "/api/profile", "/api/v1/users/me/")
            .auth(CookieSession)
            .camel_case()
            .body(
                Schema::object()
                    .optional("first_name", Schema::string().max(150))
                    .optional("last_name", Schema::string().max(150))
                    .optional("avatar_url", Schema::url().nullable()),
            )
            .returns(shared::PROFILE.clone())
            .hook(RelayUpstreamCookies),
        Endpoint::get("notifications.list", "/api/notifications", "/api/v1/notifications/")
            .auth(CookieSession)
            .camel_case()
            .query(
                Schema::object()
                    .optional("page", Schema::integer().min(1))
                    .optional("is_read", Schema::boolean()),
            )
            .returns(paginated(shared::NOTIFICATION.clone())),
        Endpoint::post("notifications.read", "/api/notifications/:id/read", "/api/v1/notifications/{id}/read/")
            .auth(CookieSession)
            .path_param("id", Schema::integer().min(1))
            .returns(Schema::null()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::HttpMethod;

    #[test]
    fn test_default_catalog_is_valid() {
        let catalog = default_catalog().unwrap();
        assert!(catalog.len() > 30);
    }

    #[test]
    fn test_allauth_paths_use_app_client() {
        let catalog = default_catalog().unwrap();
        let totp = catalog.get("account.totp.get").unwrap();
        assert_eq!(totp.upstream, "/_allauth/app/v1/account/authenticators/totp");
        assert_eq!(totp.documented_status(404).unwrap().kind, "totp_not_configured");
    }

    #[test]
    fn test_body_schemas_only_on_mutations() {
        let catalog = default_catalog().unwrap();
        for endpoint in catalog.endpoints() {
            if endpoint.method == HttpMethod::Get {
                assert!(endpoint.body.is_none(), "{} declares a GET body", endpoint.name);
            }
        }
    }

    #[test]
    fn test_session_hooks_are_attached() {
        let catalog = default_catalog().unwrap();
        for name in ["auth.login", "auth.signup", "auth.password.reset", "auth.logout"] {
            assert!(!catalog.get(name).unwrap().hooks.is_empty(), "{name} has no session hook");
        }
        assert!(catalog.get("account.email.list").unwrap().hooks.is_empty());
    }
}
