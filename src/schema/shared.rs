// Response and request shapes shared by several catalog entries.
//
// Upstream payloads use snake_case keys; endpoints with a camelCase boundary
// convert keys around these schemas, so they are always declared snake_case.

use once_cell::sync::Lazy;

use super::Schema;

/// `{"status": <code>, ...}` wrapper used by every allauth headless response
pub fn status_envelope(status: u16) -> Schema {
    Schema::object().field("status", Schema::literal(status)).passthrough()
}

/// `{"status": 200, "data": <data>, ...}`
pub fn data_envelope(data: Schema) -> Schema {
    status_envelope(200).field("data", data)
}

pub fn paginated(item: Schema) -> Schema {
    Schema::object()
        .field("count", Schema::integer().min(0))
        .field("next", Schema::url().nullable())
        .field("previous", Schema::url().nullable())
        .field("results", Schema::array_of(item))
        .passthrough()
}

pub static USER: Lazy<Schema> = Lazy::new(|| {
    Schema::object()
        .field("id", Schema::union(vec![Schema::integer(), Schema::string()]))
        .field("display", Schema::string())
        .field("has_usable_password", Schema::boolean())
        .optional("email", Schema::email().nullable())
        .optional("username", Schema::string().nullable())
        .passthrough()
});

pub static AUTH_METHOD: Lazy<Schema> = Lazy::new(|| {
    Schema::object()
        .field("method", Schema::one_of(&["password", "password_reset", "code", "mfa", "socialaccount"]))
        .field("at", Schema::number())
        .passthrough()
});

/// Authenticated session payload; login and signup carry the access token in `meta`
pub static SESSION: Lazy<Schema> = Lazy::new(|| {
    data_envelope(
        Schema::object()
            .field("user", USER.clone())
            .field("methods", Schema::array_of(AUTH_METHOD.clone()))
            .passthrough(),
    )
    .field(
        "meta",
        Schema::object()
            .field("is_authenticated", Schema::boolean())
            .optional("access_token", Schema::string().min(1))
            .optional("refresh_token", Schema::string().min(1))
            .optional("session_token", Schema::string().min(1))
            .passthrough(),
    )
});

/// 401 payload returned when the upstream session ended or needs another flow step
pub static UNAUTHENTICATED: Lazy<Schema> = Lazy::new(|| {
    status_envelope(401)
        .optional(
            "data",
            Schema::object()
                .field("flows", Schema::array_of(Schema::object().field("id", Schema::string()).passthrough()))
                .passthrough(),
        )
        .field(
            "meta",
            Schema::object().field("is_authenticated", Schema::literal(false)).passthrough(),
        )
});

pub static EMAIL_ADDRESS: Lazy<Schema> = Lazy::new(|| {
    Schema::object()
        .field("email", Schema::email())
        .field("primary", Schema::boolean())
        .field("verified", Schema::boolean())
        .passthrough()
});

pub static EMAIL_LIST: Lazy<Schema> = Lazy::new(|| data_envelope(Schema::array_of(EMAIL_ADDRESS.clone())));

pub static EMAIL_BODY: Lazy<Schema> = Lazy::new(|| Schema::object().field("email", Schema::email()));

pub static AUTHENTICATOR: Lazy<Schema> = Lazy::new(|| {
    Schema::object()
        .field("type", Schema::one_of(&["totp", "recovery_codes", "webauthn"]))
        .field("created_at", Schema::number())
        .optional("last_used_at", Schema::number().nullable())
        .passthrough()
});

pub static TOTP: Lazy<Schema> = Lazy::new(|| {
    data_envelope(
        AUTHENTICATOR
            .clone()
            .field("type", Schema::literal("totp")),
    )
});

/// 404 from the TOTP endpoint: not an error, it carries a fresh secret for setup
pub static TOTP_NOT_CONFIGURED: Lazy<Schema> = Lazy::new(|| {
    status_envelope(404).field(
        "meta",
        Schema::object()
            .field("secret", Schema::string().min(1))
            .optional("totp_url", Schema::url())
            .passthrough(),
    )
});

pub static RECOVERY_CODES: Lazy<Schema> = Lazy::new(|| {
    data_envelope(
        AUTHENTICATOR
            .clone()
            .field("type", Schema::literal("recovery_codes"))
            .field("total_code_count", Schema::integer().min(0))
            .field("unused_code_count", Schema::integer().min(0))
            .optional("unused_codes", Schema::array_of(Schema::string())),
    )
});

pub static USER_SESSION: Lazy<Schema> = Lazy::new(|| {
    Schema::object()
        .field("id", Schema::integer())
        .field("user_agent", Schema::string())
        .field("ip", Schema::string())
        .field("created_at", Schema::number())
        .field("is_current", Schema::boolean())
        .optional("last_seen_at", Schema::number().nullable())
        .passthrough()
});

pub static AUTHOR: Lazy<Schema> = Lazy::new(|| {
    Schema::object()
        .field("id", Schema::integer())
        .field("display_name", Schema::string())
        .passthrough()
});

pub static PROFILE: Lazy<Schema> = Lazy::new(|| {
    Schema::object()
        .field("id", Schema::integer())
        .field("email", Schema::email())
        .field("first_name", Schema::string())
        .field("last_name", Schema::string())
        .optional("avatar_url", Schema::url().nullable())
        .field("date_joined", Schema::string())
        .passthrough()
});

pub static POST: Lazy<Schema> = Lazy::new(|| {
    Schema::object()
        .field("id", Schema::integer())
        .field("title", Schema::string())
        .field("slug", Schema::string())
        .field("content", Schema::string())
        .field("author", AUTHOR.clone())
        .field("tags", Schema::array_of(Schema::string()))
        .field("published_at", Schema::string().nullable())
        .field("comment_count", Schema::integer().min(0))
        .passthrough()
});

pub static COMMENT: Lazy<Schema> = Lazy::new(|| {
    Schema::object()
        .field("id", Schema::integer())
        .field("author", AUTHOR.clone())
        .field("body", Schema::string())
        .field("created_at", Schema::string())
        .passthrough()
});

pub static NOTIFICATION: Lazy<Schema> = Lazy::new(|| {
    Schema::object()
        .field("id", Schema::integer())
        .field("verb", Schema::string())
        .field("is_read", Schema::boolean())
        .field("created_at", Schema::string())
        .optional("target_url", Schema::string().nullable())
        .passthrough()
});
