mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{send, session_payload, Canned, StubBackend};

const LOGIN_PATH: &str = "/_allauth/app/v1/auth/login";
const SESSION_PATH: &str = "/_allauth/app/v1/auth/session";

fn profile() -> serde_json::Value {
    json!({
        "id": 1,
        "email": "ada@example.com",
        "first_name": "Ada",
        "last_name": "Lovelace",
        "avatar_url": null,
        "date_joined": "2024-01-01T00:00:00Z"
    })
}

#[tokio::test]
async fn login_stores_access_token_cookie() -> Result<()> {
    let stub = StubBackend::spawn().await?;
    stub.on(Method::POST, LOGIN_PATH, Canned::json(200, session_payload("at-1")));
    let gateway = common::gateway(&stub)?;

    let reply = send(
        &gateway,
        Method::POST,
        "/api/auth/login",
        &[],
        Some(json!({"email": "ada@example.com", "password": "secret"})),
    )
    .await?;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["meta"]["is_authenticated"], true);
    assert_eq!(
        reply.set_cookies(),
        vec!["auth_token=at-1; Path=/; HttpOnly; SameSite=Lax; Max-Age=604800".to_string()]
    );

    // The stored cookie authenticates later calls as a bearer token
    stub.on(Method::GET, SESSION_PATH, Canned::json(200, session_payload("at-1")));
    let reply = common::get(&gateway, "/api/auth/session", &[("cookie", "auth_token=at-1")]).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(stub.last_hit().unwrap().headers["authorization"], "Bearer at-1");
    Ok(())
}

#[tokio::test]
async fn pending_login_flow_sets_no_cookie() -> Result<()> {
    let stub = StubBackend::spawn().await?;
    let pending = json!({
        "status": 401,
        "data": {"flows": [{"id": "mfa_authenticate", "is_pending": true}]},
        "meta": {"is_authenticated": false}
    });
    stub.on(Method::POST, LOGIN_PATH, Canned::json(401, pending.clone()));
    let gateway = common::gateway(&stub)?;

    let reply = send(
        &gateway,
        Method::POST,
        "/api/auth/login",
        &[],
        Some(json!({"username": "ada", "password": "secret"})),
    )
    .await?;

    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body, pending);
    assert!(reply.set_cookies().is_empty());
    Ok(())
}

#[tokio::test]
async fn logout_clears_token_cookie() -> Result<()> {
    let stub = StubBackend::spawn().await?;
    stub.on(
        Method::DELETE,
        SESSION_PATH,
        Canned::json(401, json!({"status": 401, "meta": {"is_authenticated": false}})),
    );
    let gateway = common::gateway(&stub)?;

    let reply = send(&gateway, Method::DELETE, "/api/auth/session", &[("cookie", "auth_token=at-1")], None).await?;

    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        reply.set_cookies(),
        vec!["auth_token=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn cookie_session_forwards_django_cookies() -> Result<()> {
    let stub = StubBackend::spawn().await?;
    stub.on(
        Method::GET,
        "/api/v1/users/me/",
        Canned::json(200, profile())
            .with_cookie("sessionid=rotated; Path=/; HttpOnly")
            .with_cookie("tracking=1; Path=/"),
    );
    let gateway = common::gateway(&stub)?;

    let reply = common::get(&gateway, "/api/profile", &[("cookie", "sessionid=abc; csrftoken=xyz")]).await?;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["firstName"], "Ada");
    assert_eq!(reply.set_cookies(), vec!["sessionid=rotated; Path=/; HttpOnly".to_string()]);

    let hit = stub.last_hit().unwrap();
    assert_eq!(hit.headers["cookie"], "sessionid=abc; csrftoken=xyz");
    assert_eq!(hit.headers["x-csrftoken"], "xyz");
    assert!(hit.headers.get("authorization").is_none());
    Ok(())
}

#[tokio::test]
async fn unsafe_cookie_session_call_needs_csrf() -> Result<()> {
    let stub = StubBackend::spawn().await?;
    let gateway = common::gateway(&stub)?;

    let reply = send(
        &gateway,
        Method::PATCH,
        "/api/profile",
        &[("cookie", "sessionid=abc")],
        Some(json!({"firstName": "Grace"})),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.error_code(), Some("csrf_missing"));

    let reply = common::get(&gateway, "/api/profile", &[]).await?;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    assert_eq!(stub.hit_count(), 0);
    Ok(())
}
