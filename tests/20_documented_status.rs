mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{bearer, send, Canned, StubBackend};

const TOTP_PATH: &str = "/_allauth/app/v1/account/authenticators/totp";

#[tokio::test]
async fn totp_not_configured_passes_through_unchanged() -> Result<()> {
    let stub = StubBackend::spawn().await?;
    let payload = json!({"status": 404, "meta": {"secret": "s"}});
    stub.on(Method::GET, TOTP_PATH, Canned::json(404, payload.clone()));
    let gateway = common::gateway(&stub)?;
    let auth = bearer("tok-1");

    let reply = common::get(&gateway, "/api/account/authenticators/totp", &[("authorization", auth.as_str())]).await?;

    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body, payload);
    Ok(())
}

#[tokio::test]
async fn totp_payload_keeps_null_optional_fields() -> Result<()> {
    let stub = StubBackend::spawn().await?;
    let payload = json!({"status": 404, "meta": {"secret": "s", "totp_url": null}});
    stub.on(Method::GET, TOTP_PATH, Canned::json(404, payload.clone()));
    let gateway = common::gateway(&stub)?;
    let auth = bearer("tok-1");

    let reply = common::get(&gateway, "/api/account/authenticators/totp", &[("authorization", auth.as_str())]).await?;

    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body, payload);
    Ok(())
}

#[tokio::test]
async fn configured_totp_is_a_success() -> Result<()> {
    let stub = StubBackend::spawn().await?;
    stub.on(
        Method::GET,
        TOTP_PATH,
        Canned::json(200, json!({"status": 200, "data": {"type": "totp", "created_at": 1700000000.0}})),
    );
    let gateway = common::gateway(&stub)?;
    let auth = bearer("tok-1");

    let reply = common::get(&gateway, "/api/account/authenticators/totp", &[("authorization", auth.as_str())]).await?;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["type"], "totp");
    Ok(())
}

#[tokio::test]
async fn undocumented_error_status_keeps_upstream_payload() -> Result<()> {
    let stub = StubBackend::spawn().await?;
    let payload = json!({"status": 400, "errors": [{"message": "Incorrect code.", "code": "incorrect_code", "param": "code"}]});
    stub.on(Method::POST, TOTP_PATH, Canned::json(400, payload.clone()));
    let gateway = common::gateway(&stub)?;
    let auth = bearer("tok-1");

    let reply = send(
        &gateway,
        Method::POST,
        "/api/account/authenticators/totp",
        &[("authorization", auth.as_str())],
        Some(json!({"code": "123456"})),
    )
    .await?;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body, payload);
    Ok(())
}

#[tokio::test]
async fn wrong_documented_shape_is_an_upstream_error() -> Result<()> {
    let stub = StubBackend::spawn().await?;
    let payload = json!({"detail": "Not found."});
    stub.on(Method::GET, TOTP_PATH, Canned::json(404, payload.clone()));
    let gateway = common::gateway(&stub)?;
    let auth = bearer("tok-1");

    let reply = common::get(&gateway, "/api/account/authenticators/totp", &[("authorization", auth.as_str())]).await?;

    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body, payload);
    Ok(())
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() -> Result<()> {
    let stub = StubBackend::spawn().await?;
    let mut config = common::config_for(&stub);
    let closed = portpicker::pick_unused_port().expect("free port");
    config.upstream.base_url = format!("http://127.0.0.1:{}", closed);
    let gateway = common::gateway_with(config)?;

    let reply = common::get(&gateway, "/api/auth/config", &[]).await?;

    assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
    assert_eq!(reply.error_code(), Some("upstream_unreachable"));
    Ok(())
}
