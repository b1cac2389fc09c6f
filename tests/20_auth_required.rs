mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{call, get, post_json};
use hr_api::auth::{generate_jwt, Claims};
use serde_json::json;
use uuid::Uuid;

fn claims() -> Claims {
    Claims::new(Uuid::new_v4(), "rh@empresa.com.br".to_string(), "RH".to_string())
}

#[tokio::test]
async fn missing_or_malformed_authorization_is_rejected() -> Result<()> {
    let (status, body) = call(get("/api/associates", None)?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert_eq!(body["message"], "Missing Authorization header");

    let request = Request::builder()
        .uri("/api/associates")
        .header("authorization", "Basic cmg6c2VjcmV0")
        .body(Body::empty())?;
    let (status, body) = call(request).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Authorization header must use Bearer token format");

    let (status, _) = call(get("/api/custom-fields", Some("garbage"))?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn expired_or_foreign_tokens_are_rejected() -> Result<()> {
    let mut expired = claims();
    expired.iat -= 7200;
    expired.exp = expired.iat + 60;
    let token = generate_jwt(&expired)?;
    let (status, _) = call(get("/api/auth/whoami", Some(&token))?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let foreign = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims(),
        &jsonwebtoken::EncodingKey::from_secret(b"some-other-secret"),
    )?;
    let (status, _) = call(get("/api/auth/whoami", Some(&foreign))?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn valid_token_reaches_admin_check() -> Result<()> {
    let token = generate_jwt(&claims())?;
    let (status, _) = call(get("/api/auth/whoami", Some(&token))?).await?;
    // Unknown admin, or no database to look it up in
    assert!(
        status == StatusCode::FORBIDDEN || status == StatusCode::SERVICE_UNAVAILABLE,
        "unexpected status {}",
        status
    );
    Ok(())
}

#[tokio::test]
async fn public_routes_do_not_need_a_token() -> Result<()> {
    // Malformed link tokens are a plain 404 before any lookup
    let (status, body) = call(get("/public/forms/abc", None)?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = call(post_json("/public/fields/zz", None, &json!({ "value": "x" }))?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Body is rejected before credentials are checked
    let request = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))?;
    let (status, body) = call(request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_JSON");
    Ok(())
}
