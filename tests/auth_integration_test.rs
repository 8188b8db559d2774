mod common;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{response_json, TestApp, TEST_PASSWORD};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use serde_json::json;
use storefront_api::{entities::session, errors::ServiceError};

#[tokio::test]
async fn test_register_login_and_access_profile() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/auth/register",
            Some(json!({
                "name": "Grace Hopper",
                "email": "grace@example.com",
                "password": "compilers-rule"
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["email"], "grace@example.com");
    assert!(body["data"].get("password_hash").is_none());

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({"username": "grace@example.com", "password": "compilers-rule"})),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let token = body["data"]["token"].as_str().unwrap().to_string();
    assert_eq!(token.len(), 48);

    let response = app
        .request(Method::GET, "/api/account/detail-user", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["name"], "Grace Hopper");
}

#[tokio::test]
async fn test_register_rejects_invalid_input() {
    let app = TestApp::new().await;

    let cases = [
        json!({"name": "Al", "email": "al@example.com", "password": "long-enough"}),
        json!({"name": "R2 D2", "email": "r2@example.com", "password": "long-enough"}),
        json!({"name": "Valid Name", "email": "not-an-email", "password": "long-enough"}),
        json!({"name": "Valid Name", "phone": "123", "password": "long-enough"}),
        json!({"name": "Valid Name", "email": "short@example.com", "password": "short"}),
        json!({"name": "Valid Name", "password": "long-enough"}),
    ];

    for payload in cases {
        let response = app
            .request(Method::POST, "/auth/register", Some(payload.clone()), None)
            .await;
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "payload should be rejected: {}",
            payload
        );
    }
}

#[tokio::test]
async fn test_duplicate_email_is_conflict() {
    let app = TestApp::new().await;
    app.seed_user("dup@example.com", &[]).await;

    let response = app
        .request(
            Method::POST,
            "/auth/register",
            Some(json!({
                "name": "Second User",
                "email": "dup@example.com",
                "password": "another-secret"
            })),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_login_by_phone_and_wrong_password() {
    let app = TestApp::new().await;
    let auth = &app.state.services.auth;
    auth.register(storefront_api::auth::RegisterInput {
        name: "Phone User".into(),
        email: None,
        phone: Some("081234567890".into()),
        password: TEST_PASSWORD.into(),
    })
    .await
    .unwrap();

    assert!(auth.login("081234567890", TEST_PASSWORD).await.is_ok());
    assert_matches!(
        auth.login("081234567890", "wrong-password").await,
        Err(ServiceError::Unauthorized(msg)) if msg == "invalid username or password"
    );
    assert_matches!(
        auth.login("nobody@example.com", TEST_PASSWORD).await,
        Err(ServiceError::Unauthorized(_))
    );
}

#[tokio::test]
async fn test_protected_routes_require_a_valid_token() {
    let app = TestApp::new().await;

    let missing = app
        .request(Method::GET, "/api/products/carts", None, None)
        .await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let bogus = app
        .request(Method::GET, "/api/products/carts", None, Some("not-a-real-token"))
        .await;
    assert_eq!(bogus.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(bogus).await;
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn test_logout_invalidates_the_session() {
    let app = TestApp::new().await;
    let (_, token) = app.login_user("logout@example.com", &[]).await;

    let response = app
        .request(Method::POST, "/auth/logout", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let after = app
        .request(Method::GET, "/api/account/detail-user", None, Some(&token))
        .await;
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_session_is_rejected_and_deleted() {
    let app = TestApp::new().await;
    let (user_id, token) = app.login_user("expired@example.com", &[]).await;

    let row = session::Entity::find()
        .filter(session::Column::UserId.eq(user_id))
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut active: session::ActiveModel = row.into();
    active.expires_at = Set(Utc::now() - Duration::minutes(1));
    active.update(&*app.state.db).await.unwrap();

    let result = app.state.services.auth.verify_token(&token).await;
    assert_matches!(result, Err(ServiceError::Unauthorized(_)));

    let remaining = session::Entity::find()
        .filter(session::Column::UserId.eq(user_id))
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_password_change_requires_old_password() {
    let app = TestApp::new().await;
    let (_, token) = app.login_user("change@example.com", &[]).await;

    let missing_old = app
        .request(
            Method::PUT,
            "/api/account/update-user",
            Some(json!({"new_password": "brand-new-secret"})),
            Some(&token),
        )
        .await;
    assert_eq!(missing_old.status(), StatusCode::BAD_REQUEST);

    let wrong_old = app
        .request(
            Method::PUT,
            "/api/account/update-user",
            Some(json!({"old_password": "nope-nope", "new_password": "brand-new-secret"})),
            Some(&token),
        )
        .await;
    assert_eq!(wrong_old.status(), StatusCode::UNAUTHORIZED);

    let ok = app
        .request(
            Method::PUT,
            "/api/account/update-user",
            Some(json!({"old_password": TEST_PASSWORD, "new_password": "brand-new-secret"})),
            Some(&token),
        )
        .await;
    assert_eq!(ok.status(), StatusCode::OK);

    let auth = &app.state.services.auth;
    assert!(auth.login("change@example.com", "brand-new-secret").await.is_ok());
    assert!(auth.login("change@example.com", TEST_PASSWORD).await.is_err());
}

#[tokio::test]
async fn test_address_book_round_trip() {
    let app = TestApp::new().await;
    let (_, token) = app.login_user("addr@example.com", &["1 First Ave"]).await;

    let added = app
        .request(
            Method::POST,
            "/api/account/address",
            Some(json!({"address": "2 Second Ave"})),
            Some(&token),
        )
        .await;
    assert_eq!(added.status(), StatusCode::CREATED);
    let body = response_json(added).await;
    assert_eq!(body["data"], json!(["1 First Ave", "2 Second Ave"]));

    let chosen = app
        .request(
            Method::POST,
            "/api/account/address-default",
            Some(json!({"index": 1})),
            Some(&token),
        )
        .await;
    let body = response_json(chosen).await;
    assert_eq!(body["data"]["address"], "2 Second Ave");

    let deleted = app
        .request(Method::DELETE, "/api/account/address/0", None, Some(&token))
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);
    let body = response_json(deleted).await;
    assert_eq!(body["data"], json!(["2 Second Ave"]));

    let out_of_range = app
        .request(Method::DELETE, "/api/account/address/5", None, Some(&token))
        .await;
    assert_eq!(out_of_range.status(), StatusCode::NOT_FOUND);
}
