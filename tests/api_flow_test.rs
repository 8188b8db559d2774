mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::str::FromStr;

fn decimal(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("decimal serialized as string")).unwrap()
}

#[tokio::test]
async fn test_cart_to_order_over_http() {
    let app = TestApp::new().await;
    let (_, token) = app.login_user("flow@example.com", &["9 Elm St"]).await;
    let desk = app.seed_product("Writing Desk", dec!(100)).await;
    let chair = app.seed_product("Desk Chair", dec!(50)).await;

    for product_id in [desk, desk, chair] {
        let response = app
            .request(
                Method::POST,
                "/api/products/carts",
                Some(json!({"product_id": product_id})),
                Some(&token),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let listed = app
        .request(Method::GET, "/api/products/carts", None, Some(&token))
        .await;
    assert_eq!(listed.status(), StatusCode::OK);
    let body = response_json(listed).await;
    let lines = body["data"].as_array().unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["product_name"], "Writing Desk");
    assert_eq!(lines[0]["quantity"], 2);
    assert_eq!(decimal(&lines[0]["total"]), dec!(200));

    let count = app
        .request(Method::GET, "/api/products/total-carts", None, Some(&token))
        .await;
    let body = response_json(count).await;
    assert_eq!(body["data"]["total"], 2);

    let updated = app
        .request(
            Method::PUT,
            "/api/products/carts",
            Some(json!({"product_id": chair, "quantity": 3})),
            Some(&token),
        )
        .await;
    assert_eq!(updated.status(), StatusCode::OK);
    let body = response_json(updated).await;
    assert_eq!(body["data"]["quantity"], 3);
    assert_eq!(decimal(&body["data"]["total"]), dec!(150));

    let ordered = app
        .request(
            Method::POST,
            "/api/products/orders",
            Some(json!({"product_id": [desk, chair]})),
            Some(&token),
        )
        .await;
    assert_eq!(ordered.status(), StatusCode::CREATED);
    let body = response_json(ordered).await;
    assert_eq!(decimal(&body["data"]["total_amount"]), dec!(350));
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["shipping_address"], "9 Elm St");

    let empty = app
        .request(Method::GET, "/api/products/carts", None, Some(&token))
        .await;
    let body = response_json(empty).await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_empty_order_is_unprocessable() {
    let app = TestApp::new().await;
    let (_, token) = app.login_user("noorder@example.com", &[]).await;

    let response = app
        .request(
            Method::POST,
            "/api/products/orders",
            Some(json!({"product_id": []})),
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Unprocessable Entity");
}

#[tokio::test]
async fn test_cart_validation_and_removal() {
    let app = TestApp::new().await;
    let (_, token) = app.login_user("cartval@example.com", &[]).await;
    let lamp = app.seed_product("Floor Lamp", dec!(40)).await;

    let missing = app
        .request(
            Method::POST,
            "/api/products/carts",
            Some(json!({"product_id": lamp + 100})),
            Some(&token),
        )
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let created = app
        .request(
            Method::POST,
            "/api/products/carts",
            Some(json!({"product_id": lamp})),
            Some(&token),
        )
        .await;
    let line_id = response_json(created).await["data"]["id"].as_i64().unwrap();

    let negative = app
        .request(
            Method::PUT,
            "/api/products/carts",
            Some(json!({"product_id": lamp, "quantity": -2})),
            Some(&token),
        )
        .await;
    assert_eq!(negative.status(), StatusCode::BAD_REQUEST);

    let deleted = app
        .request(
            Method::DELETE,
            &format!("/api/products/carts/{}", line_id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);

    let again = app
        .request(
            Method::DELETE,
            &format!("/api/products/carts/{}", line_id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wishlist_add_duplicate_and_remove() {
    let app = TestApp::new().await;
    let (_, token) = app.login_user("wish@example.com", &[]).await;
    let rug = app.seed_product("Area Rug", dec!(120)).await;

    let added = app
        .request(
            Method::POST,
            "/api/products/wishlist",
            Some(json!({"product_id": rug})),
            Some(&token),
        )
        .await;
    assert_eq!(added.status(), StatusCode::CREATED);
    let entry_id = response_json(added).await["data"]["id"].as_i64().unwrap();

    let duplicate = app
        .request(
            Method::POST,
            "/api/products/wishlist",
            Some(json!({"product_id": rug})),
            Some(&token),
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let removed = app
        .request(
            Method::DELETE,
            &format!("/api/products/wishlist/{}", entry_id),
            None,
            Some(&token),
        )
        .await;
    assert_eq!(removed.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_public_catalog_endpoints() {
    let app = TestApp::new().await;
    let lighting = app.seed_category("Lighting").await;
    let lamp = app
        .seed_product_in("Table Lamp", dec!(60), Some(lighting), chrono::Utc::now())
        .await;
    app.seed_active_promotion(lamp, dec!(25)).await;

    let listed = app
        .request(Method::GET, "/api/products?name=lamp&limit=5", None, None)
        .await;
    assert_eq!(listed.status(), StatusCode::OK);
    let body = response_json(listed).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["limit"], 5);
    assert_eq!(decimal(&body["data"]["items"][0]["discount_price"]), dec!(45));

    let detail = app
        .request(Method::GET, &format!("/api/products/{}", lamp), None, None)
        .await;
    let body = response_json(detail).await;
    assert_eq!(body["data"]["category"], "Lighting");

    let promoted = app
        .request(Method::GET, "/api/products/weekly-promotion", None, None)
        .await;
    let body = response_json(promoted).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let categories = app
        .request(Method::GET, "/api/categories", None, None)
        .await;
    let body = response_json(categories).await;
    assert_eq!(body["data"][0]["name"], "Lighting");

    let banners = app.request(Method::GET, "/api/banners", None, None).await;
    assert_eq!(banners.status(), StatusCode::OK);

    let missing = app
        .request(Method::GET, "/api/products/987654", None, None)
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_endpoints_and_request_id_echo() {
    let app = TestApp::new().await;

    let health = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(health.status(), StatusCode::OK);
    assert!(health.headers().contains_key("x-request-id"));
    let body = response_json(health).await;
    assert_eq!(body["status"], "up");

    let ready = app.request(Method::GET, "/health/ready", None, None).await;
    assert_eq!(ready.status(), StatusCode::OK);
    let body = response_json(ready).await;
    assert_eq!(body["ready"], true);
    assert_eq!(body["database"], "up");
}

#[tokio::test]
async fn test_unknown_route_is_not_found_without_auth() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/nowhere", None, None).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
