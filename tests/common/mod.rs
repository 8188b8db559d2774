#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use chrono::{Duration, NaiveDate, Utc};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, Set};
use serde_json::{json, Value};
use storefront_api::{
    auth::RegisterInput,
    build_router,
    config::AppConfig,
    db::{self, DbConfig},
    entities::{category, product, rating, recommendation, weekly_promotion},
    AppState,
};
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Helper harness for spinning up an application backed by a SQLite database.
///
/// The default database lives in memory behind a single connection. Tests
/// that need transactions to overlap use [`TestApp::on_sqlite_file`].
pub struct TestApp {
    router: Router,
    pub state: AppState,
    db_file: Option<(TempDir, PathBuf)>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Like [`TestApp::new`] with configuration tweaks applied first.
    pub async fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:", "test");
        cfg.cors_allow_any_origin = true;
        tweak(&mut cfg);

        Self::build(cfg, &DbConfig::sqlite_in_memory(), None).await
    }

    /// Application over a temporary SQLite file with a multi-connection pool.
    pub async fn on_sqlite_file() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir for test database");
        let path = dir.path().join("storefront.db");
        let mut cfg = AppConfig::new(format!("sqlite://{}?mode=rwc", path.display()), "test");
        cfg.cors_allow_any_origin = true;

        let db_cfg = DbConfig::sqlite_file(&path);
        Self::build(cfg, &db_cfg, Some((dir, path))).await
    }

    async fn build(cfg: AppConfig, db_cfg: &DbConfig, db_file: Option<(TempDir, PathBuf)>) -> Self {
        let pool = db::establish_connection_with_config(db_cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = build_router(state.clone());

        Self {
            router,
            state,
            db_file,
        }
    }

    /// Path of the backing file for apps built with [`TestApp::on_sqlite_file`].
    pub fn db_path(&self) -> Option<&Path> {
        self.db_file.as_ref().map(|(_, path)| path.as_path())
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Registers a user through the service layer and returns its id.
    pub async fn seed_user(&self, email: &str, addresses: &[&str]) -> i32 {
        let profile = self
            .state
            .services
            .auth
            .register(RegisterInput {
                name: "Test Shopper".to_string(),
                email: Some(email.to_string()),
                phone: None,
                password: TEST_PASSWORD.to_string(),
            })
            .await
            .expect("seed user for tests");

        for address in addresses {
            self.state
                .services
                .accounts
                .add_address(profile.id, address.to_string())
                .await
                .expect("seed address for tests");
        }
        profile.id
    }

    /// Registers a user and logs in, returning `(user_id, token)`.
    pub async fn login_user(&self, email: &str, addresses: &[&str]) -> (i32, String) {
        let user_id = self.seed_user(email, addresses).await;
        let session = self
            .state
            .services
            .auth
            .login(email, TEST_PASSWORD)
            .await
            .expect("login seeded user");
        (user_id, session.token)
    }

    pub async fn seed_category(&self, name: &str) -> i32 {
        category::ActiveModel {
            id: NotSet,
            name: Set(name.to_string()),
            image: Set(None),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed category for tests")
        .id
    }

    pub async fn seed_product(&self, name: &str, price: Decimal) -> i32 {
        self.seed_product_in(name, price, None, Utc::now()).await
    }

    pub async fn seed_product_in(
        &self,
        name: &str,
        price: Decimal,
        category_id: Option<i32>,
        created_at: chrono::DateTime<Utc>,
    ) -> i32 {
        let slug = name.to_lowercase().replace(' ', "-");
        product::ActiveModel {
            id: NotSet,
            category_id: Set(category_id),
            name: Set(name.to_string()),
            description: Set(Some(format!("{} seeded for integration tests", name))),
            price: Set(price),
            images: Set(json!([format!("{}-front.jpg", slug), format!("{}-back.jpg", slug)])),
            created_at: Set(created_at),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product for tests")
        .id
    }

    pub async fn seed_promotion(
        &self,
        product_id: i32,
        start_date: NaiveDate,
        end_date: NaiveDate,
        discount_percentage: Decimal,
    ) -> i32 {
        weekly_promotion::ActiveModel {
            id: NotSet,
            product_id: Set(product_id),
            start_date: Set(start_date),
            end_date: Set(end_date),
            discount_percentage: Set(discount_percentage),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed promotion for tests")
        .id
    }

    /// A promotion window covering today.
    pub async fn seed_active_promotion(&self, product_id: i32, discount_percentage: Decimal) -> i32 {
        let today = Utc::now().date_naive();
        self.seed_promotion(
            product_id,
            today - Duration::days(1),
            today + Duration::days(6),
            discount_percentage,
        )
        .await
    }
}

impl TestApp {
    pub async fn seed_rating(&self, user_id: i32, product_id: i32, score: i32) -> i32 {
        rating::ActiveModel {
            id: NotSet,
            user_id: Set(user_id),
            product_id: Set(product_id),
            rating: Set(score),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed rating for tests")
        .id
    }

    pub async fn seed_recommendation(&self, product_id: i32) -> i32 {
        recommendation::ActiveModel {
            id: NotSet,
            product_id: Set(product_id),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed recommendation for tests")
        .id
    }

    /// Puts `product_id` in the cart and checks it out as its own order.
    pub async fn seed_order(&self, user_id: i32, product_id: i32) -> i32 {
        self.state
            .services
            .cart
            .add_line(user_id, product_id)
            .await
            .expect("seed cart line for tests");
        self.state
            .services
            .orders
            .create_order(user_id, &[product_id], None)
            .await
            .expect("seed order for tests")
            .order_id
    }
}

/// Reads a response body as JSON.
pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read response body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("response body is json")
}
