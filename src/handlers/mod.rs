pub mod account;
pub mod auth;
pub mod carts;
pub mod common;
pub mod orders;
pub mod products;

use crate::{
    auth::AuthService,
    config::AppConfig,
    services::{
        accounts::AccountService, cart::CartService, catalog::CatalogService,
        orders::OrderBuilder, pricing::PricingService, wishlist::WishlistService,
    },
    AppState,
};
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub pricing: PricingService,
    pub cart: CartService,
    pub orders: OrderBuilder,
    pub catalog: CatalogService,
    pub accounts: AccountService,
    pub wishlist: WishlistService,
    pub auth: AuthService,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>, config: &AppConfig) -> Self {
        let pricing = PricingService::new(db.clone(), config.promotion_policy);
        Self {
            cart: CartService::new(db.clone(), pricing.clone()),
            orders: OrderBuilder::new(db.clone(), config.checkout_timeout()),
            catalog: CatalogService::new(
                db.clone(),
                pricing.clone(),
                config.default_page_size,
                config.max_page_size,
            ),
            accounts: AccountService::new(db.clone()),
            wishlist: WishlistService::new(db.clone()),
            auth: AuthService::new(db, config.session_ttl()),
            pricing,
        }
    }
}

/// Routes reachable without a session.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/api/products", get(products::list_products))
        .route("/api/products/weekly-promotion", get(products::weekly_promotion))
        .route("/api/products/best-selling", get(products::best_selling))
        .route("/api/products/recommendations", get(products::recommendations))
        .route("/api/products/{id}", get(products::get_product))
        .route("/api/categories", get(products::list_categories))
        .route("/api/banners", get(products::list_banners))
}

/// Routes that require a bearer session. The caller adds the auth layer.
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/api/account/detail-user", get(account::detail_user))
        .route("/api/account/update-user", put(account::update_user))
        .route(
            "/api/account/address",
            get(account::list_addresses).post(account::add_address),
        )
        .route("/api/account/address/{index}", delete(account::delete_address))
        .route("/api/account/address-default", post(account::address_default))
        .route(
            "/api/products/carts",
            get(carts::list_cart)
                .post(carts::add_to_cart)
                .put(carts::update_cart),
        )
        .route("/api/products/carts/{id}", delete(carts::delete_cart_line))
        .route("/api/products/total-carts", get(carts::total_carts))
        .route("/api/products/orders", post(orders::create_order))
        .route("/api/products/wishlist", post(products::add_wishlist))
        .route("/api/products/wishlist/{id}", delete(products::remove_wishlist))
}
