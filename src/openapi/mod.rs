use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "0.1.0",
        description = r#"
# Storefront API

Catalog browsing, carts, wishlists and checkout for a single storefront.

## Authentication

Log in with `POST /auth/login` and send the returned token on protected routes:

```
Authorization: Bearer <token>
```

## Prices

Money is serialized as decimal strings. The cart captures the unit price,
including any weekly promotion, when a product is first added.

## Error Handling

```json
{
  "error": "Unprocessable Entity",
  "message": "Empty order: no pending cart lines match the requested products",
  "request_id": "8c1f...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Auth", description = "Registration and sessions"),
        (name = "Account", description = "Profile and saved addresses"),
        (name = "Catalog", description = "Products, categories and banners"),
        (name = "Cart", description = "Pending cart lines"),
        (name = "Orders", description = "Checkout"),
        (name = "Wishlist", description = "Saved products"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Auth
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::logout,

        // Account
        crate::handlers::account::detail_user,
        crate::handlers::account::update_user,
        crate::handlers::account::list_addresses,
        crate::handlers::account::add_address,
        crate::handlers::account::delete_address,
        crate::handlers::account::address_default,

        // Catalog
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::weekly_promotion,
        crate::handlers::products::best_selling,
        crate::handlers::products::recommendations,
        crate::handlers::products::list_categories,
        crate::handlers::products::list_banners,

        // Cart
        crate::handlers::carts::list_cart,
        crate::handlers::carts::total_carts,
        crate::handlers::carts::add_to_cart,
        crate::handlers::carts::update_cart,
        crate::handlers::carts::delete_cart_line,

        // Orders
        crate::handlers::orders::create_order,

        // Wishlist
        crate::handlers::products::add_wishlist,
        crate::handlers::products::remove_wishlist,

        // Health
        crate::health::health_check,
        crate::health::readiness_check,
    ),
    components(
        schemas(
            crate::ResponseMeta,
            crate::handlers::common::MessageResponse,
            crate::handlers::auth::RegisterRequest,
            crate::handlers::auth::LoginRequest,
            crate::auth::LoginResult,
            crate::services::accounts::UserProfile,
            crate::handlers::account::UpdateUserRequest,
            crate::handlers::account::AddAddressRequest,
            crate::handlers::account::AddressIndexRequest,
            crate::handlers::account::AddressResponse,
            crate::services::catalog::CatalogProduct,
            crate::services::catalog::CatalogProductDetail,
            crate::handlers::carts::AddCartLineRequest,
            crate::handlers::carts::UpdateCartLineRequest,
            crate::handlers::carts::CartLineResponse,
            crate::handlers::carts::CartCountResponse,
            crate::services::cart::CartLineView,
            crate::handlers::orders::CreateOrderRequest,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderLineSnapshot,
            crate::handlers::products::AddWishlistRequest,
            crate::health::HealthInfo,
            crate::health::ReadinessInfo,
            crate::health::HealthStatus,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

/// Registers the `bearer_auth` scheme referenced by protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_storefront_routes() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Storefront API"));
        assert!(json.contains("/api/products/orders"));
        assert!(json.contains("/api/products/carts/{id}"));
        assert!(json.contains("bearer_auth"));
    }
}
