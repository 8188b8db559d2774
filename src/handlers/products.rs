use crate::{
    auth::AuthenticatedUser,
    entities::{banner, category, wishlist},
    errors::ApiError,
    handlers::common::{
        created_response, map_service_error, success_response, validate_input, MessageResponse,
    },
    services::catalog::{CatalogProduct, CatalogProductDetail, ProductQuery},
    ApiResponse, AppState, PaginatedResponse,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductListParams {
    /// Case-insensitive substring of the product name
    pub name: Option<String>,
    pub category_id: Option<i32>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl From<ProductListParams> for ProductQuery {
    fn from(params: ProductListParams) -> Self {
        Self {
            name: params.name,
            category_id: params.category_id,
            page: params.page,
            limit: params.limit,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddWishlistRequest {
    #[validate(range(min = 1))]
    pub product_id: i32,
}

/// Paginated product catalog
#[utoipa::path(
    get,
    path = "/api/products",
    params(ProductListParams),
    responses(
        (status = 200, description = "Products", body = ApiResponse<PaginatedResponse<CatalogProduct>>),
    ),
    tag = "Catalog"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ProductListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .services
        .catalog
        .list_products(params.into())
        .await
        .map_err(map_service_error)?;
    Ok(success_response(page))
}

/// Product detail with the price resolved for today
#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<CatalogProductDetail>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Catalog"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .get_product(id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

/// Products with a promotion running today
#[utoipa::path(
    get,
    path = "/api/products/weekly-promotion",
    responses(
        (status = 200, description = "Promoted products", body = ApiResponse<Vec<CatalogProduct>>),
    ),
    tag = "Catalog"
)]
pub async fn weekly_promotion(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let products = state
        .services
        .catalog
        .weekly_promotion_products()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(products))
}

/// Products ordered most this calendar month
#[utoipa::path(
    get,
    path = "/api/products/best-selling",
    params(PageParams),
    responses(
        (status = 200, description = "Best sellers", body = ApiResponse<PaginatedResponse<CatalogProduct>>),
    ),
    tag = "Catalog"
)]
pub async fn best_selling(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .services
        .catalog
        .best_selling_products(params.page, params.limit)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(page))
}

#[utoipa::path(
    get,
    path = "/api/products/recommendations",
    responses(
        (status = 200, description = "Recommended products", body = ApiResponse<Vec<CatalogProduct>>),
    ),
    tag = "Catalog"
)]
pub async fn recommendations(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let products = state
        .services
        .catalog
        .recommended_products()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(products))
}

#[utoipa::path(
    get,
    path = "/api/categories",
    responses(
        (status = 200, description = "Categories", body = ApiResponse<Vec<category::Model>>),
    ),
    tag = "Catalog"
)]
pub async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let categories = state
        .services
        .catalog
        .categories()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(categories))
}

#[utoipa::path(
    get,
    path = "/api/banners",
    responses(
        (status = 200, description = "Banners", body = ApiResponse<Vec<banner::Model>>),
    ),
    tag = "Catalog"
)]
pub async fn list_banners(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let banners = state
        .services
        .catalog
        .banners()
        .await
        .map_err(map_service_error)?;
    Ok(success_response(banners))
}

/// Save a product to the wishlist
#[utoipa::path(
    post,
    path = "/api/products/wishlist",
    request_body = AddWishlistRequest,
    responses(
        (status = 201, description = "Wishlist entry created", body = ApiResponse<wishlist::Model>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already on the wishlist", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Wishlist"
)]
pub async fn add_wishlist(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<AddWishlistRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let entry = state
        .services
        .wishlist
        .add(user.user_id, payload.product_id)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(entry))
}

#[utoipa::path(
    delete,
    path = "/api/products/wishlist/{id}",
    params(("id" = i32, Path, description = "Wishlist entry id")),
    responses(
        (status = 200, description = "Wishlist entry removed", body = ApiResponse<MessageResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Wishlist entry not found", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Wishlist"
)]
pub async fn remove_wishlist(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .wishlist
        .remove(id, user.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(MessageResponse::new("wishlist entry removed")))
}
