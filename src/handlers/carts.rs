use crate::{
    auth::AuthenticatedUser,
    entities::order_item,
    errors::ApiError,
    handlers::common::{
        created_response, map_service_error, success_response, validate_input, MessageResponse,
    },
    services::cart::CartLineView,
    ApiResponse, AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddCartLineRequest {
    #[validate(range(min = 1))]
    pub product_id: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCartLineRequest {
    #[validate(range(min = 1))]
    pub product_id: i32,
    /// New quantity; zero removes the line
    #[validate(range(min = 0))]
    pub quantity: i32,
}

/// Stored state of a pending line after a write
#[derive(Debug, Serialize, ToSchema)]
pub struct CartLineResponse {
    pub id: i32,
    pub product_id: i32,
    pub quantity: i32,
    #[schema(value_type = String, example = "80.00")]
    pub price: Decimal,
    #[schema(value_type = String, example = "160.00")]
    pub total: Decimal,
}

impl From<order_item::Model> for CartLineResponse {
    fn from(line: order_item::Model) -> Self {
        Self {
            id: line.id,
            product_id: line.product_id,
            quantity: line.quantity,
            price: line.price,
            total: line.total,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartCountResponse {
    pub total: u64,
}

/// Pending cart lines
#[utoipa::path(
    get,
    path = "/api/products/carts",
    responses(
        (status = 200, description = "Cart lines", body = ApiResponse<Vec<CartLineView>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn list_cart(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let lines = state
        .services
        .cart
        .list_lines(user.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(lines))
}

/// Number of pending cart lines
#[utoipa::path(
    get,
    path = "/api/products/total-carts",
    responses(
        (status = 200, description = "Line count", body = ApiResponse<CartCountResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn total_carts(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let total = state
        .services
        .cart
        .count_lines(user.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(CartCountResponse { total }))
}

/// Add one unit of a product to the cart
#[utoipa::path(
    post,
    path = "/api/products/carts",
    request_body = AddCartLineRequest,
    responses(
        (status = 201, description = "Line created or incremented", body = ApiResponse<CartLineResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<AddCartLineRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let line = state
        .services
        .cart
        .add_line(user.user_id, payload.product_id)
        .await
        .map_err(map_service_error)?;
    Ok(created_response(CartLineResponse::from(line)))
}

/// Set the quantity of a pending line
#[utoipa::path(
    put,
    path = "/api/products/carts",
    request_body = UpdateCartLineRequest,
    responses(
        (status = 200, description = "Line updated, or removed when quantity is zero", body = ApiResponse<Option<CartLineResponse>>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "No pending line for product", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_cart(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateCartLineRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let line = state
        .services
        .cart
        .update_quantity(user.user_id, payload.product_id, payload.quantity)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(line.map(CartLineResponse::from)))
}

/// Delete a pending line
#[utoipa::path(
    delete,
    path = "/api/products/carts/{id}",
    params(("id" = i32, Path, description = "Cart line id")),
    responses(
        (status = 200, description = "Line deleted", body = ApiResponse<MessageResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Line not found", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn delete_cart_line(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .cart
        .delete_line(id, user.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(MessageResponse::new("cart line deleted")))
}
