use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    handlers::common::{created_response, map_service_error, validate_input},
    services::orders::OrderResponse,
    ApiResponse, AppState,
};
use axum::{
    extract::{Json, State},
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    /// Products whose pending cart lines are checked out
    #[validate(length(max = 100))]
    pub product_id: Vec<i32>,
    /// Index into the user's saved addresses; defaults to the first one
    pub address_index: Option<usize>,
}

/// Check out the selected cart lines
#[utoipa::path(
    post,
    path = "/api/products/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<OrderResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 409, description = "Cart lines were checked out concurrently", body = crate::errors::ErrorResponse),
        (status = 422, description = "No pending cart lines match the selection", body = crate::errors::ErrorResponse),
        (status = 504, description = "Checkout did not finish in time", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let order = state
        .services
        .orders
        .create_order(user.user_id, &payload.product_id, payload.address_index)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(order))
}
