use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    handlers::common::{
        created_response, map_service_error, success_response, validate_input,
        validate_person_name, validate_phone,
    },
    services::accounts::{ProfileUpdate, UserProfile},
    ApiResponse, AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 3), custom = "validate_person_name")]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
    pub old_password: Option<String>,
    #[validate(length(min = 8))]
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddAddressRequest {
    #[validate(length(min = 1, max = 500))]
    pub address: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddressIndexRequest {
    pub index: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddressResponse {
    pub address: String,
}

/// Current user's profile
#[utoipa::path(
    get,
    path = "/api/account/detail-user",
    responses(
        (status = 200, description = "Profile", body = ApiResponse<UserProfile>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Account"
)]
pub async fn detail_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .services
        .accounts
        .detail(user.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(profile))
}

/// Update name, email, phone or password
#[utoipa::path(
    put,
    path = "/api/account/update-user",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Profile updated", body = ApiResponse<UserProfile>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized or old password mismatch", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email or phone already registered", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Account"
)]
pub async fn update_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let update = ProfileUpdate {
        name: payload.name.map(|n| n.trim().to_string()),
        email: payload.email,
        phone: payload.phone,
        old_password: payload.old_password,
        new_password: payload.new_password,
    };
    let profile = state
        .services
        .accounts
        .update_profile(user.user_id, update)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(profile))
}

/// Saved shipping addresses
#[utoipa::path(
    get,
    path = "/api/account/address",
    responses(
        (status = 200, description = "Addresses", body = ApiResponse<Vec<String>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Account"
)]
pub async fn list_addresses(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let addresses = state
        .services
        .accounts
        .list_addresses(user.user_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(addresses))
}

/// Append a shipping address
#[utoipa::path(
    post,
    path = "/api/account/address",
    request_body = AddAddressRequest,
    responses(
        (status = 201, description = "Address saved", body = ApiResponse<Vec<String>>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Account"
)]
pub async fn add_address(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<AddAddressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let addresses = state
        .services
        .accounts
        .add_address(user.user_id, payload.address.trim().to_string())
        .await
        .map_err(map_service_error)?;
    Ok(created_response(addresses))
}

/// Remove the address at `index`
#[utoipa::path(
    delete,
    path = "/api/account/address/{index}",
    params(("index" = usize, Path, description = "Zero-based address index")),
    responses(
        (status = 200, description = "Remaining addresses", body = ApiResponse<Vec<String>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "No address at index", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Account"
)]
pub async fn delete_address(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(index): Path<usize>,
) -> Result<impl IntoResponse, ApiError> {
    let addresses = state
        .services
        .accounts
        .delete_address(user.user_id, index)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(addresses))
}

/// Address at `index`, falling back to the first saved address
#[utoipa::path(
    post,
    path = "/api/account/address-default",
    request_body = AddressIndexRequest,
    responses(
        (status = 200, description = "Selected address", body = ApiResponse<AddressResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "No saved address", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Account"
)]
pub async fn address_default(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<AddressIndexRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let address = state
        .services
        .accounts
        .address_at(user.user_id, payload.index)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(AddressResponse { address }))
}
