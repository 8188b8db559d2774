use crate::{
    auth::{AuthenticatedUser, LoginResult, RegisterInput},
    errors::ApiError,
    handlers::common::{
        created_response, map_service_error, success_response, validate_input,
        validate_person_name, validate_phone, MessageResponse,
    },
    services::accounts::UserProfile,
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
pub struct RegisterRequest {
    #[validate(length(min = 3), custom = "validate_person_name")]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
    #[validate(length(min = 8))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    /// Email address or phone number
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Register a new customer account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<UserProfile>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email or phone already registered", body = crate::errors::ErrorResponse),
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let profile = state
        .services
        .auth
        .register(RegisterInput {
            name: payload.name.trim().to_string(),
            email: payload.email,
            phone: payload.phone,
            password: payload.password,
        })
        .await
        .map_err(map_service_error)?;

    Ok(created_response(profile))
}

/// Log in with email or phone and receive a bearer token
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened", body = ApiResponse<LoginResult>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid username or password", body = crate::errors::ErrorResponse),
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let session = state
        .services
        .auth
        .login(payload.username.trim(), &payload.password)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(session))
}

/// End the current session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Session closed", body = ApiResponse<MessageResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .auth
        .logout(user.session_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(MessageResponse::new("logged out")))
}
