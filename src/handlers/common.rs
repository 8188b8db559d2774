use crate::{
    errors::{ApiError, ServiceError},
    ApiResponse,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ApiError> {
    input
        .validate()
        .map_err(|e| ApiError::ValidationError(format!("Validation failed: {}", e)))
}

/// Map service errors to API errors
pub fn map_service_error(err: ServiceError) -> ApiError {
    ApiError::ServiceError(err)
}

/// Plain acknowledgement body
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Letters and spaces only, at least one letter.
pub fn validate_person_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_alphabetic() || c == ' ') {
        Ok(())
    } else {
        let mut err = ValidationError::new("name");
        err.message = Some("Name may only contain letters and spaces".into());
        Err(err)
    }
}

/// 10 to 13 digits, optionally prefixed with `+`.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if (10..=13).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone");
        err.message = Some("Phone must be 10 to 13 digits".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Ada Lovelace", true)]
    #[case("Zoë", true)]
    #[case("R2D2", false)]
    #[case("   ", false)]
    #[case("o'brien", false)]
    fn person_names(#[case] name: &str, #[case] ok: bool) {
        assert_eq!(validate_person_name(name).is_ok(), ok);
    }

    #[rstest]
    #[case("0812345678", true)]
    #[case("+6281234567890", true)]
    #[case("12345", false)]
    #[case("08123456789012", false)]
    #[case("08-1234-5678", false)]
    fn phone_numbers(#[case] phone: &str, #[case] ok: bool) {
        assert_eq!(validate_phone(phone).is_ok(), ok);
    }
}
