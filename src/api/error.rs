//! Mapping from domain failures to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::auth::AuthRejection;
use crate::domain::DomainError;

pub const VALIDATION_MESSAGE: &str = "Girilen bilgiler geçersiz.";
const INTERNAL_MESSAGE: &str = "Beklenmeyen bir hata oluştu. Lütfen tekrar deneyin.";

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: Value,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "message": message.into() }),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Validation(errors) => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                body: json!({ "message": VALIDATION_MESSAGE, "errors": errors }),
            },
            DomainError::NotFound(msg) => Self::new(StatusCode::NOT_FOUND, msg),
            DomainError::Unauthorized(msg) => Self::unauthorized(msg),
            DomainError::Forbidden(msg) => Self::new(StatusCode::FORBIDDEN, msg),
            DomainError::InvalidState(msg) => Self::new(StatusCode::BAD_REQUEST, msg),
            DomainError::InvalidTransition(msg) => Self::new(StatusCode::UNPROCESSABLE_ENTITY, msg),
            DomainError::Conflict(msg) => Self::new(StatusCode::CONFLICT, msg),
            DomainError::External(msg) => Self::new(StatusCode::SERVICE_UNAVAILABLE, msg),
            DomainError::Database(detail) | DomainError::Internal(detail) => {
                tracing::error!("Request failed: {}", detail);
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
            }
        }
    }
}

impl From<AuthRejection> for ApiError {
    fn from((status, Json(body)): AuthRejection) -> Self {
        Self { status, body }
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(e: sea_orm::DbErr) -> Self {
        DomainError::from(e).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldErrors;

    #[test]
    fn validation_carries_field_errors() {
        let mut errors = FieldErrors::default();
        errors.add("name", "Ad zorunludur");
        let api: ApiError = DomainError::Validation(errors).into();
        assert_eq!(api.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(api.body["message"], VALIDATION_MESSAGE);
        assert_eq!(api.body["errors"]["name"][0], "Ad zorunludur");
    }

    #[test]
    fn internal_details_are_not_leaked() {
        let api: ApiError = DomainError::Database("no such table: items".into()).into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.body["message"].as_str().unwrap().contains("items"));
    }

    #[test]
    fn workflow_errors_use_distinct_statuses() {
        let state: ApiError = DomainError::invalid_state("x").into();
        let transition: ApiError = DomainError::InvalidTransition("y".into()).into();
        let conflict: ApiError = DomainError::Conflict("z".into()).into();
        assert_eq!(state.status, StatusCode::BAD_REQUEST);
        assert_eq!(transition.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(conflict.status, StatusCode::CONFLICT);
    }
}
