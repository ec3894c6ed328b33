use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DbErr, SqlErr};
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;
use validator::ValidationErrors;

use crate::middleware::logging::to_response;

/// Messages keyed by the payload field they belong to.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Error, Clone, Debug)]
pub enum ApiError {
    #[error("Validation failed: {0:?}")]
    Validation(FieldErrors),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Authentication required: {0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Failed to hash password: {0}")]
    PasswordHash(String),
    #[error("Failed to generate token: {0}")]
    TokenGeneration(String),
    #[error("Database error: {0}")]
    Db(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ApiError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        ApiError::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::PasswordHash(_)
            | ApiError::TokenGeneration(_)
            | ApiError::Db(_)
            | ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        ApiError::Db(err.to_string())
    }
}

/// Turns a unique-constraint violation into a field error, anything else into
/// an internal one.
pub fn conflict_or_db(err: DbErr, field: &str, message: &str) -> ApiError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => ApiError::field(field, message),
        _ => err.into(),
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(collect_field_errors(&errors))
    }
}

pub fn collect_field_errors(errors: &ValidationErrors) -> FieldErrors {
    let mut collected = FieldErrors::new();
    for (field, errs) in errors.field_errors() {
        let messages = collected.entry(field.to_string()).or_default();
        for err in errs.iter() {
            let message = match &err.message {
                Some(message) => message.to_string(),
                None => format!("Invalid value ({})", err.code),
            };
            messages.push(message);
        }
    }
    collected
}

/// Merges the derive-based checks with hand-written ones and fails if either
/// produced anything.
pub fn ensure_valid(
    derived: Result<(), ValidationErrors>,
    extra: FieldErrors,
) -> Result<(), ApiError> {
    let mut errors = match derived {
        Ok(()) => FieldErrors::new(),
        Err(errors) => collect_field_errors(&errors),
    };
    for (field, messages) in extra {
        errors.entry(field).or_default().extend(messages);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Validation(errors) => json!(errors),
            ApiError::BadRequest(message)
            | ApiError::NotFound(message)
            | ApiError::Unauthorized(message)
            | ApiError::Forbidden(message) => json!({ "error": message }),
            _ => json!({ "error": "Internal server error" }),
        };

        to_response((status, Json(body)), Err(self))
    }
}
