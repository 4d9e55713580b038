use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

use crate::domain::restaurant::RestaurantValidationError;
use crate::repository::errors::RepositoryError;

#[derive(Debug, Error, PartialEq)]
pub enum UsecaseError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Internal(String),
}

impl UsecaseError {
    pub fn restaurant_not_found() -> Self {
        UsecaseError::NotFound("Restaurant".to_string())
    }
}

/// For writes keyed by restaurant id: a missing row is that restaurant.
pub fn not_found_as_restaurant(e: RepositoryError) -> UsecaseError {
    match e {
        RepositoryError::NotFound => UsecaseError::restaurant_not_found(),
        other => other.into(),
    }
}

impl From<RepositoryError> for UsecaseError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => UsecaseError::NotFound("Resource".to_string()),
            RepositoryError::DatabaseError(msg) => UsecaseError::Internal(msg),
        }
    }
}

impl From<RestaurantValidationError> for UsecaseError {
    fn from(e: RestaurantValidationError) -> Self {
        UsecaseError::Validation(e.to_string())
    }
}

impl IntoResponse for UsecaseError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            UsecaseError::NotFound(_) => StatusCode::NOT_FOUND,
            UsecaseError::Validation(_) | UsecaseError::InvalidTransition(_) => {
                StatusCode::BAD_REQUEST
            }
            UsecaseError::Conflict(_) => StatusCode::CONFLICT,
            UsecaseError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            UsecaseError::Forbidden(_) => StatusCode::FORBIDDEN,
            UsecaseError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            UsecaseError::Internal(_) => {
                tracing::error!(error = %self, "internal error");
                "Internal server error".to_string()
            }
            UsecaseError::NotFound(_) => {
                tracing::warn!(error = %self, "resource not found");
                self.to_string()
            }
            UsecaseError::Unauthorized(_) | UsecaseError::Forbidden(_) => {
                tracing::warn!(error = %self, "access denied");
                self.to_string()
            }
            _ => {
                tracing::debug!(error = %self);
                self.to_string()
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
