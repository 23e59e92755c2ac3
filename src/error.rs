// Error types for the catalog core and their conversion into HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

// Failures talking to the vehicle backend (fetch/create/update/delete).
// Clone so one in-flight reload result can be handed to every waiter.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RepositoryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode backend response: {0}")]
    Decode(String),

    #[error("Vehicle not found: {0}")]
    NotFound(String),

    #[error("Backend configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for RepositoryError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            RepositoryError::Decode(error.to_string())
        } else {
            RepositoryError::Network(error.to_string())
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum UploadError {
    #[error("Network error during upload: {0}")]
    Network(String),

    #[error("Storage returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Upload rejected: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for UploadError {
    fn from(error: reqwest::Error) -> Self {
        UploadError::Network(error.to_string())
    }
}

// Malformed filter values or vehicle payloads.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Inverted {field} range: min {min} is greater than max {max}")]
    InvertedRange { field: &'static str, min: f64, max: f64 },

    #[error("Unknown vehicle field: {0}")]
    UnknownField(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Missing required value: {0}")]
    Missing(&'static str),
}

// Everything a CatalogStore operation can fail with.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Vehicle not found: {0}")]
    NotFound(String),
}

// Failures persisting selection sets to disk.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// Application error returned by HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    BadGateway(String),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
}

impl From<CatalogError> for AppError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::Repository(RepositoryError::NotFound(id)) | CatalogError::NotFound(id) => {
                AppError::NotFound(format!("Vehicle not found: {}", id))
            }
            CatalogError::Repository(e) => AppError::BadGateway(e.to_string()),
            CatalogError::Upload(e) => AppError::BadGateway(e.to_string()),
            CatalogError::Validation(e) => AppError::BadRequest(e.to_string()),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(error: ValidationError) -> Self {
        AppError::BadRequest(error.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadGateway(message) => {
                tracing::error!("Backend failure: {}", message);
                (StatusCode::BAD_GATEWAY, message)
            }
            AppError::BadRequest(message) => {
                tracing::warn!("Bad request: {}", message);
                (StatusCode::BAD_REQUEST, message)
            }
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AppError::Conflict(message) => (StatusCode::CONFLICT, message),
        };

        (status, error_message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_errors_map_to_http_statuses() {
        let cases = [
            (CatalogError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                CatalogError::Repository(RepositoryError::NotFound("x".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                CatalogError::Repository(RepositoryError::Network("down".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                CatalogError::Upload(UploadError::Rejected("too big".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                CatalogError::Validation(ValidationError::Missing("brand")),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (error, expected) in cases {
            let response = AppError::from(error).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
