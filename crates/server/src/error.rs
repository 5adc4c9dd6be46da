//! HTTP error responses.
//!
//! Only [`PublicError`] kinds and transport-level problems are rendered;
//! internal detail stays in the logs.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use renfound_application::{AuthError, PublicError};
use serde::Serialize;

/// A request field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// JSON name of the field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: &'static str,
}

impl FieldError {
    /// The field was absent or blank.
    #[must_use]
    pub const fn required(field: &'static str) -> Self {
        Self {
            field,
            message: "This field is required",
        }
    }
}

/// Error returned by handlers and extractors.
#[derive(Debug)]
pub enum ApiError {
    /// A collapsed auth or user error.
    Public(PublicError),
    /// The body could not be parsed.
    BadRequest(String),
    /// The body parsed but fields are missing.
    Validation(Vec<FieldError>),
    /// The `Authorization` header is missing or malformed.
    Unauthorized(&'static str),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<FieldError>,
}

const fn public_status(error: PublicError) -> StatusCode {
    match error {
        PublicError::InvalidCredentials => StatusCode::BAD_REQUEST,
        PublicError::InvalidToken | PublicError::TokenExpired => StatusCode::UNAUTHORIZED,
        PublicError::UserNotFound => StatusCode::NOT_FOUND,
        PublicError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        Self::Public(error.public())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Public(error) => (
                public_status(error),
                ErrorBody {
                    error: error.to_string(),
                    description: None,
                    errors: Vec::new(),
                },
            ),
            Self::BadRequest(description) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "bad request".to_string(),
                    description: Some(description),
                    errors: Vec::new(),
                },
            ),
            Self::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "validation error".to_string(),
                    description: Some("Validation failed".to_string()),
                    errors,
                },
            ),
            Self::Unauthorized(description) => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    error: "unauthorized".to_string(),
                    description: Some(description.to_string()),
                    errors: Vec::new(),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}
