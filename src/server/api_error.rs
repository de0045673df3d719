//! Standardized API error responses for all shop endpoints.
//!
//! # Response Format
//!
//! All error responses follow this JSON structure:
//!
//! ```json
//! {
//!   "error": {
//!     "code": "MISSING_TOKEN",
//!     "message": "token not found"
//!   }
//! }
//! ```
//!
//! Database failures are logged with their detail and reported to the client
//! with the generic message only.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::errors::ShopError;
use crate::server::auth::AuthError;
use crate::server::validation::ValidationError;

/// Machine-readable error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // === Request Errors (400) ===
    /// Request payload is invalid or malformed
    InvalidRequest,
    /// A path identifier is not a valid document id
    MalformedIdentifier,

    // === Authentication Errors (401/403) ===
    /// No `token` cookie on the request
    MissingToken,
    /// The `token` cookie failed verification or has expired
    InvalidToken,
    /// Authenticated, but not allowed to access this resource
    Forbidden,

    // === Server Errors (5xx) ===
    /// Database operation failed
    DatabaseError,
    /// Server configuration error
    ConfigError,
    /// Unexpected internal server error
    InternalError,
}

impl ErrorCode {
    /// Returns the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidRequest | ErrorCode::MalformedIdentifier => StatusCode::BAD_REQUEST,
            ErrorCode::MissingToken | ErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::DatabaseError | ErrorCode::ConfigError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns a default human-readable message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "Request payload is invalid",
            ErrorCode::MalformedIdentifier => "malformed identifier",
            ErrorCode::MissingToken => "token not found",
            ErrorCode::InvalidToken => "token is invalid",
            ErrorCode::Forbidden => "Access to this resource is not allowed",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::ConfigError => "Server configuration error",
            ErrorCode::InternalError => "An unexpected error occurred",
        }
    }
}

/// The inner error object containing code, message, and optional details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details (field name, constraint violated, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Standardized API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// The error details
    pub error: ErrorBody,
}

impl ApiError {
    /// Creates a new API error with the default message for `code`.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: code.default_message().to_string(),
                details: None,
            },
        }
    }

    /// Creates a new API error with a custom message.
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: message.into(),
                details: None,
            },
        }
    }

    /// Creates a new API error with a custom message and details.
    pub fn with_details(
        code: ErrorCode,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.error.code.status_code()
    }

    /// Identifier that could not be converted to a document id.
    pub fn malformed_identifier(field: &str, reason: &str) -> Self {
        Self::with_details(
            ErrorCode::MalformedIdentifier,
            format!("malformed identifier: {reason}"),
            serde_json::json!({ "field": field }),
        )
    }

    /// Cart lookup for an email other than the token's.
    pub fn email_mismatch() -> Self {
        Self::with_message(
            ErrorCode::Forbidden,
            "requested email does not match the authenticated user",
        )
    }

    /// Database error (internal details hidden from client).
    pub fn database_error() -> Self {
        Self::new(ErrorCode::DatabaseError)
    }

    /// Internal server error.
    pub fn internal_error() -> Self {
        Self::new(ErrorCode::InternalError)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.error.code, self.error.message)
    }
}

impl std::error::Error for ApiError {}

// === Conversions from other error types ===

impl From<ShopError> for ApiError {
    fn from(err: ShopError) -> Self {
        match err {
            ShopError::InvalidDocument(msg) => ApiError::with_message(ErrorCode::InvalidRequest, msg),
            ShopError::DatabaseError(msg) => {
                error!("Database failure surfaced to client as 500: {msg}");
                ApiError::database_error()
            }
            ShopError::ConfigError(msg) => {
                error!("Configuration failure surfaced to client as 500: {msg}");
                ApiError::new(ErrorCode::ConfigError)
            }
            ShopError::TokenError(msg) | ShopError::ServerError(msg) => {
                error!("Internal failure surfaced to client as 500: {msg}");
                ApiError::internal_error()
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => ApiError::new(ErrorCode::MissingToken),
            AuthError::InvalidToken(_) => ApiError::new(ErrorCode::InvalidToken),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::malformed_identifier(&err.field, &err.message)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::with_message(ErrorCode::InvalidRequest, rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::with_message(ErrorCode::InvalidRequest, rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::with_message(ErrorCode::InvalidRequest, rejection.body_text())
    }
}
