//! Boundary conversion of request values into storage types.
//!
//! Path parameters arrive as free-form strings. Anything addressed by
//! identifier is converted here, before the data layer sees it.

use std::fmt;

use bson::oid::ObjectId;

/// Validation error type.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Parse a document identifier (24 hexadecimal characters).
///
/// # Example
/// ```
/// use brand_shop::server::validation::parse_object_id;
///
/// assert!(parse_object_id("652f1c2b9d3e4a0012345678", "id").is_ok());
/// assert!(parse_object_id("not-an-id", "id").is_err());
/// ```
pub fn parse_object_id(value: &str, field_name: &str) -> ValidationResult<ObjectId> {
    ObjectId::parse_str(value.trim()).map_err(|_| ValidationError {
        field: field_name.to_string(),
        message: format!("'{value}' is not a valid identifier (expected 24 hex characters)"),
    })
}
