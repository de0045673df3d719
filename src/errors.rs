use thiserror::Error;

/// Failures raised by the library layers (config, storage, tokens).
///
/// HTTP handlers convert these into [`crate::server::api_error::ApiError`]
/// before they reach the client.
#[derive(Debug, Error)]
pub enum ShopError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("token error: {0}")]
    TokenError(String),

    #[error("server error: {0}")]
    ServerError(String),
}

pub type ShopResult<T> = Result<T, ShopError>;

impl From<config::ConfigError> for ShopError {
    fn from(err: config::ConfigError) -> Self {
        ShopError::ConfigError(err.to_string())
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for ShopError {
    fn from(err: mongodb::error::Error) -> Self {
        ShopError::DatabaseError(err.to_string())
    }
}
