//! Cookie-based JWT authentication.
//!
//! `POST /generate-token` signs a short-lived token carrying the caller's
//! email and stores it in the HTTP-only `token` cookie. Routes wrapped in
//! [`require_token`] reject requests without a valid cookie and expose the
//! decoded claims to handlers through the [`AuthenticatedUser`] extractor.
//!
//! # Usage
//!
//! ```rust,ignore
//! use axum::middleware::from_fn_with_state;
//! use brand_shop::server::auth::{require_token, AuthenticatedUser};
//!
//! let protected = Router::new()
//!     .route("/cart", get(cart_handler))
//!     .route_layer(from_fn_with_state(tokens.clone(), require_token));
//!
//! async fn cart_handler(user: AuthenticatedUser) -> impl IntoResponse {
//!     format!("Hello, {}!", user.email)
//! }
//! ```
//!
//! Logging out only clears the cookie. A copied token stays valid until it
//! expires.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AuthConfig;
use crate::errors::{ShopError, ShopResult};
use crate::server::api_error::ApiError;

/// Name of the cookie carrying the signed token.
pub const TOKEN_COOKIE: &str = "token";

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Email the token was issued for
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Authentication errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No `token` cookie on the request
    #[error("token not found")]
    MissingToken,
    /// Bad signature, malformed token, or expired
    #[error("token is invalid")]
    InvalidToken(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

/// Issues and verifies the tokens stored in the `token` cookie.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiration_secs: u64,
    cookie_secure: bool,
}

impl TokenService {
    /// Create a token service from auth configuration.
    pub fn from_config(config: &AuthConfig) -> ShopResult<Self> {
        if config.jwt_secret.is_empty() {
            return Err(ShopError::ConfigError(
                "jwt_secret is required to sign tokens".to_string(),
            ));
        }

        let secret = config.jwt_secret.as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            expiration_secs: config.token_expiration_secs,
            cookie_secure: config.cookie_secure,
        })
    }

    /// Sign a token for `email`, valid for the configured lifetime.
    pub fn issue(&self, email: &str) -> ShopResult<String> {
        let now = u64::try_from(Utc::now().timestamp())
            .map_err(|e| ShopError::ServerError(format!("system time error: {e}")))?;

        let claims = Claims {
            email: email.to_string(),
            iat: now,
            exp: now + self.expiration_secs,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ShopError::TokenError(format!("failed to create token: {e}")))
    }

    /// Check signature and expiry and return the embedded claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    /// `Set-Cookie` value storing `token`.
    pub fn session_cookie(&self, token: &str) -> String {
        let secure = if self.cookie_secure { "; Secure" } else { "" };
        format!("{TOKEN_COOKIE}={token}; Path=/; HttpOnly{secure}")
    }

    /// `Set-Cookie` value that makes the browser drop the token.
    pub fn revocation_cookie(&self) -> String {
        let secure = if self.cookie_secure { "; Secure" } else { "" };
        format!(
            "{TOKEN_COOKIE}=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly{secure}"
        )
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("expiration_secs", &self.expiration_secs)
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}

/// Value of the `token` cookie, if the request carries a non-empty one.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| name.trim() == TOKEN_COOKIE)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// Middleware gating a route on a valid `token` cookie.
///
/// On success the decoded [`Claims`] are stored in the request extensions.
pub async fn require_token(
    State(tokens): State<Arc<TokenService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let Some(token) = token_from_headers(request.headers()) else {
        debug!(path = %request.uri().path(), "Rejected request without token cookie");
        return Err(AuthError::MissingToken);
    };

    let claims = tokens.verify(&token).map_err(|e| {
        warn!(path = %request.uri().path(), error = ?e, "Rejected request with invalid token");
        e
    })?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Authenticated caller, available on routes behind [`require_token`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// The email the token was issued for
    pub email: String,
    /// Full claims
    pub claims: Claims,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<Claims>()
            .cloned()
            .ok_or(AuthError::MissingToken)?;

        Ok(AuthenticatedUser {
            email: claims.email.clone(),
            claims,
        })
    }
}
