//! Structured logging for the shop server.
//!
//! This module provides:
//! - Subscriber initialisation from [`LoggingConfig`]
//! - Per-request spans with a unique request ID, timing and status
//! - Request ID propagation in the `X-Request-Id` response header
//! - Audit events for catalog and cart mutations
//!
//! # Usage
//!
//! ```rust,ignore
//! use axum::middleware::from_fn;
//! use brand_shop::server::logging::request_logging_middleware;
//!
//! let app = Router::new()
//!     .route("/", get(root_handler))
//!     .layer(from_fn(request_logging_middleware));
//! ```

use std::str::FromStr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, Response},
    middleware::Next,
};
use tracing::{info, info_span, warn, Instrument, Level};
use uuid::Uuid;

use crate::config::LoggingConfig;

/// Install the global fmt subscriber. Does nothing when logging is disabled.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    if !config.enabled {
        return true;
    }

    let level = Level::from_str(&config.level).unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Catalog and session events worth an audit line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogEvent {
    /// A product was added to the catalog
    ProductCreated,
    /// Product fields were changed
    ProductUpdated,
    /// An item was put in a cart
    CartItemAdded,
    /// An item was removed from a cart
    CartItemRemoved,
    /// A token cookie was issued
    TokenIssued,
    /// The token cookie was cleared
    TokenCleared,
}

impl std::fmt::Display for CatalogEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CatalogEvent::ProductCreated => "product_created",
            CatalogEvent::ProductUpdated => "product_updated",
            CatalogEvent::CartItemAdded => "cart_item_added",
            CatalogEvent::CartItemRemoved => "cart_item_removed",
            CatalogEvent::TokenIssued => "token_issued",
            CatalogEvent::TokenCleared => "token_cleared",
        };
        write!(f, "{}", s)
    }
}

/// Log a catalog event.
///
/// # Arguments
///
/// * `event` - The type of event
/// * `subject` - Document id or email the event concerns
/// * `details` - Optional additional details about the event
pub fn log_catalog_event(event: CatalogEvent, subject: &str, details: Option<&str>) {
    let span = info_span!(
        "catalog_event",
        event = %event,
        subject = %subject,
    );
    let _enter = span.enter();

    match details {
        Some(d) => info!(details = %d, "Catalog event occurred"),
        None => info!("Catalog event occurred"),
    }
}

/// Header name for the request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Generate a new unique request ID.
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Logging middleware that tracks request timing and generates request IDs.
///
/// Server errors are logged at `warn`, everything else at `info`.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response<Body> {
    let request_id = generate_request_id();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    let start = Instant::now();
    let response = next.run(request).instrument(span.clone()).await;
    let duration = start.elapsed();
    let status = response.status();

    let _enter = span.enter();
    if status.is_server_error() {
        warn!(
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Request failed"
        );
    } else {
        info!(
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Request completed"
        );
    }

    let (mut parts, body) = response.into_parts();
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        parts.headers.insert(REQUEST_ID_HEADER, header_value);
    }

    Response::from_parts(parts, body)
}
