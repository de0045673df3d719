// src/server/mod.rs

//! Server-side components.
//!
//! This module contains:
//! - `api_error`   → JSON error envelope and status mapping
//! - `auth`        → Token service, cookie handling and the auth middleware
//! - `database`    → Document store over MongoDB or memory
//! - `handlers`    → Axum HTTP handlers, one per endpoint
//! - `logging`     → Subscriber setup, request logging, catalog events
//! - `memory`      → In-memory backend used by tests and local runs
//! - `routes`      → Router, CORS and middleware assembly
//! - `validation`  → Identifier parsing at the HTTP boundary

pub mod api_error;
pub mod auth;
pub mod database;
pub mod handlers;
pub mod logging;
pub mod memory;
pub mod routes;
pub mod validation;

pub use api_error::{ApiError, ErrorCode};
pub use auth::{require_token, AuthError, AuthenticatedUser, Claims, TokenService, TOKEN_COOKIE};
pub use database::{Collection, Database, DeleteOutcome, Document, InsertOutcome, UpdateOutcome};
pub use handlers::{
    add_cart_item_handler, add_product_handler, cart_items_handler, delete_cart_item_handler,
    generate_token_handler, list_companies_handler, logout_handler, product_details_handler,
    products_by_brand_handler, root_handler, update_product_handler, AppState,
};
pub use memory::MemoryStore;
pub use routes::{build_app, build_router, cors_layer};
pub use validation::{parse_object_id, ValidationError, ValidationResult};
