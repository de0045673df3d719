//! Brand Shop - HTTP backend for a brand catalog, product pages and carts.
//!
//! # Features
//!
//! - `server` - HTTP handlers, routes and middleware. Enabled by default.
//! - `mongodb` - MongoDB backend. Enabled by default. The in-memory backend
//!   is always available.
//!
//! # Example
//!
//! ```toml
//! # Use defaults (server + mongodb)
//! brand-shop = { path = "." }
//!
//! # In-memory backend only
//! brand-shop = { path = ".", default-features = false, features = ["server"] }
//! ```

pub mod config;
pub mod errors;

#[cfg(feature = "server")]
#[path = "server/mod.rs"]
pub mod server;
