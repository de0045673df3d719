use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::CorsConfig;
use crate::errors::{ShopError, ShopResult};
use crate::server::auth::require_token;
use crate::server::handlers::{
    add_cart_item_handler, add_product_handler, cart_items_handler, delete_cart_item_handler,
    generate_token_handler, list_companies_handler, logout_handler, product_details_handler,
    products_by_brand_handler, root_handler, update_product_handler, AppState,
};
use crate::server::logging::request_logging_middleware;

/// Build the application router.
///
/// # Routes
///
/// - `GET /` - Liveness text
/// - `GET /companies` - List all brands
/// - `POST /generate-token` - Issue the `token` cookie for `{ "email": ... }`
/// - `POST /logout` - Clear the `token` cookie
/// - `GET /products/:brand` - Products of one brand
/// - `GET /details/:id` - One product by id
/// - `POST /add-product` - Create a product
/// - `POST /product` - Add an item to a cart
/// - `GET /cart?email=` - Cart items of one owner (requires the `token` cookie)
/// - `DELETE /item/:id` - Remove a cart item
/// - `PATCH /update-product/:id` - Partially update a product
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/cart", get(cart_items_handler))
        .route_layer(from_fn_with_state(state.tokens.clone(), require_token));

    Router::new()
        .route("/", get(root_handler))
        .route("/companies", get(list_companies_handler))
        .route("/generate-token", post(generate_token_handler))
        .route("/logout", post(logout_handler))
        .route("/products/:brand", get(products_by_brand_handler))
        .route("/details/:id", get(product_details_handler))
        .route("/add-product", post(add_product_handler))
        .route("/product", post(add_cart_item_handler))
        .route("/item/:id", delete(delete_cart_item_handler))
        .route("/update-product/:id", patch(update_product_handler))
        .merge(protected)
        .with_state(state)
}

/// CORS policy admitting a single origin, with cookies.
///
/// Requests from any other origin get no `Access-Control-Allow-Origin` header.
pub fn cors_layer(config: &CorsConfig) -> ShopResult<CorsLayer> {
    let origin = HeaderValue::from_str(&config.allowed_origin).map_err(|e| {
        ShopError::ConfigError(format!(
            "invalid cors.allowed_origin '{}': {e}",
            config.allowed_origin
        ))
    })?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list([origin]))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]))
}

/// The router with CORS and request logging applied, as served by the binary.
pub fn build_app(state: AppState, cors: &CorsConfig) -> ShopResult<Router> {
    Ok(build_router(state)
        .layer(cors_layer(cors)?)
        .layer(from_fn(request_logging_middleware)))
}
