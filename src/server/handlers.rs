use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::server::api_error::ApiError;
use crate::server::auth::{AuthenticatedUser, TokenService};
use crate::server::database::{
    Database, DeleteOutcome, Document, InsertOutcome, UpdateOutcome, EMAIL_FIELD,
};
use crate::server::logging::{log_catalog_event, CatalogEvent};
use crate::server::validation::parse_object_id;

/// Shared application state for handlers.
///
/// The database handle is created once at startup and handed to every
/// handler through this state.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub tokens: Arc<TokenService>,
    /// Reject `/cart?email=` for anyone but the token's owner
    pub enforce_cart_owner: bool,
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Body of `POST /generate-token`.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenRequest {
    pub email: String,
}

/// Query string of `GET /cart`.
#[derive(Debug, Deserialize)]
pub struct CartQuery {
    pub email: Option<String>,
}

/// `GET /` liveness text.
pub async fn root_handler() -> &'static str {
    "Server is running now"
}

/// `GET /companies` - every brand, unfiltered.
pub async fn list_companies_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Document>>> {
    let companies = state.db.list_companies().await?;
    Ok(Json(companies))
}

/// `POST /generate-token` - sign a token for the posted email and set it as
/// the `token` cookie.
pub async fn generate_token_handler(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;

    let token = state.tokens.issue(&request.email)?;
    log_catalog_event(CatalogEvent::TokenIssued, &request.email, None);

    Ok((
        [(header::SET_COOKIE, state.tokens.session_cookie(&token))],
        "cookie send successfully with token",
    )
        .into_response())
}

/// `POST /logout` - clear the `token` cookie. The token itself stays valid
/// until it expires.
pub async fn logout_handler(State(state): State<AppState>) -> Response {
    log_catalog_event(CatalogEvent::TokenCleared, "-", None);
    (
        [(header::SET_COOKIE, state.tokens.revocation_cookie())],
        "token cookie deleted",
    )
        .into_response()
}

/// `GET /products/:brand` - products whose `brandName` equals `brand`.
pub async fn products_by_brand_handler(
    State(state): State<AppState>,
    brand: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<Vec<Document>>> {
    let Path(brand) = brand?;
    let products = state.db.find_products_by_brand(&brand).await?;
    info!("Found {} products for brand={}", products.len(), brand);
    Ok(Json(products))
}

/// `GET /details/:id` - one product, or `null` when no product has that id.
pub async fn product_details_handler(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<Option<Document>>> {
    let Path(id) = id?;
    let id = parse_object_id(&id, "id")?;

    let product = state.db.find_product(&id).await?;
    if product.is_none() {
        warn!("Product not found for id={}", id);
    }

    Ok(Json(product))
}

/// `POST /add-product` - insert the posted product as-is.
pub async fn add_product_handler(
    State(state): State<AppState>,
    payload: Result<Json<Document>, JsonRejection>,
) -> ApiResult<Json<InsertOutcome>> {
    let Json(product) = payload?;

    let outcome = state.db.insert_product(product).await?;
    log_catalog_event(CatalogEvent::ProductCreated, &outcome.inserted_id, None);

    Ok(Json(outcome))
}

/// `POST /product` - put the posted item in the cart.
pub async fn add_cart_item_handler(
    State(state): State<AppState>,
    payload: Result<Json<Document>, JsonRejection>,
) -> ApiResult<Json<InsertOutcome>> {
    let Json(item) = payload?;

    let owner = item
        .get(EMAIL_FIELD)
        .and_then(|v| v.as_str())
        .unwrap_or("-")
        .to_string();
    let outcome = state.db.insert_cart_item(item).await?;
    log_catalog_event(
        CatalogEvent::CartItemAdded,
        &outcome.inserted_id,
        Some(&owner),
    );

    Ok(Json(outcome))
}

/// `GET /cart?email=` - cart items of one owner. Requires a valid token.
///
/// Without `email` the token's email is used. When owner enforcement is on,
/// asking for someone else's cart is rejected with 403.
pub async fn cart_items_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    query: Result<Query<CartQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Document>>> {
    let Query(query) = query?;
    let email = match query.email {
        Some(email) if state.enforce_cart_owner && email != user.email => {
            warn!(
                "Cart lookup for email={} rejected for token owner={}",
                email, user.email
            );
            return Err(ApiError::email_mismatch());
        }
        Some(email) => email,
        None => user.email,
    };

    let items = state.db.find_cart_items_by_email(&email).await?;
    Ok(Json(items))
}

/// `DELETE /item/:id` - remove one cart item. Unknown ids delete nothing.
pub async fn delete_cart_item_handler(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<DeleteOutcome>> {
    let Path(id) = id?;
    let id = parse_object_id(&id, "id")?;

    let outcome = state.db.delete_cart_item(&id).await?;
    if outcome.deleted_count > 0 {
        log_catalog_event(CatalogEvent::CartItemRemoved, &id.to_hex(), None);
    } else {
        warn!("Delete requested for non-existent cart item id={}", id);
    }

    Ok(Json(outcome))
}

/// `PATCH /update-product/:id` - overwrite only the posted fields.
pub async fn update_product_handler(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
    payload: Result<Json<Document>, JsonRejection>,
) -> ApiResult<Json<UpdateOutcome>> {
    let Path(id) = id?;
    let id = parse_object_id(&id, "id")?;
    let Json(changes) = payload?;

    let fields: Vec<String> = changes.keys().cloned().collect();
    let outcome = state.db.update_product(&id, changes).await?;
    if outcome.matched_count > 0 {
        log_catalog_event(
            CatalogEvent::ProductUpdated,
            &id.to_hex(),
            Some(&fields.join(",")),
        );
    } else {
        warn!("Update requested for non-existent product id={}", id);
    }

    Ok(Json(outcome))
}
