//! Integration tests for the HTTP endpoints, run against the in-memory store.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

use brand_shop::config::{AuthConfig, CorsConfig};
use brand_shop::server::{
    build_app, build_router, AppState, Claims, Collection, Database, Document, MemoryStore,
    TokenService,
};

const SECRET: &str = "integration-test-secret";
const BUYER: &str = "buyer@example.com";

/// Helper to create app state over a fresh in-memory store.
fn setup_state(enforce_cart_owner: bool) -> (AppState, MemoryStore) {
    let store = MemoryStore::new();
    let tokens = TokenService::from_config(&AuthConfig {
        jwt_secret: SECRET.to_string(),
        ..Default::default()
    })
    .expect("failed to create token service");

    let state = AppState {
        db: Arc::new(Database::Memory(store.clone())),
        tokens: Arc::new(tokens),
        enforce_cart_owner,
    };
    (state, store)
}

fn setup_app() -> (Router, MemoryStore) {
    let (state, store) = setup_state(true);
    (build_router(state), store)
}

fn object(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Helper to send a request and decode the body as JSON when possible.
async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    cookie: Option<&str>,
) -> (StatusCode, HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }

    let body_bytes = body
        .map(|v| serde_json::to_vec(&v).unwrap())
        .unwrap_or_default();
    let request = builder.body(Body::from(body_bytes)).unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

    (status, headers, body)
}

/// `name=value` part of the response's `Set-Cookie` header.
fn cookie_pair(headers: &HeaderMap) -> String {
    let set_cookie = headers
        .get(header::SET_COOKIE)
        .expect("missing Set-Cookie")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

async fn login(app: &Router, email: &str) -> String {
    let (status, headers, _) = send(
        app,
        "POST",
        "/generate-token",
        Some(json!({ "email": email })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    cookie_pair(&headers)
}

#[tokio::test]
async fn root_reports_running() {
    let (app, _) = setup_app();
    let (status, _, body) = send(&app, "GET", "/", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Server is running now"));
}

#[tokio::test]
async fn companies_lists_every_brand() {
    let (app, store) = setup_app();
    store
        .seed(
            Collection::Companies,
            vec![
                object(json!({ "brandName": "Acme", "logo": "acme.png" })),
                object(json!({ "brandName": "Globex" })),
            ],
        )
        .await;

    let (status, _, body) = send(&app, "GET", "/companies", None, None).await;

    assert_eq!(status, StatusCode::OK);
    let companies = body.as_array().unwrap();
    assert_eq!(companies.len(), 2);
    assert!(companies.iter().all(|c| c.get("_id").is_some()));
}

#[tokio::test]
async fn generate_token_sets_http_only_cookie() {
    let (app, _) = setup_app();
    let (status, headers, body) = send(
        &app,
        "POST",
        "/generate-token",
        Some(json!({ "email": BUYER })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("cookie send successfully with token"));

    let set_cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(set_cookie.starts_with("token="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(!set_cookie.contains("Secure"));
}

#[tokio::test]
async fn generate_token_without_email_is_rejected() {
    let (app, _) = setup_app();
    let (status, headers, body) = send(
        &app,
        "POST",
        "/generate-token",
        Some(json!({ "name": "no email here" })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
    assert!(headers.get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn logout_clears_cookie() {
    let (app, _) = setup_app();
    let (status, headers, body) = send(&app, "POST", "/logout", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("token cookie deleted"));

    let set_cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(set_cookie.starts_with("token=;"));
    assert!(set_cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn cart_without_cookie_is_unauthorized() {
    let (app, _) = setup_app();
    let (status, _, body) = send(&app, "GET", "/cart?email=buyer@example.com", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "MISSING_TOKEN");
    assert_eq!(body["error"]["message"], "token not found");
}

#[tokio::test]
async fn cart_with_tampered_cookie_is_unauthorized() {
    let (app, _) = setup_app();
    let cookie = login(&app, BUYER).await;
    let tampered = format!("{cookie}x");

    let (status, _, body) = send(
        &app,
        "GET",
        "/cart?email=buyer@example.com",
        None,
        Some(&tampered),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
    assert_eq!(body["error"]["message"], "token is invalid");
}

#[tokio::test]
async fn cart_with_expired_cookie_is_unauthorized() {
    let (app, _) = setup_app();
    let now = chrono::Utc::now().timestamp() as u64;
    let expired = encode(
        &Header::default(),
        &Claims {
            email: BUYER.to_string(),
            iat: now - 7200,
            exp: now - 3600,
        },
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    let cookie = format!("token={expired}");

    let (status, _, body) = send(&app, "GET", "/cart", None, Some(&cookie)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "token is invalid");
}

#[tokio::test]
async fn cart_returns_only_owner_items() {
    let (app, store) = setup_app();
    store
        .seed(
            Collection::Cart,
            vec![
                object(json!({ "email": BUYER, "name": "Widget" })),
                object(json!({ "email": "other@example.com", "name": "Gadget" })),
            ],
        )
        .await;
    let cookie = login(&app, BUYER).await;

    let (status, _, body) = send(
        &app,
        "GET",
        "/cart?email=buyer@example.com",
        None,
        Some(&cookie),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "Widget");

    // Without the query parameter the token's email is used.
    let (status, _, body) = send(&app, "GET", "/cart", None, Some(&cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn cart_for_another_email_is_forbidden() {
    let (app, _) = setup_app();
    let cookie = login(&app, BUYER).await;

    let (status, _, body) = send(
        &app,
        "GET",
        "/cart?email=other@example.com",
        None,
        Some(&cookie),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn cart_owner_check_can_be_disabled() {
    let (state, store) = setup_state(false);
    let app = build_router(state);
    store
        .seed(
            Collection::Cart,
            vec![object(json!({ "email": "other@example.com" }))],
        )
        .await;
    let cookie = login(&app, BUYER).await;

    let (status, _, body) = send(
        &app,
        "GET",
        "/cart?email=other@example.com",
        None,
        Some(&cookie),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn added_product_is_listed_under_its_brand() {
    let (app, _) = setup_app();
    let (status, _, body) = send(
        &app,
        "POST",
        "/add-product",
        Some(json!({ "brandName": "Acme", "name": "Widget" })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["acknowledged"], true);
    let inserted_id = body["insertedId"].as_str().unwrap().to_string();

    let (status, _, body) = send(&app, "GET", "/products/Acme", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let products = body.as_array().unwrap();
    assert!(products
        .iter()
        .any(|p| p["_id"] == json!(inserted_id) && p["name"] == "Widget"));

    let (_, _, body) = send(&app, "GET", "/products/Globex", None, None).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn details_returns_product_by_id() {
    let (app, _) = setup_app();
    let (_, _, body) = send(
        &app,
        "POST",
        "/add-product",
        Some(json!({ "brandName": "Acme", "name": "Widget", "price": 10 })),
        None,
    )
    .await;
    let id = body["insertedId"].as_str().unwrap().to_string();

    let (status, _, body) = send(&app, "GET", &format!("/details/{id}"), None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["_id"], json!(id));
    assert_eq!(body["price"], 10);
}

#[tokio::test]
async fn details_with_unknown_id_is_null() {
    let (app, _) = setup_app();
    let (status, _, body) = send(
        &app,
        "GET",
        "/details/652f1c2b9d3e4a0012345678",
        None,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn details_with_malformed_id_is_client_error() {
    let (app, _) = setup_app();
    let (status, _, body) = send(&app, "GET", "/details/not-an-id", None, None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MALFORMED_IDENTIFIER");

    // The server keeps serving afterwards.
    let (status, _, _) = send(&app, "GET", "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn update_changes_only_given_fields() {
    let (app, _) = setup_app();
    let (_, _, body) = send(
        &app,
        "POST",
        "/add-product",
        Some(json!({ "brandName": "Acme", "name": "Widget", "price": 10, "rating": 4 })),
        None,
    )
    .await;
    let id = body["insertedId"].as_str().unwrap().to_string();

    let (status, _, body) = send(
        &app,
        "PATCH",
        &format!("/update-product/{id}"),
        Some(json!({ "price": 20 })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matchedCount"], 1);
    assert_eq!(body["modifiedCount"], 1);

    let (_, _, product) = send(&app, "GET", &format!("/details/{id}"), None, None).await;
    assert_eq!(product["price"], 20);
    assert_eq!(product["name"], "Widget");
    assert_eq!(product["brandName"], "Acme");
    assert_eq!(product["rating"], 4);
    assert_eq!(product["_id"], json!(id));
}

#[tokio::test]
async fn update_with_same_value_modifies_nothing() {
    let (app, _) = setup_app();
    let (_, _, body) = send(
        &app,
        "POST",
        "/add-product",
        Some(json!({ "brandName": "Acme", "price": 10 })),
        None,
    )
    .await;
    let id = body["insertedId"].as_str().unwrap().to_string();

    let (status, _, body) = send(
        &app,
        "PATCH",
        &format!("/update-product/{id}"),
        Some(json!({ "price": 10 })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matchedCount"], 1);
    assert_eq!(body["modifiedCount"], 0);
}

#[tokio::test]
async fn update_unknown_product_matches_nothing() {
    let (app, _) = setup_app();
    let (status, _, body) = send(
        &app,
        "PATCH",
        "/update-product/652f1c2b9d3e4a0012345678",
        Some(json!({ "price": 20 })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matchedCount"], 0);
}

#[tokio::test]
async fn update_with_malformed_id_is_client_error() {
    let (app, _) = setup_app();
    let (status, _, body) = send(
        &app,
        "PATCH",
        "/update-product/12345",
        Some(json!({ "price": 20 })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MALFORMED_IDENTIFIER");
}

#[tokio::test]
async fn deleted_cart_item_leaves_the_cart() {
    let (app, _) = setup_app();
    let (status, _, body) = send(
        &app,
        "POST",
        "/product",
        Some(json!({ "email": BUYER, "name": "Widget" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["insertedId"].as_str().unwrap().to_string();
    send(
        &app,
        "POST",
        "/product",
        Some(json!({ "email": BUYER, "name": "Gadget" })),
        None,
    )
    .await;

    let (status, _, body) = send(&app, "DELETE", &format!("/item/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deletedCount"], 1);

    let cookie = login(&app, BUYER).await;
    let (_, _, body) = send(
        &app,
        "GET",
        "/cart?email=buyer@example.com",
        None,
        Some(&cookie),
    )
    .await;
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "Gadget");

    // Deleting again reports zero without error.
    let (status, _, body) = send(&app, "DELETE", &format!("/item/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deletedCount"], 0);
}

#[tokio::test]
async fn duplicated_query_parameter_uses_error_envelope() {
    let (app, _) = setup_app();
    let cookie = login(&app, BUYER).await;

    let (status, _, body) = send(
        &app,
        "GET",
        "/cart?email=buyer@example.com&email=other@example.com",
        None,
        Some(&cookie),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn undecodable_path_uses_error_envelope() {
    let (app, _) = setup_app();

    for uri in ["/details/%FF%FE", "/products/%FF%FE", "/item/%FF%FE"] {
        let method = if uri.starts_with("/item") { "DELETE" } else { "GET" };
        let (status, _, body) = send(&app, method, uri, None, None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"]["code"], "INVALID_REQUEST", "{uri}");
    }
}

#[cfg(feature = "mongodb")]
#[tokio::test]
async fn unreachable_database_is_a_server_error_without_detail() {
    let (mut state, _) = setup_state(true);
    state.db = Database::connect(&brand_shop::config::DatabaseConfig {
        backend: "mongodb".to_string(),
        uri: "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200&connectTimeoutMS=200"
            .to_string(),
        ..Default::default()
    })
    .await
    .expect("client options should parse without contacting the server");
    let app = build_router(state);

    let (status, _, body) = send(&app, "GET", "/companies", None, None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "DATABASE_ERROR");
    assert_eq!(body["error"]["message"], "Database operation failed");
    assert!(body["error"].get("details").is_none());
    assert!(!body.to_string().contains("127.0.0.1"));
}

#[tokio::test]
async fn non_object_body_is_rejected() {
    let (app, _) = setup_app();
    let (status, _, body) = send(&app, "POST", "/add-product", Some(json!([1, 2, 3])), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn app_allows_the_trusted_origin_with_credentials() {
    let (state, _) = setup_state(true);
    let app = build_app(state, &CorsConfig::default()).unwrap();

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/cart")
        .header(header::ORIGIN, "http://localhost:5173")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let headers = response.headers();

    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:5173"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
    assert!(headers.get("x-request-id").is_some());
}

#[tokio::test]
async fn app_does_not_allow_other_origins() {
    let (state, _) = setup_state(true);
    let app = build_app(state, &CorsConfig::default()).unwrap();

    let request = Request::builder()
        .method("GET")
        .uri("/")
        .header(header::ORIGIN, "http://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
