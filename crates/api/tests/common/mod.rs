#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use plume_api::auth::jwt::JwtConfig;
use plume_api::config::{ServerConfig, SsoConfig};
use plume_api::router::{build_app_router, build_cors_layer};
use plume_api::state::AppState;
use plume_core::pkce;
use plume_core::product_keys::generate_product_key;
use plume_db::models::saas_product::{CreateSaasProduct, SaasProduct};
use plume_db::repositories::SaasProductRepo;
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;

pub const ADMIN_KEY: &str = "test-admin-key";

/// A valid PKCE verifier. [`challenge`] derives the matching S256 challenge.
pub const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

pub const REDIRECT_BASE: &str = "https://studio.example.com/sso";

pub fn challenge() -> String {
    pkce::challenge_for(VERIFIER)
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        public_url: "http://localhost:5173".to_string(),
        admin_api_key: Some(ADMIN_KEY.to_string()),
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 7,
        },
        sso: SsoConfig {
            temp_token_ttl_secs: 120,
            max_media_preload: 5,
            allow_insecure_localhost: true,
            cleanup_interval_secs: 3600,
            retention_hours: 24,
        },
    }
}

/// Build the full application router with all middleware layers.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(pool, test_config())
}

pub fn build_test_app_with(pool: PgPool, config: ServerConfig) -> Router {
    let cors = build_cors_layer(&config).expect("test CORS origins are valid");
    let state = AppState {
        pool,
        config: Arc::new(config),
    };
    build_app_router(state, cors)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request should build");

    app.oneshot(request).await.expect("router is infallible")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, &[], None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let bearer = format!("Bearer {token}");
    send(app, Method::GET, uri, &[("authorization", bearer.as_str())], None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, &[], Some(body)).await
}

pub async fn post_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response<Body> {
    let bearer = format!("Bearer {token}");
    send(app, Method::POST, uri, &[("authorization", bearer.as_str())], Some(body)).await
}

pub async fn put_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response<Body> {
    let bearer = format!("Bearer {token}");
    send(app, Method::PUT, uri, &[("authorization", bearer.as_str())], Some(body)).await
}

pub async fn post_product(app: Router, uri: &str, body: Value, key: &str) -> Response<Body> {
    send(app, Method::POST, uri, &[("x-product-key", key)], Some(body)).await
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Insert a product directly and return it with its plaintext key.
pub async fn create_product(
    pool: &PgPool,
    slug: &str,
    allowed_scopes: &[&str],
    max_level: &str,
    auto_provision_users: bool,
) -> (SaasProduct, String) {
    let key = generate_product_key();
    let input = CreateSaasProduct {
        name: format!("Product {slug}"),
        slug: slug.to_string(),
        api_key_hash: key.hash,
        api_key_prefix: key.prefix,
        allowed_redirect_urls: vec![REDIRECT_BASE.to_string()],
        allowed_scopes: allowed_scopes.iter().map(|s| s.to_string()).collect(),
        default_scopes: vec!["profile".to_string()],
        max_data_access_level: max_level.to_string(),
        auto_provision_users,
    };
    let product = SaasProductRepo::create(pool, &input)
        .await
        .expect("product creation should succeed");
    (product, key.plaintext)
}

/// A product that provisions users and grants media scopes up to `write`.
pub async fn default_product(pool: &PgPool) -> (SaasProduct, String) {
    create_product(
        pool,
        "studio",
        &["profile", "media:read", "media:write"],
        "write",
        true,
    )
    .await
}

/// A minimal initiate body for `external_user_id`.
pub fn initiate_body(external_user_id: &str) -> Value {
    json!({
        "external_user_id": external_user_id,
        "email": format!("{external_user_id}@example.com"),
        "display_name": "Test User",
        "redirect_url": format!("{REDIRECT_BASE}/done"),
        "scopes": ["media:read"],
        "code_challenge": challenge(),
        "code_challenge_method": "S256",
    })
}

/// Call initiate and return the temporary token.
pub async fn initiate(pool: &PgPool, key: &str, body: Value) -> String {
    let app = build_test_app(pool.clone());
    let response = post_product(app, "/api/sso/initiate", body, key).await;
    assert_eq!(response.status(), 201, "initiate should succeed");
    let json = body_json(response).await;
    json["data"]["token"]
        .as_str()
        .expect("token should be a string")
        .to_string()
}

/// Exchange `token` with the matching verifier and return the `data` object.
pub async fn exchange(pool: &PgPool, token: &str) -> Value {
    let app = build_test_app(pool.clone());
    let body = json!({ "token": token, "code_verifier": VERIFIER });
    let response = post_json(app, "/api/sso/callback", body).await;
    assert_eq!(response.status(), 200, "callback should succeed");
    body_json(response).await["data"].clone()
}
