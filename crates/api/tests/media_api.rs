//! HTTP-level integration tests for media preloaded through the handoff.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, build_test_app, default_product, exchange, get_auth, initiate, initiate_body,
    post_json, post_product,
};
use plume_api::background::sso_cleanup;
use serde_json::{json, Value};
use sqlx::PgPool;

fn media_item(id: &str) -> Value {
    json!({
        "external_id": id,
        "media_type": "image",
        "url": format!("https://cdn.example.com/{id}.png"),
        "name": format!("Asset {id}"),
        "metadata": { "width": 1080, "height": 1080 },
    })
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_preloaded_media_is_attached_on_exchange(pool: PgPool) {
    let (_product, key) = default_product(&pool).await;
    let mut body = initiate_body("ext-1");
    body["media"] = json!([media_item("a"), media_item("b")]);
    let token = initiate(&pool, &key, body).await;

    let session = exchange(&pool, &token).await;
    let media = session["media"].as_array().unwrap();
    assert_eq!(media.len(), 2);
    assert!(media.iter().all(|m| m["status"] == "attached"));

    let app = build_test_app(pool);
    let response = get_auth(
        app,
        "/api/sso/media",
        session["access_token"].as_str().unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let listed = json["data"].as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["metadata"]["width"], 1080);
    assert!(listed[0].get("sso_token_id").is_none());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_abandoned_handshake_keeps_attached_media(pool: PgPool) {
    let (_product, key) = default_product(&pool).await;
    let mut body = initiate_body("ext-1");
    body["media"] = json!([media_item("a")]);
    let token = initiate(&pool, &key, body).await;
    let session = exchange(&pool, &token).await;

    // A second handshake re-sends the same item, then fails PKCE.
    let mut body = initiate_body("ext-1");
    body["media"] = json!([media_item("a")]);
    let token = initiate(&pool, &key, body).await;
    let app = build_test_app(pool.clone());
    let wrong = "x".repeat(43);
    let response = post_json(
        app,
        "/api/sso/callback",
        json!({ "token": token, "code_verifier": wrong }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let report = sso_cleanup::run_once(&pool, 24).await.unwrap();
    assert_eq!(report.deleted_media, 0);

    let app = build_test_app(pool);
    let response = get_auth(
        app,
        "/api/sso/media",
        session["access_token"].as_str().unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let listed = json["data"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["status"], "attached");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_media_list_requires_media_read_scope(pool: PgPool) {
    let (_product, key) = default_product(&pool).await;
    let mut body = initiate_body("ext-1");
    body["scopes"] = json!([]);
    let token = initiate(&pool, &key, body).await;
    let session = exchange(&pool, &token).await;
    assert_eq!(session["scopes"], json!(["profile"]));

    let app = build_test_app(pool);
    let response = get_auth(
        app,
        "/api/sso/media",
        session["access_token"].as_str().unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_media_list_requires_read_level(pool: PgPool) {
    let (_product, key) = default_product(&pool).await;
    let mut body = initiate_body("ext-1");
    body["data_access_level"] = json!("none");
    let token = initiate(&pool, &key, body).await;
    let session = exchange(&pool, &token).await;

    let app = build_test_app(pool);
    let response = get_auth(
        app,
        "/api/sso/media",
        session["access_token"].as_str().unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_initiate_rejects_oversized_preload(pool: PgPool) {
    let (_product, key) = default_product(&pool).await;
    let mut body = initiate_body("ext-1");
    // The test config allows five items.
    let items: Vec<Value> = (0..6).map(|i| media_item(&format!("m{i}"))).collect();
    body["media"] = json!(items);

    let app = build_test_app(pool);
    let response = post_product(app, "/api/sso/initiate", body, &key).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_initiate_rejects_duplicate_media_ids(pool: PgPool) {
    let (_product, key) = default_product(&pool).await;
    let mut body = initiate_body("ext-1");
    body["media"] = json!([media_item("a"), media_item("a")]);

    let app = build_test_app(pool);
    let response = post_product(app, "/api/sso/initiate", body, &key).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_direct_preload_for_linked_user(pool: PgPool) {
    let (_product, key) = default_product(&pool).await;
    let token = initiate(&pool, &key, initiate_body("ext-1")).await;
    let session = exchange(&pool, &token).await;

    let app = build_test_app(pool.clone());
    let body = json!({ "media": [media_item("c")] });
    let response = post_product(app, "/api/sso/users/ext-1/media", body, &key).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"][0]["status"], "attached");

    // Re-sending the same external id updates in place.
    let app = build_test_app(pool.clone());
    let mut item = media_item("c");
    item["name"] = json!("Renamed");
    let response =
        post_product(app, "/api/sso/users/ext-1/media", json!({ "media": [item] }), &key).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let app = build_test_app(pool);
    let response = get_auth(
        app,
        "/api/sso/media",
        session["access_token"].as_str().unwrap(),
    )
    .await;
    let json = body_json(response).await;
    let listed = json["data"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["name"], "Renamed");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_direct_preload_for_unknown_user_returns_404(pool: PgPool) {
    let (_product, key) = default_product(&pool).await;
    let app = build_test_app(pool);

    let body = json!({ "media": [media_item("a")] });
    let response = post_product(app, "/api/sso/users/nobody/media", body, &key).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_direct_preload_rejects_empty_batch(pool: PgPool) {
    let (_product, key) = default_product(&pool).await;
    let token = initiate(&pool, &key, initiate_body("ext-1")).await;
    exchange(&pool, &token).await;

    let app = build_test_app(pool);
    let response =
        post_product(app, "/api/sso/users/ext-1/media", json!({ "media": [] }), &key).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
}
