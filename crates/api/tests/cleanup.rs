//! Integration tests for the SSO cleanup pass.

mod common;

use std::time::Duration;

use common::{build_test_app_with, create_product, exchange, initiate_body, post_product, test_config};
use plume_api::background::sso_cleanup::{run_once, CleanupReport};
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "../db/migrations")]
async fn test_cleanup_on_empty_database(pool: PgPool) {
    let report = run_once(&pool, 24).await.unwrap();
    assert_eq!(report, CleanupReport::default());
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_cleanup_expires_tokens_and_drops_pending_media(pool: PgPool) {
    let (_product, key) = create_product(&pool, "studio", &["media:read"], "read", true).await;

    let mut config = test_config();
    config.sso.temp_token_ttl_secs = 1;
    let mut body = initiate_body("ext-1");
    body["media"] = json!([{
        "external_id": "a",
        "media_type": "image",
        "url": "https://cdn.example.com/a.png",
    }]);
    let app = build_test_app_with(pool.clone(), config);
    let response = post_product(app, "/api/sso/initiate", body, &key).await;
    assert_eq!(response.status(), 201);

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let report = run_once(&pool, 24).await.unwrap();
    assert_eq!(report.expired_tokens, 1);
    assert_eq!(report.deleted_media, 1);
    assert_eq!(report.deleted_tokens, 0);

    // With no retention window the expired token row goes too.
    let report = run_once(&pool, 0).await.unwrap();
    assert_eq!(report.expired_tokens, 0);
    assert_eq!(report.deleted_tokens, 1);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn test_cleanup_keeps_live_sessions(pool: PgPool) {
    let (_product, key) = create_product(&pool, "studio", &["media:read"], "read", true).await;
    let token = common::initiate(&pool, &key, initiate_body("ext-1")).await;
    exchange(&pool, &token).await;

    let report = run_once(&pool, 0).await.unwrap();
    assert_eq!(report.deleted_sessions, 0);
    // The redeemed token is finished but has not reached its expiry yet.
    assert_eq!(report.deleted_tokens, 0);
}
