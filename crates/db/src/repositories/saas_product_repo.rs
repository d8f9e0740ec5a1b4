//! Repository for the `saas_products` table.

use plume_core::types::DbId;
use sqlx::PgPool;

use crate::models::saas_product::{CreateSaasProduct, SaasProduct, UpdateSaasProduct};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, slug, api_key_hash, api_key_prefix, allowed_redirect_urls, \
                        allowed_scopes, default_scopes, max_data_access_level, \
                        auto_provision_users, sso_enabled, is_active, created_at, updated_at";

pub struct SaasProductRepo;

impl SaasProductRepo {
    /// Insert a new product, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateSaasProduct,
    ) -> Result<SaasProduct, sqlx::Error> {
        let query = format!(
            "INSERT INTO saas_products
                (name, slug, api_key_hash, api_key_prefix, allowed_redirect_urls,
                 allowed_scopes, default_scopes, max_data_access_level, auto_provision_users)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SaasProduct>(&query)
            .bind(&input.name)
            .bind(&input.slug)
            .bind(&input.api_key_hash)
            .bind(&input.api_key_prefix)
            .bind(&input.allowed_redirect_urls)
            .bind(&input.allowed_scopes)
            .bind(&input.default_scopes)
            .bind(&input.max_data_access_level)
            .bind(input.auto_provision_users)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<SaasProduct>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM saas_products WHERE id = $1");
        sqlx::query_as::<_, SaasProduct>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Look a product up by the SHA-256 hash of its key.
    pub async fn find_by_key_hash(
        pool: &PgPool,
        hash: &str,
    ) -> Result<Option<SaasProduct>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM saas_products WHERE api_key_hash = $1");
        sqlx::query_as::<_, SaasProduct>(&query)
            .bind(hash)
            .fetch_optional(pool)
            .await
    }

    /// List all products ordered by name.
    pub async fn list(pool: &PgPool) -> Result<Vec<SaasProduct>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM saas_products ORDER BY name");
        sqlx::query_as::<_, SaasProduct>(&query)
            .fetch_all(pool)
            .await
    }

    /// Update a product. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateSaasProduct,
    ) -> Result<Option<SaasProduct>, sqlx::Error> {
        let query = format!(
            "UPDATE saas_products SET
                name = COALESCE($2, name),
                allowed_redirect_urls = COALESCE($3, allowed_redirect_urls),
                allowed_scopes = COALESCE($4, allowed_scopes),
                default_scopes = COALESCE($5, default_scopes),
                max_data_access_level = COALESCE($6, max_data_access_level),
                auto_provision_users = COALESCE($7, auto_provision_users),
                sso_enabled = COALESCE($8, sso_enabled)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SaasProduct>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.allowed_redirect_urls)
            .bind(&input.allowed_scopes)
            .bind(&input.default_scopes)
            .bind(&input.max_data_access_level)
            .bind(input.auto_provision_users)
            .bind(input.sso_enabled)
            .fetch_optional(pool)
            .await
    }

    /// Replace the key material of a product. The previous key stops working
    /// immediately.
    pub async fn rotate_key(
        pool: &PgPool,
        id: DbId,
        api_key_hash: &str,
        api_key_prefix: &str,
    ) -> Result<Option<SaasProduct>, sqlx::Error> {
        let query = format!(
            "UPDATE saas_products SET api_key_hash = $2, api_key_prefix = $3
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SaasProduct>(&query)
            .bind(id)
            .bind(api_key_hash)
            .bind(api_key_prefix)
            .fetch_optional(pool)
            .await
    }

    /// Deactivate a product. Returns `true` if the row was updated.
    pub async fn deactivate(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE saas_products SET is_active = false WHERE id = $1 AND is_active = true",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
