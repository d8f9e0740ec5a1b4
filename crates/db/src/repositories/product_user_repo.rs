//! Repository for the `product_users` table.

use plume_core::types::DbId;
use sqlx::PgPool;

use crate::models::product_user::{ProductUser, UpsertProductUser};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, product_id, user_id, external_user_id, external_email, \
                        display_name, last_sso_at, created_at, updated_at";

pub struct ProductUserRepo;

impl ProductUserRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ProductUser>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM product_users WHERE id = $1");
        sqlx::query_as::<_, ProductUser>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find the link for a product's external user id.
    pub async fn find_by_external(
        pool: &PgPool,
        product_id: DbId,
        external_user_id: &str,
    ) -> Result<Option<ProductUser>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM product_users
             WHERE product_id = $1 AND external_user_id = $2"
        );
        sqlx::query_as::<_, ProductUser>(&query)
            .bind(product_id)
            .bind(external_user_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert the link or refresh its profile fields.
    ///
    /// An existing link to a *different* platform user is left untouched and
    /// `None` is returned, so callers can report the conflict.
    pub async fn upsert(
        pool: &PgPool,
        input: &UpsertProductUser,
    ) -> Result<Option<ProductUser>, sqlx::Error> {
        let query = format!(
            "INSERT INTO product_users
                (product_id, user_id, external_user_id, external_email, display_name)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (product_id, external_user_id) DO UPDATE SET
                external_email = EXCLUDED.external_email,
                display_name = COALESCE(EXCLUDED.display_name, product_users.display_name)
             WHERE product_users.user_id = EXCLUDED.user_id
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProductUser>(&query)
            .bind(input.product_id)
            .bind(input.user_id)
            .bind(&input.external_user_id)
            .bind(&input.external_email)
            .bind(&input.display_name)
            .fetch_optional(pool)
            .await
    }

    /// Stamp the time of the latest completed handoff.
    pub(crate) async fn touch_last_sso_inner(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE product_users SET last_sso_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}
