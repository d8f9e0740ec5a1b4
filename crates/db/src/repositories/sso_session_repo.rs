//! Repository for the `sso_sessions` table.

use plume_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::sso_session::{CreateSsoSession, SsoSession};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, product_id, product_user_id, sso_token_id, \
                        refresh_token_hash, scopes, data_access_level, expires_at, is_revoked, \
                        last_refreshed_at, user_agent, ip_address, created_at, updated_at";

pub struct SsoSessionRepo;

impl SsoSessionRepo {
    /// Insert a new session inside the exchange transaction.
    pub(crate) async fn create_inner(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        input: &CreateSsoSession,
    ) -> Result<SsoSession, sqlx::Error> {
        let query = format!(
            "INSERT INTO sso_sessions
                (user_id, product_id, product_user_id, sso_token_id, refresh_token_hash,
                 scopes, data_access_level, expires_at, user_agent, ip_address)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SsoSession>(&query)
            .bind(input.user_id)
            .bind(input.product_id)
            .bind(input.product_user_id)
            .bind(input.sso_token_id)
            .bind(&input.refresh_token_hash)
            .bind(&input.scopes)
            .bind(&input.data_access_level)
            .bind(input.expires_at)
            .bind(&input.user_agent)
            .bind(&input.ip_address)
            .fetch_one(&mut **tx)
            .await
    }

    /// Find a session that is neither revoked nor expired.
    pub async fn find_active_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<SsoSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sso_sessions
             WHERE id = $1 AND is_revoked = false AND expires_at > NOW()"
        );
        sqlx::query_as::<_, SsoSession>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find an active session by its refresh token hash.
    pub async fn find_active_by_refresh_hash(
        pool: &PgPool,
        hash: &str,
    ) -> Result<Option<SsoSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM sso_sessions
             WHERE refresh_token_hash = $1
               AND is_revoked = false
               AND expires_at > NOW()"
        );
        sqlx::query_as::<_, SsoSession>(&query)
            .bind(hash)
            .fetch_optional(pool)
            .await
    }

    /// Swap the refresh token of an active session.
    ///
    /// The update is conditional on the old hash so a refresh token can only
    /// be rotated once; the loser of a race gets `None`.
    pub async fn rotate_refresh(
        pool: &PgPool,
        id: DbId,
        old_hash: &str,
        new_hash: &str,
        new_expires_at: Timestamp,
    ) -> Result<Option<SsoSession>, sqlx::Error> {
        let query = format!(
            "UPDATE sso_sessions SET
                refresh_token_hash = $3,
                expires_at = $4,
                last_refreshed_at = NOW()
             WHERE id = $1
               AND refresh_token_hash = $2
               AND is_revoked = false
               AND expires_at > NOW()
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SsoSession>(&query)
            .bind(id)
            .bind(old_hash)
            .bind(new_hash)
            .bind(new_expires_at)
            .fetch_optional(pool)
            .await
    }

    /// Revoke a single session. Returns `true` if the row was updated.
    pub async fn revoke(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sso_sessions SET is_revoked = true WHERE id = $1 AND is_revoked = false",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke sessions created by exchanging the given SSO token.
    pub async fn revoke_for_sso_token(
        pool: &PgPool,
        sso_token_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sso_sessions SET is_revoked = true
             WHERE sso_token_id = $1 AND is_revoked = false",
        )
        .bind(sso_token_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Revoke all active sessions of a product user.
    pub async fn revoke_all_for_product_user(
        pool: &PgPool,
        product_user_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sso_sessions SET is_revoked = true
             WHERE product_user_id = $1 AND is_revoked = false",
        )
        .bind(product_user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Revoke all active sessions issued through a product.
    pub async fn revoke_all_for_product(
        pool: &PgPool,
        product_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sso_sessions SET is_revoked = true
             WHERE product_id = $1 AND is_revoked = false",
        )
        .bind(product_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete sessions that expired, or were revoked, before `cutoff`.
    pub async fn cleanup_ended_before(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM sso_sessions
             WHERE expires_at < $1 OR (is_revoked = true AND updated_at < $1)",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
