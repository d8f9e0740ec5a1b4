//! Repository for the `sso_tokens` table.
//!
//! Status changes are conditional updates on `status = 'issued'`, so two
//! concurrent exchanges of the same token cannot both succeed.

use plume_core::types::{DbId, Timestamp};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::sso_session::CreateSsoSession;
use crate::models::sso_token::{CreateSsoToken, ExchangeSession, SsoToken, TokenExchange};
use crate::repositories::{MediaReferenceRepo, ProductUserRepo, SsoSessionRepo};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, jti, product_id, product_user_id, user_id, code_challenge, scopes, \
                        data_access_level, redirect_url, status, expires_at, redeemed_at, \
                        ip_address, created_at";

pub struct SsoTokenRepo;

impl SsoTokenRepo {
    /// Record a newly issued token.
    pub async fn create(pool: &PgPool, input: &CreateSsoToken) -> Result<SsoToken, sqlx::Error> {
        let query = format!(
            "INSERT INTO sso_tokens
                (jti, product_id, product_user_id, user_id, code_challenge, scopes,
                 data_access_level, redirect_url, expires_at, ip_address)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SsoToken>(&query)
            .bind(input.jti)
            .bind(input.product_id)
            .bind(input.product_user_id)
            .bind(input.user_id)
            .bind(&input.code_challenge)
            .bind(&input.scopes)
            .bind(&input.data_access_level)
            .bind(&input.redirect_url)
            .bind(input.expires_at)
            .bind(&input.ip_address)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_jti(pool: &PgPool, jti: Uuid) -> Result<Option<SsoToken>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sso_tokens WHERE jti = $1");
        sqlx::query_as::<_, SsoToken>(&query)
            .bind(jti)
            .fetch_optional(pool)
            .await
    }

    /// Redeem an issued, unexpired token and open its session.
    ///
    /// One transaction marks the token redeemed, inserts the session,
    /// attaches the media preloaded with the token and stamps the product
    /// user's `last_sso_at`. Returns `None` and writes nothing when the token
    /// was not redeemable at the moment of the update (already used, revoked,
    /// or expired). A concurrent exchange blocks on the row lock and then
    /// sees `redeemed`.
    pub async fn exchange(
        pool: &PgPool,
        jti: Uuid,
        input: &ExchangeSession,
    ) -> Result<Option<TokenExchange>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "UPDATE sso_tokens SET status = 'redeemed', redeemed_at = NOW()
             WHERE jti = $1 AND status = 'issued' AND expires_at > NOW()
             RETURNING {COLUMNS}"
        );
        let Some(token) = sqlx::query_as::<_, SsoToken>(&query)
            .bind(jti)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let session = SsoSessionRepo::create_inner(
            &mut tx,
            &CreateSsoSession {
                user_id: token.user_id,
                product_id: token.product_id,
                product_user_id: token.product_user_id,
                sso_token_id: Some(token.id),
                refresh_token_hash: input.refresh_token_hash.clone(),
                scopes: token.scopes.clone(),
                data_access_level: token.data_access_level.clone(),
                expires_at: input.expires_at,
                user_agent: input.user_agent.clone(),
                ip_address: input.ip_address.clone(),
            },
        )
        .await?;
        let media = MediaReferenceRepo::attach_for_token_inner(&mut tx, token.id).await?;
        ProductUserRepo::touch_last_sso_inner(&mut tx, token.product_user_id).await?;

        tx.commit().await?;
        Ok(Some(TokenExchange {
            token,
            session,
            media,
        }))
    }

    /// Burn an issued token. Returns `true` if the row was updated.
    pub async fn revoke(pool: &PgPool, jti: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sso_tokens SET status = 'revoked' WHERE jti = $1 AND status = 'issued'",
        )
        .bind(jti)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke every outstanding token of a product user.
    pub async fn revoke_issued_for_product_user(
        pool: &PgPool,
        product_user_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sso_tokens SET status = 'revoked'
             WHERE product_user_id = $1 AND status = 'issued'",
        )
        .bind(product_user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Revoke every outstanding token of a product.
    pub async fn revoke_issued_for_product(
        pool: &PgPool,
        product_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sso_tokens SET status = 'revoked'
             WHERE product_id = $1 AND status = 'issued'",
        )
        .bind(product_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Record expiry for issued tokens past their lifetime.
    pub async fn expire_stale(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sso_tokens SET status = 'expired'
             WHERE status = 'issued' AND expires_at <= NOW()",
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete terminal tokens whose lifetime ended before `cutoff`.
    pub async fn delete_finished_before(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM sso_tokens WHERE status <> 'issued' AND expires_at < $1",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
