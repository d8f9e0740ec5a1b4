//! Repository for the `media_references` table.

use plume_core::media::ValidMedia;
use plume_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::media_reference::{MediaOwner, MediaReference};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, product_id, product_user_id, sso_token_id, external_media_id, \
                        media_type, url, name, thumbnail_url, metadata, status, \
                        created_at, updated_at";

pub struct MediaReferenceRepo;

impl MediaReferenceRepo {
    /// Insert or refresh a batch of media for one product user.
    ///
    /// Runs in a single transaction. An item whose external id is already
    /// known for this user is updated in place and re-linked to `owner`.
    /// Attached rows stay attached: a later handshake refreshes them but never
    /// puts them back to `pending`.
    pub async fn upsert_batch(
        pool: &PgPool,
        owner: MediaOwner,
        items: &[ValidMedia],
        status: &str,
    ) -> Result<Vec<MediaReference>, sqlx::Error> {
        let query = format!(
            "INSERT INTO media_references
                (product_id, product_user_id, sso_token_id, external_media_id, media_type,
                 url, name, thumbnail_url, metadata, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (product_user_id, external_media_id) DO UPDATE SET
                sso_token_id = EXCLUDED.sso_token_id,
                media_type = EXCLUDED.media_type,
                url = EXCLUDED.url,
                name = EXCLUDED.name,
                thumbnail_url = EXCLUDED.thumbnail_url,
                metadata = EXCLUDED.metadata,
                status = CASE
                    WHEN media_references.status = 'attached' THEN 'attached'
                    ELSE EXCLUDED.status
                END
             RETURNING {COLUMNS}"
        );

        let mut tx = pool.begin().await?;
        let mut stored = Vec::with_capacity(items.len());
        for item in items {
            let row = sqlx::query_as::<_, MediaReference>(&query)
                .bind(owner.product_id)
                .bind(owner.product_user_id)
                .bind(owner.sso_token_id)
                .bind(&item.external_id)
                .bind(item.media_type.as_str())
                .bind(&item.url)
                .bind(&item.name)
                .bind(&item.thumbnail_url)
                .bind(&item.metadata)
                .bind(status)
                .fetch_one(&mut *tx)
                .await?;
            stored.push(row);
        }
        tx.commit().await?;

        tracing::debug!(
            product_user_id = owner.product_user_id,
            sso_token_id = ?owner.sso_token_id,
            count = stored.len(),
            status,
            "Media batch stored"
        );
        Ok(stored)
    }

    /// Attach every item last sent with a token, returning the whole batch.
    pub(crate) async fn attach_for_token_inner(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        sso_token_id: DbId,
    ) -> Result<Vec<MediaReference>, sqlx::Error> {
        let query = format!(
            "UPDATE media_references SET status = 'attached'
             WHERE sso_token_id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MediaReference>(&query)
            .bind(sso_token_id)
            .fetch_all(&mut **tx)
            .await
    }

    /// List the attached media of a product user, newest first.
    pub async fn list_attached_for_product_user(
        pool: &PgPool,
        product_user_id: DbId,
    ) -> Result<Vec<MediaReference>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM media_references
             WHERE product_user_id = $1 AND status = 'attached'
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, MediaReference>(&query)
            .bind(product_user_id)
            .fetch_all(pool)
            .await
    }

    /// Delete pending media whose handshake can no longer complete.
    pub async fn delete_orphaned_pending(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM media_references m
             WHERE m.status = 'pending'
               AND m.created_at < $1
               AND (m.sso_token_id IS NULL
                    OR EXISTS (SELECT 1 FROM sso_tokens t
                               WHERE t.id = m.sso_token_id AND t.status <> 'issued'))",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
