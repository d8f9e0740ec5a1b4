//! Product-scoped media preloaded into the platform.

use plume_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

pub const MEDIA_STATUS_PENDING: &str = "pending";
pub const MEDIA_STATUS_ATTACHED: &str = "attached";

/// A row from the `media_references` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MediaReference {
    pub id: DbId,
    pub product_id: DbId,
    pub product_user_id: DbId,
    #[serde(skip_serializing)]
    pub sso_token_id: Option<DbId>,
    pub external_media_id: String,
    pub media_type: String,
    pub url: String,
    pub name: Option<String>,
    pub thumbnail_url: Option<String>,
    pub metadata: serde_json::Value,
    pub status: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Owner of a media batch: the product user and, for handshake preloads,
/// the token that carried it.
#[derive(Debug, Clone, Copy)]
pub struct MediaOwner {
    pub product_id: DbId,
    pub product_user_id: DbId,
    pub sso_token_id: Option<DbId>,
}
