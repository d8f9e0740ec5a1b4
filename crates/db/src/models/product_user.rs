//! Link between an external product's user and a platform user.

use plume_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `product_users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProductUser {
    pub id: DbId,
    pub product_id: DbId,
    pub user_id: DbId,
    pub external_user_id: String,
    pub external_email: String,
    pub display_name: Option<String>,
    pub last_sso_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for linking (or refreshing the link of) an external user.
#[derive(Debug)]
pub struct UpsertProductUser {
    pub product_id: DbId,
    pub user_id: DbId,
    pub external_user_id: String,
    pub external_email: String,
    pub display_name: Option<String>,
}
