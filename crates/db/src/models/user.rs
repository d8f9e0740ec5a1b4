//! Platform user model and DTOs.

use plume_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub email: String,
    pub display_name: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for provisioning a user. `email` must already be normalized.
#[derive(Debug)]
pub struct CreateUser {
    pub email: String,
    pub display_name: Option<String>,
}
