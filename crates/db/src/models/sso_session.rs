//! Session established by a successful SSO exchange.

use plume_core::access::DataAccessLevel;
use plume_core::error::CoreError;
use plume_core::scopes::ScopeSet;
use plume_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `sso_sessions` table.
#[derive(Debug, Clone, FromRow)]
pub struct SsoSession {
    pub id: DbId,
    pub user_id: DbId,
    pub product_id: DbId,
    pub product_user_id: DbId,
    pub sso_token_id: Option<DbId>,
    pub refresh_token_hash: String,
    pub scopes: Vec<String>,
    pub data_access_level: String,
    pub expires_at: Timestamp,
    pub is_revoked: bool,
    pub last_refreshed_at: Option<Timestamp>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SsoSession {
    pub fn scope_set(&self) -> Result<ScopeSet, CoreError> {
        ScopeSet::parse_list(&self.scopes)
    }

    pub fn level(&self) -> Result<DataAccessLevel, CoreError> {
        self.data_access_level.parse()
    }
}

/// DTO for creating a session.
#[derive(Debug)]
pub struct CreateSsoSession {
    pub user_id: DbId,
    pub product_id: DbId,
    pub product_user_id: DbId,
    pub sso_token_id: Option<DbId>,
    pub refresh_token_hash: String,
    pub scopes: Vec<String>,
    pub data_access_level: String,
    pub expires_at: Timestamp,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}
