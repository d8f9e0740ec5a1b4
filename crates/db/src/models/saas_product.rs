//! External product registration model and DTOs.

use plume_core::access::DataAccessLevel;
use plume_core::error::CoreError;
use plume_core::scopes::ScopeSet;
use plume_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `saas_products` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SaasProduct {
    pub id: DbId,
    pub name: String,
    pub slug: String,
    /// SHA-256 of the product key. Never serialized.
    #[serde(skip_serializing)]
    pub api_key_hash: String,
    pub api_key_prefix: String,
    pub allowed_redirect_urls: Vec<String>,
    pub allowed_scopes: Vec<String>,
    pub default_scopes: Vec<String>,
    pub max_data_access_level: String,
    pub auto_provision_users: bool,
    pub sso_enabled: bool,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SaasProduct {
    pub fn allowed_scope_set(&self) -> Result<ScopeSet, CoreError> {
        ScopeSet::parse_list(&self.allowed_scopes)
    }

    pub fn default_scope_set(&self) -> Result<ScopeSet, CoreError> {
        ScopeSet::parse_list(&self.default_scopes)
    }

    pub fn max_level(&self) -> Result<DataAccessLevel, CoreError> {
        self.max_data_access_level.parse()
    }

    /// Whether the product may currently start or complete a handoff.
    pub fn accepts_sso(&self) -> bool {
        self.is_active && self.sso_enabled
    }
}

/// DTO for inserting a product. Key material is generated by the caller.
#[derive(Debug)]
pub struct CreateSaasProduct {
    pub name: String,
    pub slug: String,
    pub api_key_hash: String,
    pub api_key_prefix: String,
    pub allowed_redirect_urls: Vec<String>,
    pub allowed_scopes: Vec<String>,
    pub default_scopes: Vec<String>,
    pub max_data_access_level: String,
    pub auto_provision_users: bool,
}

/// DTO for updating a product. All fields are optional.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateSaasProduct {
    pub name: Option<String>,
    pub allowed_redirect_urls: Option<Vec<String>>,
    pub allowed_scopes: Option<Vec<String>>,
    pub default_scopes: Option<Vec<String>>,
    pub max_data_access_level: Option<String>,
    pub auto_provision_users: Option<bool>,
    pub sso_enabled: Option<bool>,
}

/// Response returned when a key is created or rotated. The plaintext key
/// appears here and nowhere else.
#[derive(Debug, Serialize)]
pub struct ProductKeyResponse {
    pub product: SaasProduct,
    pub api_key: String,
}
