//! Server-side record of a temporary SSO token.

use plume_core::error::CoreError;
use plume_core::sso::SsoTokenStatus;
use plume_core::types::{DbId, Timestamp};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::media_reference::MediaReference;
use crate::models::sso_session::SsoSession;

/// A row from the `sso_tokens` table.
#[derive(Debug, Clone, FromRow)]
pub struct SsoToken {
    pub id: DbId,
    pub jti: Uuid,
    pub product_id: DbId,
    pub product_user_id: DbId,
    pub user_id: DbId,
    pub code_challenge: String,
    pub scopes: Vec<String>,
    pub data_access_level: String,
    pub redirect_url: String,
    pub status: String,
    pub expires_at: Timestamp,
    pub redeemed_at: Option<Timestamp>,
    pub ip_address: Option<String>,
    pub created_at: Timestamp,
}

impl SsoToken {
    pub fn status(&self) -> Result<SsoTokenStatus, CoreError> {
        self.status.parse()
    }
}

/// DTO for recording a freshly issued token.
#[derive(Debug)]
pub struct CreateSsoToken {
    pub jti: Uuid,
    pub product_id: DbId,
    pub product_user_id: DbId,
    pub user_id: DbId,
    pub code_challenge: String,
    pub scopes: Vec<String>,
    pub data_access_level: String,
    pub redirect_url: String,
    pub expires_at: Timestamp,
    pub ip_address: Option<String>,
}

/// Session details supplied by the caller when a token is exchanged. The
/// rest of the session is copied from the token row.
#[derive(Debug)]
pub struct ExchangeSession {
    pub refresh_token_hash: String,
    pub expires_at: Timestamp,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// Everything written by a successful exchange.
#[derive(Debug)]
pub struct TokenExchange {
    pub token: SsoToken,
    pub session: SsoSession,
    pub media: Vec<MediaReference>,
}
