//! JWT generation/validation for the SSO handoff, plus refresh-token helpers.
//!
//! Two kinds of HS256 JWT share one secret and the [`TOKEN_AUDIENCE`]
//! audience, and are told apart by their `typ` claim:
//!
//! - temporary tokens ([`TempTokenClaims`]) name a server-side `sso_tokens`
//!   row by `jti` and live for a couple of minutes;
//! - access tokens ([`SessionClaims`]) carry the scopes and data access level
//!   of an `sso_sessions` row.
//!
//! Refresh tokens are opaque random strings; only their SHA-256 hash is stored
//! server-side so a database leak does not compromise active sessions.

use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use plume_core::hashing::sha256_hex;
use plume_core::sso::{TOKEN_AUDIENCE, TOKEN_TYPE_ACCESS, TOKEN_TYPE_TEMP};
use plume_core::types::DbId;
use plume_db::models::sso_session::SsoSession;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{parse_in_range, ConfigError};

/// Allowed clock skew when checking `exp`, in seconds.
const LEEWAY_SECS: u64 = 5;

/// Claims of a temporary handoff token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TempTokenClaims {
    /// Platform user id.
    pub sub: DbId,
    /// Product that initiated the handoff.
    pub pid: DbId,
    /// Id of the `sso_tokens` row.
    pub jti: String,
    pub typ: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims of a session access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    /// Platform user id.
    pub sub: DbId,
    /// Session id.
    pub sid: DbId,
    /// Product the session was handed off from.
    pub pid: DbId,
    /// Granted scopes, space separated.
    pub scope: String,
    /// Granted data access level.
    pub dal: String,
    pub typ: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Configuration for JWT token generation and validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    /// Access token lifetime in minutes (default: 15).
    pub access_token_expiry_mins: i64,
    /// Refresh token lifetime in days (default: 7).
    pub refresh_token_expiry_days: i64,
}

/// Default access token expiry in minutes.
const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;
/// Default refresh token expiry in days.
const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 7;

impl JwtConfig {
    /// Load JWT configuration through `lookup`.
    ///
    /// | Env Var                    | Required | Default |
    /// |----------------------------|----------|---------|
    /// | `JWT_SECRET`               | **yes**  | --      |
    /// | `JWT_ACCESS_EXPIRY_MINS`   | no       | `15`    |
    /// | `JWT_REFRESH_EXPIRY_DAYS`  | no       | `7`     |
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        Ok(Self {
            secret,
            access_token_expiry_mins: parse_in_range(
                lookup,
                "JWT_ACCESS_EXPIRY_MINS",
                DEFAULT_ACCESS_EXPIRY_MINS,
                1..=24 * 60,
            )?,
            refresh_token_expiry_days: parse_in_range(
                lookup,
                "JWT_REFRESH_EXPIRY_DAYS",
                DEFAULT_REFRESH_EXPIRY_DAYS,
                1..=365,
            )?,
        })
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.secret.as_bytes())
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.secret.as_bytes())
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[TOKEN_AUDIENCE]);
    validation.leeway = LEEWAY_SECS;
    validation
}

/// Sign a temporary token for the `sso_tokens` row identified by `jti`.
pub fn generate_temp_token(
    user_id: DbId,
    product_id: DbId,
    jti: Uuid,
    ttl_secs: i64,
    config: &JwtConfig,
) -> Result<String, JwtError> {
    let now = chrono::Utc::now().timestamp();
    let claims = TempTokenClaims {
        sub: user_id,
        pid: product_id,
        jti: jti.to_string(),
        typ: TOKEN_TYPE_TEMP.to_string(),
        aud: TOKEN_AUDIENCE.to_string(),
        iat: now,
        exp: now + ttl_secs,
    };
    encode(&Header::new(Algorithm::HS256), &claims, &config.encoding_key())
}

/// Validate a temporary token: signature, expiry, audience and `typ`.
pub fn validate_temp_token(token: &str, config: &JwtConfig) -> Result<TempTokenClaims, JwtError> {
    let claims = decode::<TempTokenClaims>(token, &config.decoding_key(), &validation())?.claims;
    if claims.typ != TOKEN_TYPE_TEMP {
        return Err(ErrorKind::InvalidToken.into());
    }
    Ok(claims)
}

/// Sign an access token describing `session`.
pub fn generate_access_token(session: &SsoSession, config: &JwtConfig) -> Result<String, JwtError> {
    let now = chrono::Utc::now().timestamp();
    let claims = SessionClaims {
        sub: session.user_id,
        sid: session.id,
        pid: session.product_id,
        scope: session.scopes.join(" "),
        dal: session.data_access_level.clone(),
        typ: TOKEN_TYPE_ACCESS.to_string(),
        aud: TOKEN_AUDIENCE.to_string(),
        iat: now,
        exp: now + config.access_token_expiry_mins * 60,
        jti: Uuid::new_v4().to_string(),
    };
    encode(&Header::new(Algorithm::HS256), &claims, &config.encoding_key())
}

/// Validate an access token: signature, expiry, audience and `typ`.
///
/// Session liveness is not checked here; callers look the session up.
pub fn validate_access_token(token: &str, config: &JwtConfig) -> Result<SessionClaims, JwtError> {
    let claims = decode::<SessionClaims>(token, &config.decoding_key(), &validation())?.claims;
    if claims.typ != TOKEN_TYPE_ACCESS {
        return Err(ErrorKind::InvalidToken.into());
    }
    Ok(claims)
}

/// Generate a random refresh token.
///
/// Returns `(plaintext_token, sha256_hex_hash)`. The plaintext is sent to the
/// client; only the hash is persisted.
pub fn generate_refresh_token() -> (String, String) {
    let plaintext = Uuid::new_v4().to_string();
    let hash = hash_refresh_token(&plaintext);
    (plaintext, hash)
}

/// Compute the SHA-256 hex digest of a refresh token.
pub fn hash_refresh_token(token: &str) -> String {
    sha256_hex(token.as_bytes())
}
