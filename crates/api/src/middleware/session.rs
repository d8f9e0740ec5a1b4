//! Session-authenticated extractor for handed-off users.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use plume_core::access::DataAccessLevel;
use plume_core::error::CoreError;
use plume_core::scopes::{Scope, ScopeSet};
use plume_core::types::{DbId, Timestamp};
use plume_db::models::sso_session::SsoSession;
use plume_db::repositories::{ProductUserRepo, SaasProductRepo, SsoSessionRepo, UserRepo};

use super::bearer_token;
use crate::auth::jwt::validate_access_token;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// A user authenticated by an SSO access token whose session is still live.
///
/// Scopes and level come from the session row, not the token, so a revoked
/// or rotated session takes effect immediately. The grant is re-checked on
/// every request, the same way `/sso/validate` checks it.
///
/// ```ignore
/// async fn my_handler(user: SsoUser) -> AppResult<Json<()>> {
///     user.require(Scope::MediaRead, DataAccessLevel::Read)?;
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SsoUser {
    pub user_id: DbId,
    pub session_id: DbId,
    pub product_id: DbId,
    pub product_user_id: DbId,
    pub scopes: ScopeSet,
    pub level: DataAccessLevel,
    pub expires_at: Timestamp,
}

impl SsoUser {
    /// Require a scope and a minimum data access level.
    pub fn require(&self, scope: Scope, level: DataAccessLevel) -> Result<(), CoreError> {
        self.scopes.require(scope)?;
        self.level.require(level)
    }
}

impl FromRequestParts<AppState> for SsoUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let claims = validate_access_token(token, &state.config.jwt).map_err(|_| {
            AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
        })?;

        let session = SsoSessionRepo::find_active_by_id(&state.pool, claims.sid)
            .await?
            .filter(|s| s.user_id == claims.sub && s.product_id == claims.pid)
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Session has been revoked or has expired".into(),
                ))
            })?;

        match grant_problem(state, &session).await? {
            None => {}
            Some("user_inactive") => {
                return Err(AppError::Core(CoreError::Forbidden(
                    "Account is deactivated".into(),
                )))
            }
            Some(reason) => {
                return Err(AppError::Core(CoreError::Forbidden(format!(
                    "Session is no longer valid: {reason}"
                ))))
            }
        }

        Ok(SsoUser {
            user_id: session.user_id,
            session_id: session.id,
            product_id: session.product_id,
            product_user_id: session.product_user_id,
            scopes: session.scope_set()?,
            level: session.level()?,
            expires_at: session.expires_at,
        })
    }
}

/// Why a session's grant no longer holds, if it doesn't.
///
/// A session stays usable only while its user is active, its product accepts
/// SSO and the product user still links the two.
pub(crate) async fn grant_problem(
    state: &AppState,
    session: &SsoSession,
) -> AppResult<Option<&'static str>> {
    let user_active = UserRepo::find_by_id(&state.pool, session.user_id)
        .await?
        .is_some_and(|u| u.is_active);
    if !user_active {
        return Ok(Some("user_inactive"));
    }

    let product_ok = SaasProductRepo::find_by_id(&state.pool, session.product_id)
        .await?
        .is_some_and(|p| p.accepts_sso());
    if !product_ok {
        return Ok(Some("product_inactive"));
    }

    let linked = ProductUserRepo::find_by_id(&state.pool, session.product_user_id)
        .await?
        .is_some_and(|l| l.user_id == session.user_id && l.product_id == session.product_id);
    if !linked {
        return Ok(Some("link_removed"));
    }

    Ok(None)
}
