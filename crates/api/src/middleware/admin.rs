//! Operator authentication for the product administration API.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use plume_core::error::CoreError;
use subtle::ConstantTimeEq;

use super::bearer_token;
use crate::error::AppError;
use crate::state::AppState;

/// Requires `Authorization: Bearer <ADMIN_API_KEY>`.
///
/// Rejects with 403 when no admin key is configured and 401 when the
/// presented key does not match.
pub struct RequireAdmin;

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let expected = state.config.admin_api_key.as_deref().ok_or_else(|| {
            AppError::Core(CoreError::Forbidden("Admin API is disabled".into()))
        })?;

        let presented = bearer_token(parts)?;
        if !bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
            return Err(AppError::Core(CoreError::Unauthorized(
                "Invalid admin key".into(),
            )));
        }

        Ok(RequireAdmin)
    }
}
