//! Request extractors that authenticate callers.
//!
//! - [`session::SsoUser`] -- a user holding a live handoff session (Bearer access token).
//! - [`product::ProductClient`] -- an external product calling with `X-Product-Key`.
//! - [`admin::RequireAdmin`] -- an operator calling with the configured admin key.

use axum::http::request::Parts;
use plume_core::error::CoreError;

use crate::error::AppError;

pub mod admin;
pub mod product;
pub mod session;

/// Pull the token out of an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let auth_header = parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Missing Authorization header".into(),
            ))
        })?;

    auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Core(CoreError::Unauthorized(
            "Invalid Authorization format. Expected: Bearer <token>".into(),
        ))
    })
}
