//! Route definitions for the `/sso` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{media, sso};
use crate::state::AppState;

/// Routes mounted at `/sso`.
///
/// ```text
/// POST /initiate                          -> initiate (product key)
/// POST /callback                          -> callback
/// POST /validate                          -> validate (product key)
/// POST /refresh                           -> refresh
/// POST /logout                            -> logout (session)
/// GET  /session                           -> session (session)
/// GET  /media                             -> media::list (session)
/// POST /users/{external_user_id}/revoke   -> revoke_user (product key)
/// POST /users/{external_user_id}/media    -> media::preload (product key)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/initiate", post(sso::initiate))
        .route("/callback", post(sso::callback))
        .route("/validate", post(sso::validate))
        .route("/refresh", post(sso::refresh))
        .route("/logout", post(sso::logout))
        .route("/session", get(sso::session))
        .route("/media", get(media::list))
        .route("/users/{external_user_id}/revoke", post(sso::revoke_user))
        .route("/users/{external_user_id}/media", post(media::preload))
}
