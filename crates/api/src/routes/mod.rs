pub mod health;
pub mod products;
pub mod sso;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /sso/initiate                                   issue temporary token (product key)
/// /sso/callback                                   exchange token + verifier (public)
/// /sso/validate                                   introspect access token (product key)
/// /sso/refresh                                    rotate refresh token (public)
/// /sso/logout                                     end session (session)
/// /sso/session                                    current session (session)
/// /sso/media                                      attached media (session)
/// /sso/users/{external_user_id}/revoke            revoke user (product key)
/// /sso/users/{external_user_id}/media             preload media (product key)
///
/// /admin/products                                 list, create (admin key)
/// /admin/products/{id}                            get, update
/// /admin/products/{id}/rotate-key                 rotate key (POST)
/// /admin/products/{id}/deactivate                 deactivate (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // SSO handoff lifecycle and handed-off media.
        .nest("/sso", sso::router())
        // Operator administration of external products.
        .nest("/admin/products", products::router())
}
