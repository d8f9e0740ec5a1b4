//! Route definitions for `/admin/products`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::products;
use crate::state::AppState;

/// Routes mounted at `/admin/products`. Every route requires the admin key.
///
/// ```text
/// GET, POST  /                   -> list, create
/// GET, PUT   /{id}               -> get_by_id, update
/// POST       /{id}/rotate-key    -> rotate_key
/// POST       /{id}/deactivate    -> deactivate
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(products::list).post(products::create))
        .route("/{id}", get(products::get_by_id).put(products::update))
        .route("/{id}/rotate-key", post(products::rotate_key))
        .route("/{id}/deactivate", post(products::deactivate))
}
