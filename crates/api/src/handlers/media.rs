//! Handlers for product-scoped media.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use plume_core::access::DataAccessLevel;
use plume_core::error::CoreError;
use plume_core::media::{validate_preload, MediaDescriptor};
use plume_core::scopes::Scope;
use plume_db::models::media_reference::{MediaOwner, MediaReference, MEDIA_STATUS_ATTACHED};
use plume_db::repositories::{MediaReferenceRepo, ProductUserRepo};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::product::ProductClient;
use crate::middleware::session::SsoUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /sso/users/{external_user_id}/media`.
#[derive(Debug, Deserialize)]
pub struct PreloadMediaRequest {
    pub media: Vec<MediaDescriptor>,
}

/// GET /api/sso/media
///
/// Attached media of the session's product user. Needs `media:read` and at
/// least `read` access.
pub async fn list(
    State(state): State<AppState>,
    user: SsoUser,
) -> AppResult<Json<DataResponse<Vec<MediaReference>>>> {
    user.require(Scope::MediaRead, DataAccessLevel::Read)?;

    let media =
        MediaReferenceRepo::list_attached_for_product_user(&state.pool, user.product_user_id)
            .await?;
    Ok(Json(DataResponse { data: media }))
}

/// POST /api/sso/users/{external_user_id}/media
///
/// Push media for an already linked user outside of a handshake. Items are
/// stored attached; known external ids are updated in place.
pub async fn preload(
    State(state): State<AppState>,
    ProductClient(product): ProductClient,
    Path(external_user_id): Path<String>,
    Json(input): Json<PreloadMediaRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Vec<MediaReference>>>)> {
    if input.media.is_empty() {
        return Err(AppError::BadRequest(
            "At least one media item is required".into(),
        ));
    }
    let media = validate_preload(&input.media, state.config.sso.max_media_preload)?;

    let link = ProductUserRepo::find_by_external(&state.pool, product.id, &external_user_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("ProductUser", &external_user_id)))?;

    let owner = MediaOwner {
        product_id: product.id,
        product_user_id: link.id,
        sso_token_id: None,
    };
    let stored =
        MediaReferenceRepo::upsert_batch(&state.pool, owner, &media, MEDIA_STATUS_ATTACHED).await?;

    tracing::info!(
        product_id = product.id,
        product_user_id = link.id,
        count = stored.len(),
        "Media preloaded"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: stored })))
}
