//! Server-to-server authentication of external products.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use plume_core::error::CoreError;
use plume_core::product_keys::{hash_product_key, looks_like_product_key};
use plume_db::models::saas_product::SaasProduct;
use plume_db::repositories::SaasProductRepo;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the product key.
pub const PRODUCT_KEY_HEADER: &str = "x-product-key";

/// The active product identified by the `X-Product-Key` header.
#[derive(Debug, Clone)]
pub struct ProductClient(pub SaasProduct);

impl FromRequestParts<AppState> for ProductClient {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get(PRODUCT_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized("Missing X-Product-Key header".into()))
            })?;

        if !looks_like_product_key(key) {
            return Err(AppError::Core(CoreError::Unauthorized(
                "Invalid product key".into(),
            )));
        }

        let product = SaasProductRepo::find_by_key_hash(&state.pool, &hash_product_key(key))
            .await?
            .ok_or_else(|| AppError::Core(CoreError::Unauthorized("Invalid product key".into())))?;

        if !product.is_active {
            tracing::warn!(product_id = product.id, "Deactivated product attempted a call");
            return Err(AppError::Core(CoreError::Forbidden(
                "Product is deactivated".into(),
            )));
        }

        Ok(ProductClient(product))
    }
}
