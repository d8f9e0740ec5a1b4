//! Handlers for `/admin/products` (operator administration of external products).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use plume_core::access::DataAccessLevel;
use plume_core::error::CoreError;
use plume_core::product_keys::generate_product_key;
use plume_core::redirect::validate_allow_list;
use plume_core::scopes::{Scope, ScopeSet};
use plume_core::types::DbId;
use plume_db::models::saas_product::{
    CreateSaasProduct, ProductKeyResponse, SaasProduct, UpdateSaasProduct,
};
use plume_db::repositories::{SaasProductRepo, SsoSessionRepo, SsoTokenRepo};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::admin::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

const DEFAULT_MAX_LEVEL: DataAccessLevel = DataAccessLevel::Read;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /admin/products`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 2, max = 64))]
    pub slug: String,
    pub allowed_redirect_urls: Vec<String>,
    #[serde(default)]
    pub allowed_scopes: Vec<String>,
    #[serde(default)]
    pub default_scopes: Vec<String>,
    pub max_data_access_level: Option<String>,
    #[serde(default)]
    pub auto_provision_users: bool,
}

#[derive(Debug, Serialize)]
pub struct DeactivateProductResponse {
    pub product_id: DbId,
    pub revoked_sessions: u64,
    pub revoked_tokens: u64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/admin/products
///
/// Register a product. The plaintext key appears only in this response.
pub async fn create(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<ProductKeyResponse>>)> {
    input.validate()?;
    validate_slug(&input.slug)?;
    validate_allow_list(
        &input.allowed_redirect_urls,
        state.config.sso.allow_insecure_localhost,
    )?;
    let (allowed, defaults) = normalize_scopes(&input.allowed_scopes, &input.default_scopes)?;
    let max_level = match input.max_data_access_level.as_deref() {
        Some(raw) => raw.parse::<DataAccessLevel>()?,
        None => DEFAULT_MAX_LEVEL,
    };

    let key = generate_product_key();
    let product = SaasProductRepo::create(
        &state.pool,
        &CreateSaasProduct {
            name: input.name.trim().to_string(),
            slug: input.slug,
            api_key_hash: key.hash,
            api_key_prefix: key.prefix,
            allowed_redirect_urls: input.allowed_redirect_urls,
            allowed_scopes: allowed.to_vec(),
            default_scopes: defaults.to_vec(),
            max_data_access_level: max_level.as_str().to_string(),
            auto_provision_users: input.auto_provision_users,
        },
    )
    .await?;

    tracing::info!(product_id = product.id, slug = %product.slug, "Product registered");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: ProductKeyResponse {
                product,
                api_key: key.plaintext,
            },
        }),
    ))
}

/// GET /api/admin/products
pub async fn list(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<SaasProduct>>>> {
    let products = SaasProductRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: products }))
}

/// GET /api/admin/products/{id}
pub async fn get_by_id(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<SaasProduct>>> {
    let product = find_product(&state, id).await?;
    Ok(Json(DataResponse { data: product }))
}

/// PUT /api/admin/products/{id}
///
/// Partial update. Scope lists are re-checked against each other using the
/// stored value for whichever list is omitted.
pub async fn update(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateSaasProduct>,
) -> AppResult<Json<DataResponse<SaasProduct>>> {
    let existing = find_product(&state, id).await?;

    let name = match input.name {
        Some(name) if name.trim().is_empty() => {
            return Err(AppError::Core(CoreError::Validation(
                "Product name must not be empty".into(),
            )))
        }
        other => other.map(|n| n.trim().to_string()),
    };

    if let Some(urls) = &input.allowed_redirect_urls {
        validate_allow_list(urls, state.config.sso.allow_insecure_localhost)?;
    }

    let scopes_changed = input.allowed_scopes.is_some() || input.default_scopes.is_some();
    let (allowed_scopes, default_scopes) = if scopes_changed {
        let (allowed, defaults) = normalize_scopes(
            input
                .allowed_scopes
                .as_deref()
                .unwrap_or(existing.allowed_scopes.as_slice()),
            input
                .default_scopes
                .as_deref()
                .unwrap_or(existing.default_scopes.as_slice()),
        )?;
        (Some(allowed.to_vec()), Some(defaults.to_vec()))
    } else {
        (None, None)
    };

    let max_data_access_level = input
        .max_data_access_level
        .as_deref()
        .map(|raw| raw.parse::<DataAccessLevel>().map(|l| l.as_str().to_string()))
        .transpose()?;

    let normalized = UpdateSaasProduct {
        name,
        allowed_redirect_urls: input.allowed_redirect_urls,
        allowed_scopes,
        default_scopes,
        max_data_access_level,
        auto_provision_users: input.auto_provision_users,
        sso_enabled: input.sso_enabled,
    };

    let product = SaasProductRepo::update(&state.pool, id, &normalized)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("SaasProduct", id)))?;

    tracing::info!(product_id = id, "Product updated");
    Ok(Json(DataResponse { data: product }))
}

/// POST /api/admin/products/{id}/rotate-key
///
/// Replace the product key. The old key stops working immediately.
pub async fn rotate_key(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<ProductKeyResponse>>> {
    let key = generate_product_key();
    let product = SaasProductRepo::rotate_key(&state.pool, id, &key.hash, &key.prefix)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("SaasProduct", id)))?;

    tracing::info!(product_id = id, prefix = %key.prefix, "Product key rotated");

    Ok(Json(DataResponse {
        data: ProductKeyResponse {
            product,
            api_key: key.plaintext,
        },
    }))
}

/// POST /api/admin/products/{id}/deactivate
///
/// Deactivate a product and end everything issued through it.
pub async fn deactivate(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<DeactivateProductResponse>>> {
    find_product(&state, id).await?;

    SaasProductRepo::deactivate(&state.pool, id).await?;
    let revoked_sessions = SsoSessionRepo::revoke_all_for_product(&state.pool, id).await?;
    let revoked_tokens = SsoTokenRepo::revoke_issued_for_product(&state.pool, id).await?;

    tracing::info!(
        product_id = id,
        revoked_sessions,
        revoked_tokens,
        "Product deactivated"
    );

    Ok(Json(DataResponse {
        data: DeactivateProductResponse {
            product_id: id,
            revoked_sessions,
            revoked_tokens,
        },
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_product(state: &AppState, id: DbId) -> AppResult<SaasProduct> {
    SaasProductRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("SaasProduct", id)))
}

/// Slugs are lowercase ASCII words joined by single hyphens.
fn validate_slug(slug: &str) -> Result<(), CoreError> {
    let well_formed = slug.split('-').all(|part| {
        !part.is_empty()
            && part
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    });
    if well_formed {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Slug '{slug}' must be lowercase letters, digits and single hyphens"
        )))
    }
}

/// Parse both scope lists, add `profile` to the allowed set, and require the
/// defaults to stay inside it.
fn normalize_scopes(
    allowed: &[String],
    defaults: &[String],
) -> Result<(ScopeSet, ScopeSet), CoreError> {
    let mut allowed = ScopeSet::parse_list(allowed)?;
    allowed.insert(Scope::Profile);

    let mut defaults = ScopeSet::parse_list(defaults)?;
    defaults.insert(Scope::Profile);
    defaults.ensure_subset_of(&allowed)?;

    Ok((allowed, defaults))
}
