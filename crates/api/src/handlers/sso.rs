//! Handlers for the SSO handoff lifecycle.
//!
//! A product calls `initiate` server-to-server and receives a temporary token.
//! The browser lands on the web app, which calls `callback` with that token and
//! the PKCE verifier to obtain a session. Products introspect session tokens
//! with `validate` and can cut a user off with `revoke_user`.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use plume_core::access::{self, DataAccessLevel};
use plume_core::error::CoreError;
use plume_core::media::{validate_preload, MediaDescriptor};
use plume_core::pkce;
use plume_core::redirect::validate_redirect;
use plume_core::scopes::resolve_requested;
use plume_core::sso::{
    check_redeemable, normalize_email, transition, RedeemCheck, SsoTokenEvent, SsoTokenStatus,
};
use plume_core::types::{DbId, Timestamp};
use plume_db::models::media_reference::{MediaOwner, MediaReference, MEDIA_STATUS_PENDING};
use plume_db::models::product_user::UpsertProductUser;
use plume_db::models::sso_session::SsoSession;
use plume_db::models::sso_token::{CreateSsoToken, ExchangeSession, SsoToken, TokenExchange};
use plume_db::models::user::{CreateUser, User};
use plume_db::repositories::{
    MediaReferenceRepo, ProductUserRepo, SaasProductRepo, SsoSessionRepo, SsoTokenRepo, UserRepo,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{ClientMeta, ProductSummary};
use crate::auth::jwt::{
    generate_access_token, generate_refresh_token, generate_temp_token, hash_refresh_token,
    validate_access_token, validate_temp_token,
};
use crate::error::{AppError, AppResult};
use crate::middleware::product::ProductClient;
use crate::middleware::session::{grant_problem, SsoUser};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /sso/initiate`.
#[derive(Debug, Deserialize, Validate)]
pub struct InitiateRequest {
    /// The user's id inside the calling product.
    #[validate(length(min = 1, max = 255))]
    pub external_user_id: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 255))]
    pub display_name: Option<String>,
    #[validate(length(min = 1, max = 2048))]
    pub redirect_url: String,
    /// Requested scopes. Empty means the product defaults.
    #[serde(default)]
    pub scopes: Vec<String>,
    pub data_access_level: Option<String>,
    pub code_challenge: String,
    pub code_challenge_method: Option<String>,
    /// Media to preload into the user's library on exchange.
    #[serde(default)]
    pub media: Vec<MediaDescriptor>,
}

#[derive(Debug, Serialize)]
pub struct InitiateResponse {
    pub token: String,
    /// Token lifetime in seconds.
    pub expires_in: i64,
    pub expires_at: Timestamp,
    /// Where to send the user's browser to complete the handoff.
    pub login_url: String,
}

/// Request body for `POST /sso/callback`.
#[derive(Debug, Deserialize, Validate)]
pub struct CallbackRequest {
    #[validate(length(min = 1))]
    pub token: String,
    pub code_verifier: String,
}

/// Tokens returned by `callback` and `refresh`.
#[derive(Debug, Serialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    #[serde(flatten)]
    pub tokens: SessionTokens,
    pub session_id: DbId,
    pub redirect_url: String,
    pub user: User,
    pub product: ProductSummary,
    pub scopes: Vec<String>,
    pub data_access_level: String,
    pub media: Vec<MediaReference>,
}

/// Request body for `POST /sso/validate`.
#[derive(Debug, Deserialize, Validate)]
pub struct ValidateRequest {
    #[validate(length(min = 1))]
    pub access_token: String,
}

/// Introspection result. Only `valid` and `reason` are set for a rejected token.
#[derive(Debug, Default, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<DbId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<DbId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_access_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
}

impl ValidateResponse {
    fn rejected(reason: &'static str) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
            ..Default::default()
        }
    }
}

/// Request body for `POST /sso/refresh`.
#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

/// Response of `GET /sso/session`.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: DbId,
    pub user: User,
    pub product: ProductSummary,
    pub external_user_id: String,
    pub scopes: Vec<String>,
    pub data_access_level: DataAccessLevel,
    pub expires_at: Timestamp,
}

#[derive(Debug, Serialize)]
pub struct RevokeUserResponse {
    pub external_user_id: String,
    pub revoked_sessions: u64,
    pub revoked_tokens: u64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/sso/initiate
///
/// Issue a temporary token for one of the calling product's users.
pub async fn initiate(
    State(state): State<AppState>,
    ProductClient(product): ProductClient,
    headers: HeaderMap,
    Json(mut input): Json<InitiateRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<InitiateResponse>>)> {
    if !product.sso_enabled {
        return Err(AppError::Core(CoreError::Forbidden(
            "SSO is disabled for this product".into(),
        )));
    }
    // Products send emails as their users typed them.
    input.email = normalize_email(&input.email);
    input.validate()?;

    let sso = &state.config.sso;

    // 1. Validate everything the caller controls before touching the database.
    pkce::validate_method(input.code_challenge_method.as_deref())?;
    pkce::validate_challenge(&input.code_challenge)?;
    let redirect = validate_redirect(
        &input.redirect_url,
        &product.allowed_redirect_urls,
        sso.allow_insecure_localhost,
    )?;
    let scopes = resolve_requested(
        &input.scopes,
        &product.default_scope_set()?,
        &product.allowed_scope_set()?,
    )?;
    let requested_level = input
        .data_access_level
        .as_deref()
        .map(str::parse::<DataAccessLevel>)
        .transpose()?;
    let level = access::resolve(requested_level, product.max_level()?)?;
    let media = validate_preload(&input.media, sso.max_media_preload)?;

    // 2. Resolve the platform user, provisioning when the product allows it.
    let email = input.email.clone();
    let display_name = input
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    let user = match UserRepo::find_by_email(&state.pool, &email).await? {
        Some(user) => user,
        None if product.auto_provision_users => {
            let user = UserRepo::create(
                &state.pool,
                &CreateUser {
                    email: email.clone(),
                    display_name: display_name.clone(),
                },
            )
            .await?;
            tracing::info!(user_id = user.id, product_id = product.id, "Provisioned user via SSO");
            user
        }
        None => {
            return Err(AppError::Core(CoreError::Forbidden(
                "No account exists for this email and the product may not create one".into(),
            )))
        }
    };
    if !user.is_active {
        return Err(AppError::Core(CoreError::Forbidden(
            "Account is deactivated".into(),
        )));
    }

    // 3. Link the product's user to the platform user.
    let product_user = ProductUserRepo::upsert(
        &state.pool,
        &UpsertProductUser {
            product_id: product.id,
            user_id: user.id,
            external_user_id: input.external_user_id.trim().to_string(),
            external_email: email,
            display_name,
        },
    )
    .await?
    .ok_or_else(|| {
        AppError::Core(CoreError::Conflict(
            "External user is already linked to a different account".into(),
        ))
    })?;

    // 4. Record the token and any media it carries.
    let jti = Uuid::new_v4();
    let expires_at = Utc::now() + chrono::Duration::seconds(sso.temp_token_ttl_secs);
    let meta = ClientMeta::from_headers(&headers);

    let token_row = SsoTokenRepo::create(
        &state.pool,
        &CreateSsoToken {
            jti,
            product_id: product.id,
            product_user_id: product_user.id,
            user_id: user.id,
            code_challenge: input.code_challenge.clone(),
            scopes: scopes.to_vec(),
            data_access_level: level.as_str().to_string(),
            redirect_url: redirect.to_string(),
            expires_at,
            ip_address: meta.ip_address,
        },
    )
    .await?;

    if !media.is_empty() {
        let owner = MediaOwner {
            product_id: product.id,
            product_user_id: product_user.id,
            sso_token_id: Some(token_row.id),
        };
        MediaReferenceRepo::upsert_batch(&state.pool, owner, &media, MEDIA_STATUS_PENDING).await?;
    }

    let token = generate_temp_token(
        user.id,
        product.id,
        jti,
        sso.temp_token_ttl_secs,
        &state.config.jwt,
    )
    .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    tracing::info!(
        product_id = product.id,
        user_id = user.id,
        %jti,
        scopes = %scopes.to_claim(),
        level = %level,
        media = media.len(),
        "SSO token issued"
    );

    let login_url = format!("{}/sso/callback?token={token}", state.config.public_url);

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: InitiateResponse {
                token,
                expires_in: sso.temp_token_ttl_secs,
                expires_at,
                login_url,
            },
        }),
    ))
}

/// POST /api/sso/callback
///
/// Exchange a temporary token plus PKCE verifier for a session.
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<CallbackRequest>,
) -> AppResult<Json<DataResponse<CallbackResponse>>> {
    input.validate()?;

    // 1. Signature, expiry, audience, type.
    let claims = validate_temp_token(&input.token, &state.config.jwt).map_err(|_| {
        AppError::Core(CoreError::Unauthorized("Invalid or expired SSO token".into()))
    })?;
    let jti = Uuid::parse_str(&claims.jti)
        .map_err(|_| AppError::Core(CoreError::Unauthorized("Invalid SSO token".into())))?;

    // 2. The server-side record is authoritative.
    let row = SsoTokenRepo::find_by_jti(&state.pool, jti)
        .await?
        .filter(|t| t.product_id == claims.pid && t.user_id == claims.sub)
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("Unknown SSO token".into())))?;

    let status = ensure_redeemable(&state, &row).await?;

    // 3. Proof of possession. A wrong verifier burns the token.
    if !pkce::verify(&input.code_verifier, &row.code_challenge) {
        let burned = transition(status, SsoTokenEvent::Revoke)?;
        SsoTokenRepo::revoke(&state.pool, jti).await?;
        tracing::warn!(%jti, product_id = row.product_id, status = %burned, "SSO challenge failed");
        return Err(AppError::Core(CoreError::Unauthorized(
            "Code verifier does not match the challenge".into(),
        )));
    }

    // 4. The product or user may have been disabled since issuance.
    let product = SaasProductRepo::find_by_id(&state.pool, row.product_id)
        .await?
        .filter(|p| p.accepts_sso())
        .ok_or_else(|| {
            AppError::Core(CoreError::Forbidden(
                "Product is not accepting SSO".into(),
            ))
        })?;
    let user = UserRepo::find_by_id(&state.pool, row.user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Core(CoreError::Forbidden("Account is deactivated".into())))?;

    // 5. Single use. Redeem, session, media and bookkeeping commit together,
    //    and only one concurrent caller gets a result back.
    let redeemed = transition(status, SsoTokenEvent::Redeem)?;
    let meta = ClientMeta::from_headers(&headers);
    let (refresh_token, refresh_hash) = generate_refresh_token();
    let exchange = SsoTokenRepo::exchange(
        &state.pool,
        jti,
        &ExchangeSession {
            refresh_token_hash: refresh_hash,
            expires_at: Utc::now()
                + chrono::Duration::days(state.config.jwt.refresh_token_expiry_days),
            user_agent: meta.user_agent,
            ip_address: meta.ip_address,
        },
    )
    .await?;
    let Some(TokenExchange {
        token,
        session,
        media,
    }) = exchange
    else {
        // The row changed since step 2, usually because another presentation
        // of the same token won the race.
        if let Some(current) = SsoTokenRepo::find_by_jti(&state.pool, jti).await? {
            ensure_redeemable(&state, &current).await?;
        }
        return Err(AppError::Core(CoreError::Unauthorized(
            "SSO token could not be redeemed".into(),
        )));
    };

    let tokens = session_tokens(&state, &session, refresh_token)?;

    tracing::info!(
        %jti,
        product_id = product.id,
        user_id = user.id,
        session_id = session.id,
        media = media.len(),
        status = %redeemed,
        "SSO token exchanged"
    );

    Ok(Json(DataResponse {
        data: CallbackResponse {
            tokens,
            session_id: session.id,
            redirect_url: token.redirect_url,
            user,
            product: ProductSummary::from(&product),
            scopes: session.scopes,
            data_access_level: session.data_access_level,
            media,
        },
    }))
}

/// POST /api/sso/validate
///
/// Introspect an access token on behalf of the product that owns its session.
/// Always answers 200; an unusable token yields `valid: false` and a reason.
pub async fn validate(
    State(state): State<AppState>,
    ProductClient(product): ProductClient,
    Json(input): Json<ValidateRequest>,
) -> AppResult<Json<DataResponse<ValidateResponse>>> {
    input.validate()?;

    let data = introspect(&state, product.id, &input.access_token).await?;
    if let Some(reason) = data.reason {
        tracing::debug!(product_id = product.id, reason, "Access token rejected");
    }

    Ok(Json(DataResponse { data }))
}

/// POST /api/sso/refresh
///
/// Rotate a refresh token. The presented token stops working immediately.
pub async fn refresh(
    State(state): State<AppState>,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<DataResponse<SessionTokens>>> {
    input.validate()?;

    let old_hash = hash_refresh_token(&input.refresh_token);
    let session = SsoSessionRepo::find_active_by_refresh_hash(&state.pool, &old_hash)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid or expired refresh token".into(),
            ))
        })?;

    // The grant only stays valid while its user, product and link do.
    if let Some(reason) = grant_problem(&state, &session).await? {
        SsoSessionRepo::revoke(&state.pool, session.id).await?;
        tracing::info!(session_id = session.id, reason, "Session revoked on refresh");
        return Err(AppError::Core(CoreError::Forbidden(format!(
            "Session can no longer be refreshed: {reason}"
        ))));
    }

    let (refresh_token, new_hash) = generate_refresh_token();
    let expires_at =
        Utc::now() + chrono::Duration::days(state.config.jwt.refresh_token_expiry_days);

    let rotated =
        SsoSessionRepo::rotate_refresh(&state.pool, session.id, &old_hash, &new_hash, expires_at)
            .await?
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Invalid or expired refresh token".into(),
                ))
            })?;

    tracing::debug!(session_id = rotated.id, "Refresh token rotated");

    let tokens = session_tokens(&state, &rotated, refresh_token)?;
    Ok(Json(DataResponse { data: tokens }))
}

/// POST /api/sso/logout
///
/// Revoke the current session. Returns 204 No Content.
pub async fn logout(State(state): State<AppState>, user: SsoUser) -> AppResult<StatusCode> {
    SsoSessionRepo::revoke(&state.pool, user.session_id).await?;
    tracing::info!(session_id = user.session_id, user_id = user.user_id, "SSO session ended");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/sso/session
pub async fn session(
    State(state): State<AppState>,
    user: SsoUser,
) -> AppResult<Json<DataResponse<SessionView>>> {
    let account = UserRepo::find_by_id(&state.pool, user.user_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("User", user.user_id)))?;
    let product = SaasProductRepo::find_by_id(&state.pool, user.product_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("SaasProduct", user.product_id)))?;
    let link = ProductUserRepo::find_by_id(&state.pool, user.product_user_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("ProductUser", user.product_user_id)))?;

    Ok(Json(DataResponse {
        data: SessionView {
            session_id: user.session_id,
            user: account,
            product: ProductSummary::from(&product),
            external_user_id: link.external_user_id,
            scopes: user.scopes.to_vec(),
            data_access_level: user.level,
            expires_at: user.expires_at,
        },
    }))
}

/// POST /api/sso/users/{external_user_id}/revoke
///
/// End every session and outstanding temporary token of one product user.
pub async fn revoke_user(
    State(state): State<AppState>,
    ProductClient(product): ProductClient,
    Path(external_user_id): Path<String>,
) -> AppResult<Json<DataResponse<RevokeUserResponse>>> {
    let link = ProductUserRepo::find_by_external(&state.pool, product.id, &external_user_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("ProductUser", &external_user_id)))?;

    let revoked_sessions = SsoSessionRepo::revoke_all_for_product_user(&state.pool, link.id).await?;
    let revoked_tokens = SsoTokenRepo::revoke_issued_for_product_user(&state.pool, link.id).await?;

    tracing::info!(
        product_id = product.id,
        product_user_id = link.id,
        revoked_sessions,
        revoked_tokens,
        "Revoked SSO access for product user"
    );

    Ok(Json(DataResponse {
        data: RevokeUserResponse {
            external_user_id,
            revoked_sessions,
            revoked_tokens,
        },
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn session_tokens(
    state: &AppState,
    session: &SsoSession,
    refresh_token: String,
) -> AppResult<SessionTokens> {
    let access_token = generate_access_token(session, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    Ok(SessionTokens {
        access_token,
        refresh_token,
        token_type: "Bearer",
        expires_in: state.config.jwt.access_token_expiry_mins * 60,
    })
}

/// Reject a token that cannot be exchanged. Presenting a redeemed token again
/// is a replay and ends the sessions it produced.
async fn ensure_redeemable(state: &AppState, row: &SsoToken) -> AppResult<SsoTokenStatus> {
    let status = row.status()?;
    let check = check_redeemable(status, row.expires_at, Utc::now());
    if check == RedeemCheck::Replayed {
        let revoked = SsoSessionRepo::revoke_for_sso_token(&state.pool, row.id).await?;
        tracing::warn!(
            jti = %row.jti,
            product_id = row.product_id,
            user_id = row.user_id,
            revoked_sessions = revoked,
            "SSO token replayed, derived sessions revoked"
        );
    }
    check.into_result()?;
    Ok(status)
}

async fn introspect(
    state: &AppState,
    product_id: DbId,
    access_token: &str,
) -> AppResult<ValidateResponse> {
    let Ok(claims) = validate_access_token(access_token, &state.config.jwt) else {
        return Ok(ValidateResponse::rejected("invalid_token"));
    };
    if claims.pid != product_id {
        return Ok(ValidateResponse::rejected("product_mismatch"));
    }

    let Some(session) = SsoSessionRepo::find_active_by_id(&state.pool, claims.sid)
        .await?
        .filter(|s| s.user_id == claims.sub)
    else {
        return Ok(ValidateResponse::rejected("session_revoked"));
    };

    if let Some(reason) = grant_problem(state, &session).await? {
        return Ok(ValidateResponse::rejected(reason));
    }

    let user = UserRepo::find_by_id(&state.pool, session.user_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("User", session.user_id)))?;
    let link = ProductUserRepo::find_by_id(&state.pool, session.product_user_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::not_found("ProductUser", session.product_user_id))
        })?;

    Ok(ValidateResponse {
        valid: true,
        reason: None,
        user_id: Some(user.id),
        session_id: Some(session.id),
        external_user_id: Some(link.external_user_id),
        email: Some(user.email),
        scopes: Some(session.scopes),
        data_access_level: Some(session.data_access_level),
        expires_at: Some(session.expires_at),
    })
}
