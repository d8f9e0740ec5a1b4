//! Request handlers.
//!
//! - [`sso`] -- handoff lifecycle: initiate, callback, validate, refresh,
//!   logout, session, per-user revocation.
//! - [`media`] -- product-scoped media attached to handed-off users.
//! - [`products`] -- operator administration of external products.

use axum::http::HeaderMap;
use plume_db::models::saas_product::SaasProduct;
use plume_core::types::DbId;
use serde::Serialize;

pub mod media;
pub mod products;
pub mod sso;

/// Public identity of a product, embedded in handoff responses.
#[derive(Debug, Serialize)]
pub struct ProductSummary {
    pub id: DbId,
    pub name: String,
    pub slug: String,
}

impl From<&SaasProduct> for ProductSummary {
    fn from(product: &SaasProduct) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
        }
    }
}

/// Caller metadata recorded on tokens and sessions.
#[derive(Debug, Default)]
pub(crate) struct ClientMeta {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl ClientMeta {
    pub(crate) fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        Self {
            user_agent: header("user-agent").map(str::to_string),
            // First hop of X-Forwarded-For is the original client.
            ip_address: header("x-forwarded-for")
                .and_then(|v| v.split(',').next())
                .map(|v| v.trim().to_string())
                .or_else(|| header("x-real-ip").map(str::to_string)),
        }
    }
}
