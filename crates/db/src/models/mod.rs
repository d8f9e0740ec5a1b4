//! Row models and DTOs, one module per table.

pub mod media_reference;
pub mod product_user;
pub mod saas_product;
pub mod sso_session;
pub mod sso_token;
pub mod user;
