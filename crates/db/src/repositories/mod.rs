//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. `*_inner` helpers run inside a
//! caller's transaction.

pub mod media_reference_repo;
pub mod product_user_repo;
pub mod saas_product_repo;
pub mod sso_session_repo;
pub mod sso_token_repo;
pub mod user_repo;

pub use media_reference_repo::MediaReferenceRepo;
pub use product_user_repo::ProductUserRepo;
pub use saas_product_repo::SaasProductRepo;
pub use sso_session_repo::SsoSessionRepo;
pub use sso_token_repo::SsoTokenRepo;
pub use user_repo::UserRepo;
