//! Domain logic for the Plume SSO handoff service.
//!
//! Everything in this crate is pure: no database, no HTTP. The `db` and
//! `api` crates build on these types and rules.

pub mod access;
pub mod error;
pub mod hashing;
pub mod media;
pub mod pkce;
pub mod product_keys;
pub mod redirect;
pub mod scopes;
pub mod sso;
pub mod types;
