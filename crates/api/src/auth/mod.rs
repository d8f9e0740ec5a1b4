//! Token primitives.
//!
//! - [`jwt`] -- temporary handoff tokens, session access tokens, and
//!   refresh-token helpers.

pub mod jwt;
