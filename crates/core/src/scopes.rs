//! Trust scopes granted to a handed-off session.
//!
//! Scopes travel in JWT claims as a single space-separated string (the OAuth
//! convention) and are stored in the database as `TEXT[]`.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A single permission an external product may request for its users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "profile")]
    Profile,
    #[serde(rename = "media:read")]
    MediaRead,
    #[serde(rename = "media:write")]
    MediaWrite,
    #[serde(rename = "posts:read")]
    PostsRead,
    #[serde(rename = "posts:write")]
    PostsWrite,
}

impl Scope {
    pub const ALL: [Scope; 5] = [
        Scope::Profile,
        Scope::MediaRead,
        Scope::MediaWrite,
        Scope::PostsRead,
        Scope::PostsWrite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Profile => "profile",
            Scope::MediaRead => "media:read",
            Scope::MediaWrite => "media:write",
            Scope::PostsRead => "posts:read",
            Scope::PostsWrite => "posts:write",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::ALL
            .into_iter()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown scope: '{s}'")))
    }
}

/// A deduplicated, ordered set of scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSet(BTreeSet<Scope>);

impl ScopeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a list of scope names. Unknown names are a validation error.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Self, CoreError> {
        names
            .iter()
            .map(|name| name.as_ref().trim().parse::<Scope>())
            .collect::<Result<BTreeSet<_>, _>>()
            .map(ScopeSet)
    }

    /// Parse the space-separated form carried in token claims.
    pub fn parse_claim(claim: &str) -> Result<Self, CoreError> {
        let names: Vec<&str> = claim.split_whitespace().collect();
        Self::parse_list(&names)
    }

    /// Render as the space-separated claim form.
    pub fn to_claim(&self) -> String {
        self.0
            .iter()
            .map(Scope::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Render as owned names, suitable for a `TEXT[]` column.
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().map(|s| s.as_str().to_string()).collect()
    }

    pub fn insert(&mut self, scope: Scope) {
        self.0.insert(scope);
    }

    pub fn contains(&self, scope: Scope) -> bool {
        self.0.contains(&scope)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scope> {
        self.0.iter()
    }

    /// Reject any scope the product is not allowed to grant.
    pub fn ensure_subset_of(&self, allowed: &ScopeSet) -> Result<(), CoreError> {
        match self.0.iter().find(|s| !allowed.contains(**s)) {
            Some(scope) => Err(CoreError::Forbidden(format!(
                "Scope '{scope}' is not allowed for this product"
            ))),
            None => Ok(()),
        }
    }

    /// Require a scope to be present, failing with 403 semantics otherwise.
    pub fn require(&self, scope: Scope) -> Result<(), CoreError> {
        if self.contains(scope) {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!("Missing required scope '{scope}'")))
        }
    }
}

impl FromIterator<Scope> for ScopeSet {
    fn from_iter<T: IntoIterator<Item = Scope>>(iter: T) -> Self {
        ScopeSet(iter.into_iter().collect())
    }
}

/// Resolve the scopes to grant for a handshake.
///
/// An empty request falls back to the product defaults. `profile` is always
/// part of the result, and the final set must stay within `allowed`.
pub fn resolve_requested(
    requested: &[String],
    defaults: &ScopeSet,
    allowed: &ScopeSet,
) -> Result<ScopeSet, CoreError> {
    let mut granted = if requested.is_empty() {
        defaults.clone()
    } else {
        ScopeSet::parse_list(requested)?
    };
    granted.insert(Scope::Profile);

    let mut ceiling = allowed.clone();
    ceiling.insert(Scope::Profile);
    granted.ensure_subset_of(&ceiling)?;

    Ok(granted)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn set(names: &[&str]) -> ScopeSet {
        ScopeSet::parse_list(names).expect("valid scopes")
    }

    #[test]
    fn parses_and_dedups() {
        let scopes = set(&["media:read", "profile", "media:read"]);
        assert_eq!(scopes.len(), 2);
        assert_eq!(scopes.to_claim(), "profile media:read");
    }

    #[test]
    fn unknown_scope_is_rejected() {
        let result = ScopeSet::parse_list(&["media:delete"]);
        assert_matches!(result, Err(CoreError::Validation(msg)) if msg.contains("media:delete"));
    }

    #[test]
    fn scope_names_are_case_sensitive() {
        assert!("Media:Read".parse::<Scope>().is_err());
    }

    #[test]
    fn claim_form_round_trips() {
        let scopes = set(&["posts:write", "media:read"]);
        let parsed = ScopeSet::parse_claim(&scopes.to_claim()).unwrap();
        assert_eq!(parsed, scopes);
    }

    #[test]
    fn subset_check_names_offending_scope() {
        let allowed = set(&["profile", "media:read"]);
        let requested = set(&["media:read", "posts:write"]);
        let err = requested.ensure_subset_of(&allowed).unwrap_err();
        assert_matches!(err, CoreError::Forbidden(msg) if msg.contains("posts:write"));
    }

    #[test]
    fn empty_request_uses_defaults_plus_profile() {
        let defaults = set(&["media:read"]);
        let allowed = set(&["media:read", "media:write"]);
        let granted = resolve_requested(&[], &defaults, &allowed).unwrap();
        assert!(granted.contains(Scope::Profile));
        assert!(granted.contains(Scope::MediaRead));
        assert!(!granted.contains(Scope::MediaWrite));
    }

    #[test]
    fn profile_is_granted_even_when_not_listed() {
        let allowed = set(&["media:read"]);
        let granted =
            resolve_requested(&["media:read".to_string()], &ScopeSet::new(), &allowed).unwrap();
        assert!(granted.contains(Scope::Profile));
    }

    #[test]
    fn request_beyond_allowed_is_forbidden() {
        let allowed = set(&["media:read"]);
        let result = resolve_requested(&["posts:write".to_string()], &ScopeSet::new(), &allowed);
        assert_matches!(result, Err(CoreError::Forbidden(_)));
    }

    #[test]
    fn require_reports_missing_scope() {
        let scopes = set(&["profile"]);
        assert!(scopes.require(Scope::Profile).is_ok());
        assert_matches!(scopes.require(Scope::MediaRead), Err(CoreError::Forbidden(_)));
    }
}
