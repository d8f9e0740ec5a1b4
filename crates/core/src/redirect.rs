//! Redirect URL allow-listing for handoff completion.
//!
//! After a successful exchange the user is sent to the product-supplied
//! `redirect_url`. It must match one of the product's registered entries by
//! origin and by path prefix on a segment boundary.

use url::{Host, Url};

use crate::error::CoreError;

/// Parse and sanity-check a URL, independent of any allow list.
pub fn parse_redirect(raw: &str, allow_insecure_localhost: bool) -> Result<Url, CoreError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| CoreError::Validation(format!("Invalid redirect URL '{raw}': {e}")))?;

    if url.fragment().is_some() {
        return Err(CoreError::Validation(
            "Redirect URL must not contain a fragment".into(),
        ));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(CoreError::Validation(
            "Redirect URL must not contain credentials".into(),
        ));
    }

    match url.scheme() {
        "https" => {}
        "http" if allow_insecure_localhost && is_loopback(&url) => {}
        scheme => {
            return Err(CoreError::Validation(format!(
                "Redirect URL scheme '{scheme}' is not allowed"
            )))
        }
    }

    if url.host().is_none() {
        return Err(CoreError::Validation("Redirect URL must have a host".into()));
    }

    Ok(url)
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// Whether `candidate` falls under `allowed`: same origin, and the allowed
/// path is a prefix of the candidate path ending on a `/` boundary.
fn matches_entry(candidate: &Url, allowed: &Url) -> bool {
    if candidate.origin() != allowed.origin() {
        return false;
    }
    let base = allowed.path().trim_end_matches('/');
    let path = candidate.path();
    if base.is_empty() {
        return true;
    }
    path == base || path.starts_with(&format!("{base}/"))
}

/// Validate a redirect against the product allow list.
pub fn validate_redirect(
    raw: &str,
    allowed: &[String],
    allow_insecure_localhost: bool,
) -> Result<Url, CoreError> {
    let candidate = parse_redirect(raw, allow_insecure_localhost)?;

    let permitted = allowed
        .iter()
        .filter_map(|entry| parse_redirect(entry, allow_insecure_localhost).ok())
        .any(|entry| matches_entry(&candidate, &entry));

    if permitted {
        Ok(candidate)
    } else {
        Err(CoreError::Forbidden(format!(
            "Redirect URL '{raw}' is not registered for this product"
        )))
    }
}

/// Validate every entry of a product's allow list at registration time.
pub fn validate_allow_list(
    entries: &[String],
    allow_insecure_localhost: bool,
) -> Result<(), CoreError> {
    if entries.is_empty() {
        return Err(CoreError::Validation(
            "At least one allowed redirect URL is required".into(),
        ));
    }
    for entry in entries {
        let url = parse_redirect(entry, allow_insecure_localhost)?;
        if url.query().is_some() {
            return Err(CoreError::Validation(format!(
                "Allowed redirect URL '{entry}' must not contain a query"
            )));
        }
    }
    Ok(())
}
