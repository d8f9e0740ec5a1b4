//! PKCE-style challenge binding for the SSO handshake (RFC 7636, S256 only).
//!
//! The product sends `code_challenge = BASE64URL(SHA256(code_verifier))` when
//! it initiates the handoff and keeps the verifier. Only the party holding the
//! verifier can redeem the temporary token.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::CoreError;

/// The only supported challenge method.
pub const METHOD_S256: &str = "S256";

/// Length of a base64url-encoded SHA-256 digest without padding.
pub const CHALLENGE_LENGTH: usize = 43;

pub const VERIFIER_MIN_LENGTH: usize = 43;
pub const VERIFIER_MAX_LENGTH: usize = 128;

/// Reject every method except `S256`. A missing method means `S256`.
pub fn validate_method(method: Option<&str>) -> Result<(), CoreError> {
    match method.unwrap_or(METHOD_S256) {
        METHOD_S256 => Ok(()),
        other => Err(CoreError::Validation(format!(
            "Unsupported code_challenge_method '{other}', only S256 is accepted"
        ))),
    }
}

/// Check the shape of a challenge sent at initiation time.
pub fn validate_challenge(challenge: &str) -> Result<(), CoreError> {
    let well_formed = challenge.len() == CHALLENGE_LENGTH
        && challenge
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if well_formed {
        Ok(())
    } else {
        Err(CoreError::Validation(
            "code_challenge must be a 43 character base64url SHA-256 digest".into(),
        ))
    }
}

/// Check the shape of a verifier presented at exchange time.
pub fn validate_verifier(verifier: &str) -> Result<(), CoreError> {
    let len_ok = (VERIFIER_MIN_LENGTH..=VERIFIER_MAX_LENGTH).contains(&verifier.len());
    let charset_ok = verifier
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'));
    if len_ok && charset_ok {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "code_verifier must be {VERIFIER_MIN_LENGTH}-{VERIFIER_MAX_LENGTH} unreserved characters"
        )))
    }
}

/// Derive the S256 challenge for a verifier.
pub fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Verify a verifier against the stored challenge in constant time.
///
/// Returns `false` for malformed verifiers instead of erroring so callers
/// treat every mismatch the same way.
pub fn verify(verifier: &str, challenge: &str) -> bool {
    if validate_verifier(verifier).is_err() {
        return false;
    }
    let derived = challenge_for(verifier);
    derived.as_bytes().ct_eq(challenge.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    // Appendix B of RFC 7636.
    const RFC_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const RFC_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    #[test]
    fn derives_rfc_challenge() {
        assert_eq!(challenge_for(RFC_VERIFIER), RFC_CHALLENGE);
    }

    #[test]
    fn verify_accepts_matching_pair() {
        assert!(verify(RFC_VERIFIER, RFC_CHALLENGE));
    }

    #[test]
    fn verify_rejects_other_verifier() {
        let other = "x".repeat(43);
        assert!(!verify(&other, RFC_CHALLENGE));
    }

    #[test]
    fn verify_rejects_short_verifier_even_if_hash_matches() {
        let short = "abc";
        let challenge = challenge_for(short);
        assert!(!verify(short, &challenge));
    }

    #[test]
    fn challenge_shape_is_checked() {
        assert!(validate_challenge(RFC_CHALLENGE).is_ok());
        assert_matches!(validate_challenge("too-short"), Err(CoreError::Validation(_)));
        let padded = format!("{}=", &RFC_CHALLENGE[..42]);
        assert!(validate_challenge(&padded).is_err());
    }

    #[test]
    fn verifier_charset_is_checked() {
        let with_space = format!("{} ", "a".repeat(43));
        assert!(validate_verifier(&with_space).is_err());
        assert!(validate_verifier(&"a~b.c_d-".repeat(6)).is_ok());
        assert!(validate_verifier(&"a".repeat(129)).is_err());
    }

    #[test]
    fn only_s256_is_supported() {
        assert!(validate_method(None).is_ok());
        assert!(validate_method(Some("S256")).is_ok());
        assert_matches!(validate_method(Some("plain")), Err(CoreError::Validation(_)));
    }
}
