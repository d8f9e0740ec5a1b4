//! Product API key generation and hashing.
//!
//! External products call the server-to-server SSO endpoints with an
//! `X-Product-Key` header. The plaintext key is shown once at registration
//! or rotation; only its SHA-256 digest and a short display prefix are kept.

use rand::Rng;

/// Marker prepended to every product key.
pub const KEY_MARKER: &str = "pk_";

/// Number of random alphanumeric characters after the marker.
pub const KEY_RANDOM_LENGTH: usize = 48;

/// Number of leading characters (marker included) stored for display.
pub const KEY_PREFIX_LENGTH: usize = 11;

/// The result of generating a new product key.
pub struct GeneratedProductKey {
    /// The plaintext key (shown to the operator exactly once, never stored).
    pub plaintext: String,
    /// The first [`KEY_PREFIX_LENGTH`] characters of the key for display.
    pub prefix: String,
    /// The SHA-256 hex digest of the plaintext key (stored in the database).
    pub hash: String,
}

/// Generate a new random product key.
pub fn generate_product_key() -> GeneratedProductKey {
    let random: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(KEY_RANDOM_LENGTH)
        .map(char::from)
        .collect();
    let key = format!("{KEY_MARKER}{random}");

    GeneratedProductKey {
        prefix: extract_prefix(&key).to_string(),
        hash: hash_product_key(&key),
        plaintext: key,
    }
}

/// Compute the SHA-256 hex digest of a product key.
pub fn hash_product_key(key: &str) -> String {
    crate::hashing::sha256_hex(key.as_bytes())
}

/// Extract the display prefix from a plaintext key.
pub fn extract_prefix(key: &str) -> &str {
    let end = key
        .char_indices()
        .nth(KEY_PREFIX_LENGTH)
        .map_or(key.len(), |(idx, _)| idx);
    &key[..end]
}

/// Cheap shape check before touching the database.
pub fn looks_like_product_key(key: &str) -> bool {
    key.len() == KEY_MARKER.len() + KEY_RANDOM_LENGTH
        && key.starts_with(KEY_MARKER)
        && key[KEY_MARKER.len()..]
            .bytes()
            .all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_has_marker_and_length() {
        let key = generate_product_key();
        assert!(key.plaintext.starts_with(KEY_MARKER));
        assert_eq!(key.plaintext.len(), KEY_MARKER.len() + KEY_RANDOM_LENGTH);
        assert!(looks_like_product_key(&key.plaintext));
    }

    #[test]
    fn prefix_matches_start() {
        let key = generate_product_key();
        assert_eq!(&key.plaintext[..KEY_PREFIX_LENGTH], key.prefix);
    }

    #[test]
    fn hash_matches_regeneration() {
        let key = generate_product_key();
        assert_eq!(key.hash, hash_product_key(&key.plaintext));
        assert_eq!(key.hash.len(), 64);
    }

    #[test]
    fn different_keys_produce_different_hashes() {
        let a = generate_product_key();
        let b = generate_product_key();
        assert_ne!(a.plaintext, b.plaintext);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn extract_prefix_handles_short_key() {
        assert_eq!(extract_prefix("pk_ab"), "pk_ab");
    }

    #[test]
    fn shape_check_rejects_garbage() {
        assert!(!looks_like_product_key("pk_short"));
        assert!(!looks_like_product_key(&format!("sk_{}", "a".repeat(48))));
        assert!(!looks_like_product_key(&format!("pk_{}!", "a".repeat(47))));
    }
}
