//! Cache key derivation

use std::fmt;

use sha2::{Digest, Sha256};

/// Normalize prompt text before hashing
///
/// Only surrounding whitespace is removed; byte-identical prompts always
/// normalize to the same text.
pub fn normalize_prompt(prompt: &str) -> &str {
    prompt.trim()
}

/// Deterministic digest of a normalized prompt (SHA-256, lowercase hex)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Length of the hex digest
    pub const LEN: usize = 64;

    /// Derive the key for a prompt
    pub fn from_prompt(prompt: &str) -> Self {
        let digest = Sha256::digest(normalize_prompt(prompt).as_bytes());
        Self(hex::encode(digest))
    }

    /// Wrap an already-computed digest (e.g. read back from a store key)
    pub fn from_digest(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the key with a namespace prefix (e.g. `exact:`)
    pub fn namespaced(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_deterministic() {
        let a = CacheKey::from_prompt("[map[content:hello role:user]]");
        let b = CacheKey::from_prompt("[map[content:hello role:user]]");

        assert_eq!(a, b);
    }

    #[test]
    fn test_key_is_fixed_length_hex() {
        let key = CacheKey::from_prompt("anything at all");

        assert_eq!(key.as_str().len(), CacheKey::LEN);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key.as_str(), key.as_str().to_lowercase());
    }

    #[test]
    fn test_known_digest() {
        // sha256("abc")
        let key = CacheKey::from_prompt("abc");
        assert_eq!(
            key.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_different_prompts_differ() {
        assert_ne!(CacheKey::from_prompt("hi"), CacheKey::from_prompt("bye"));
    }

    #[test]
    fn test_surrounding_whitespace_normalized() {
        assert_eq!(
            CacheKey::from_prompt("  hello\n"),
            CacheKey::from_prompt("hello")
        );
    }

    #[test]
    fn test_namespaced() {
        let key = CacheKey::from_digest("abc123");
        assert_eq!(key.namespaced("exact:"), "exact:abc123");
    }
}
