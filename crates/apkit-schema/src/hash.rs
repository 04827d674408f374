//! Content digests for bundle members.

use serde::{Deserialize, Deserializer, Serialize};

/// Error returned for strings that are not a SHA-256 hex digest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid SHA-256 digest '{0}': expected 64 hex characters")]
pub struct InvalidDigest(pub String);

/// A validated SHA-256 digest (64 lower-case hex characters).
///
/// Bundle manifests list member digests in varying case and sometimes with a
/// `sha256:` prefix; both are normalized away at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Create a new `Sha256Digest`, validating the input.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidDigest`] if the hex portion is not exactly 64 ASCII
    /// hex characters.
    pub fn new(s: impl Into<String>) -> Result<Self, InvalidDigest> {
        let s = s.into();
        let hex = s.strip_prefix("sha256:").unwrap_or(&s);
        if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InvalidDigest(s));
        }
        Ok(Self(hex.to_lowercase()))
    }

    /// Build a digest from raw hash output.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Get the digest as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Sha256Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Sha256Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_prefix_and_case() {
        let upper = format!("sha256:{}", "AB".repeat(32));
        let digest = Sha256Digest::new(upper).unwrap();
        assert_eq!(digest.as_str(), "ab".repeat(32));
    }

    #[test]
    fn test_rejects_short() {
        assert!(Sha256Digest::new("abc123").is_err());
        assert!(Sha256Digest::new("z".repeat(64)).is_err());
    }

    #[test]
    fn test_from_bytes() {
        let digest = Sha256Digest::from_bytes(&[0u8; 32]);
        assert_eq!(digest.as_str(), "0".repeat(64));
    }
}
