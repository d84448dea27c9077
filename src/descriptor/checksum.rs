//! SHA-256 checksum newtype for descriptor verification.
//!
//! Declarations carry their expected digest as base64 text; the value is
//! decoded once at construction and kept as the raw 32-byte digest so that
//! verification compares bytes rather than renderings.

use super::error::DescriptorError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use std::fmt;

/// Length in bytes of a SHA-256 digest.
const DIGEST_LEN: usize = 32;

/// A validated SHA-256 digest.
///
/// # Examples
///
/// ```
/// use hoist::descriptor::Sha256Checksum;
///
/// let checksum = Sha256Checksum::compute(b"payload");
/// let parsed: Sha256Checksum = checksum.to_base64().as_str().try_into().unwrap();
/// assert_eq!(parsed, checksum);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sha256Checksum([u8; DIGEST_LEN]);

impl Sha256Checksum {
    /// Wrap a raw digest.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Compute the digest of `payload`.
    #[must_use]
    pub fn compute(payload: &[u8]) -> Self {
        Self(Sha256::digest(payload).into())
    }

    /// Return the raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Render the digest as standard base64.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

impl TryFrom<&str> for Sha256Checksum {
    type Error = DescriptorError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let decoded = STANDARD
            .decode(value.trim())
            .map_err(|e| DescriptorError::InvalidChecksum {
                reason: format!("not valid base64: {e}"),
            })?;
        let bytes: [u8; DIGEST_LEN] =
            decoded
                .try_into()
                .map_err(|rejected: Vec<u8>| DescriptorError::InvalidChecksum {
                    reason: format!("expected {DIGEST_LEN} bytes, got {}", rejected.len()),
                })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Sha256Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    // SHA-256 of the empty string.
    const EMPTY_DIGEST: &str = "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=";

    #[test]
    fn compute_matches_known_digest() {
        assert_eq!(Sha256Checksum::compute(b"").to_base64(), EMPTY_DIGEST);
    }

    #[test]
    fn parses_declared_base64() {
        let parsed = Sha256Checksum::try_from(EMPTY_DIGEST).expect("valid digest");
        assert_eq!(parsed, Sha256Checksum::compute(b""));
    }

    #[rstest]
    #[case::not_base64("not*base64")]
    #[case::too_short("AAAA")]
    #[case::too_long("47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFUAAAA=")]
    fn rejects_malformed_checksums(#[case] value: &str) {
        let err = Sha256Checksum::try_from(value).expect_err("should reject");
        assert!(matches!(err, DescriptorError::InvalidChecksum { .. }));
    }

    #[test]
    fn display_renders_base64() {
        let checksum = Sha256Checksum::compute(b"");
        assert_eq!(format!("{checksum}"), EMPTY_DIGEST);
    }
}
