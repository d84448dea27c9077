//! Integrity verification of downloaded payloads.
//!
//! Release coordinates must hash to their declared SHA-256 digest. Snapshot
//! coordinates are unstable by nature and are accepted as served; the policy
//! makes that relaxation an explicit, inspectable value rather than a missing
//! branch.

use crate::descriptor::{Descriptor, Integrity, Sha256Checksum};
use crate::error::LoadError;
use log::{debug, error};
use std::fmt;

/// How a particular descriptor's payload is verified.
///
/// # Examples
///
/// ```
/// use hoist::descriptor::Descriptor;
/// use hoist::verification::VerificationPolicy;
///
/// let snapshot = Descriptor::builder()
///     .group("org.example")
///     .artifact("api")
///     .version("1.0-SNAPSHOT")
///     .build()
///     .unwrap();
/// assert_eq!(VerificationPolicy::for_descriptor(&snapshot), VerificationPolicy::Exempt);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationPolicy {
    /// The payload must hash to this digest.
    Required(Sha256Checksum),
    /// The payload is accepted without hashing.
    Exempt,
}

impl VerificationPolicy {
    /// Derive the policy from the descriptor's integrity pin.
    #[must_use]
    pub fn for_descriptor(descriptor: &Descriptor) -> Self {
        match descriptor.integrity() {
            Integrity::Pinned(checksum) => Self::Required(checksum),
            Integrity::Snapshot => Self::Exempt,
        }
    }

    /// Whether a digest comparison will run.
    #[must_use]
    pub const fn requires_checksum(&self) -> bool {
        matches!(self, Self::Required(_))
    }
}

impl fmt::Display for VerificationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required(checksum) => write!(f, "sha256 must equal {checksum}"),
            Self::Exempt => f.write_str("snapshot, verification skipped"),
        }
    }
}

/// Check `payload` against the descriptor's declared digest.
///
/// Returns the payload unchanged on success so the call can sit inline in
/// the load pipeline.
///
/// # Errors
///
/// Returns [`LoadError::ChecksumMismatch`] with both digests rendered as
/// base64 when the payload does not match.
pub fn verify(payload: Vec<u8>, descriptor: &Descriptor) -> Result<Vec<u8>, LoadError> {
    let VerificationPolicy::Required(expected) = VerificationPolicy::for_descriptor(descriptor)
    else {
        debug!("{descriptor} is a snapshot; skipping checksum verification");
        return Ok(payload);
    };

    let actual = Sha256Checksum::compute(&payload);
    debug!("computed sha256 {actual} for {descriptor}");
    if actual != expected {
        let err = LoadError::ChecksumMismatch {
            descriptor: descriptor.to_string(),
            expected: expected.to_base64(),
            actual: actual.to_base64(),
        };
        error!("{err}");
        return Err(err);
    }
    Ok(payload)
}
