//! Error types for descriptor declarations and the provided registry.
//!
//! Each variant identifies the offending declaration and the constraint that
//! was violated.

use thiserror::Error;

/// Errors arising from invalid descriptor declarations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// A required coordinate field was not supplied to the builder.
    #[error("descriptor is missing its {field}")]
    MissingField {
        /// The name of the missing field.
        field: &'static str,
    },

    /// A release coordinate was declared without a checksum.
    #[error("release coordinate {coordinate} must declare a SHA-256 checksum")]
    MissingChecksum {
        /// The `group:artifact:version` triple.
        coordinate: String,
    },

    /// A snapshot coordinate was declared with a checksum.
    #[error("snapshot coordinate {coordinate} cannot pin a checksum")]
    SnapshotChecksum {
        /// The `group:artifact:version` triple.
        coordinate: String,
    },

    /// A checksum is not valid base64 or does not decode to 32 bytes.
    #[error("invalid SHA-256 checksum: {reason}")]
    InvalidChecksum {
        /// Description of the validation failure.
        reason: String,
    },

    /// A registry entry bundles a key that the table does not declare.
    #[error("registry entry {entry} bundles unknown key {key}")]
    UnknownBundledKey {
        /// The entry declaring the bundle.
        entry: String,
        /// The key that could not be resolved.
        key: String,
    },

    /// Registry entries bundle each other in a cycle.
    #[error("registry entry {entry} bundles itself through {via}")]
    BundleCycle {
        /// The entry at which the cycle was detected.
        entry: String,
        /// The entry that closed the cycle.
        via: String,
    },

    /// A feature name is not declared in the registry.
    #[error("unknown feature {name}; expected one of: {expected}")]
    UnknownFeature {
        /// The rejected feature name.
        name: String,
        /// Comma-separated list of declared features.
        expected: String,
    },
}
