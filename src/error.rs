//! Error types for the dependency loading pipeline.
//!
//! [`LoadError`] is the failure taxonomy surfaced by the manager: each variant
//! names the descriptor involved so diagnostics can be traced back to a
//! declaration without extra context. Per-attempt network failures live in
//! [`crate::download::DownloadError`] and are aggregated into
//! [`LoadError::RepositoryExhausted`].

use crate::download::DownloadError;
use camino::Utf8PathBuf;
use std::fmt;
use thiserror::Error;

/// One failed attempt against a single repository.
#[derive(Debug)]
pub struct RepositoryAttempt {
    /// Name of the repository that was queried.
    pub repository: String,
    /// Why the attempt failed.
    pub error: DownloadError,
}

impl fmt::Display for RepositoryAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.repository, self.error)
    }
}

/// Errors raised while loading descriptors or obtaining isolated contexts.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Every configured repository failed to provide the artifact.
    #[error("no repository could provide {descriptor}: {}", render_attempts(.attempts))]
    RepositoryExhausted {
        /// The descriptor that could not be fetched.
        descriptor: String,
        /// Per-repository failures, in the order the repositories were tried.
        attempts: Vec<RepositoryAttempt>,
    },

    /// The payload digest does not match the declared checksum.
    #[error("checksum mismatch for {descriptor}: expected {expected}, actual {actual}")]
    ChecksumMismatch {
        /// The descriptor whose payload failed verification.
        descriptor: String,
        /// Base64 rendering of the declared digest.
        expected: String,
        /// Base64 rendering of the computed digest.
        actual: String,
    },

    /// The external rewriter failed to relocate the artifact.
    #[error("relocation failed for {descriptor}: {reason}")]
    RelocationFailure {
        /// The descriptor whose artifact could not be rewritten.
        descriptor: String,
        /// Description of the rewrite failure.
        reason: String,
    },

    /// The disk cache root could not be created or written.
    #[error("cache directory {path} is unavailable: {source}")]
    CacheDirectoryUnavailable {
        /// The cache root that was requested.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing an artifact into the disk cache failed.
    #[error("failed to write {path} into the cache: {source}")]
    CacheWrite {
        /// The destination file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An isolated context was requested for a descriptor that is not loaded.
    #[error("dependency {descriptor} is not loaded")]
    IsolatedContextPrecondition {
        /// The descriptor that has not been loaded.
        descriptor: String,
    },

    /// The host scope refused to expose a loaded artifact.
    #[error("host scope rejected {descriptor}: {reason}")]
    HostExposure {
        /// The descriptor whose artifact was rejected.
        descriptor: String,
        /// Description of the rejection.
        reason: String,
    },

    /// The worker pool no longer accepts jobs.
    #[error("worker pool is shut down; {descriptor} was not loaded")]
    PoolUnavailable {
        /// The descriptor that could not be scheduled.
        descriptor: String,
    },

    /// The pipeline for a descriptor panicked before reporting an outcome.
    #[error("loading {descriptor} aborted unexpectedly")]
    Aborted {
        /// The descriptor whose pipeline did not complete.
        descriptor: String,
    },
}

/// Result type alias using [`LoadError`].
pub type Result<T> = std::result::Result<T, LoadError>;

fn render_attempts(attempts: &[RepositoryAttempt]) -> String {
    if attempts.is_empty() {
        return "no repositories configured".to_owned();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
