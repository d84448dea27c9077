//! Error types for the `hoist` CLI.

use hoist::LoadError;
use hoist::config::ConfigError;
use hoist::descriptor::DescriptorError;
use hoist::host::HostError;
use thiserror::Error;

/// Errors that end a CLI run.
#[derive(Debug, Error)]
pub enum CliError {
    /// The configuration file or an environment override is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A registry lookup or feature name was rejected.
    #[error(transparent)]
    Registry(#[from] DescriptorError),

    /// The engine could not start, typically an unusable cache directory.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// A positional key does not name a registry entry.
    #[error("unknown registry entry {key}; run `hoist list` to see available entries")]
    UnknownKey {
        /// The rejected key.
        key: String,
    },

    /// Neither keys, `--feature`, nor configured features were given.
    #[error("nothing to fetch; pass registry keys or --feature, or set `features` in the config")]
    NothingRequested,

    /// The worker pool could not be started.
    #[error("failed to start worker threads: {source}")]
    Pool {
        /// The spawn failure.
        #[source]
        source: std::io::Error,
    },

    /// At least one dependency failed to load.
    #[error("{failed} of {total} dependencies failed to load")]
    LoadFailed {
        /// Descriptors that failed.
        failed: usize,
        /// Descriptors in the batch.
        total: usize,
    },

    /// The exposed files cannot be joined into a search path.
    #[error(transparent)]
    SearchPath(#[from] HostError),

    /// Failed to write output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using [`CliError`].
pub type Result<T> = std::result::Result<T, CliError>;
