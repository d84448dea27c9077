//! Engine configuration loaded from TOML.
//!
//! Every field is optional in the file; omitted values fall back to the
//! defaults below. Two environment variables override the file so that
//! deployments can relocate the cache or cap concurrency without editing it:
//! `HOIST_CACHE_DIR` and `HOIST_WORKERS`.

use crate::cache::default_cache_dir;
use crate::download::{DEFAULT_USER_AGENT, HttpSettings};
use crate::pool::available_workers;
use crate::relocation::{CommandRelocator, Relocator, UnconfiguredRelocator};
use crate::repository::{Repository, RepositorySet};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable overriding [`EngineConfig::cache_dir`].
pub const CACHE_DIR_ENV: &str = "HOIST_CACHE_DIR";

/// Environment variable overriding [`EngineConfig::workers`].
pub const WORKERS_ENV: &str = "HOIST_WORKERS";

/// Cache root used when no per-user data directory can be determined.
const FALLBACK_CACHE_DIR: &str = "hoist/libs";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    Read {
        /// The file that was requested.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration is not valid TOML or has unexpected fields.
    #[error("invalid configuration in {origin}: {source}")]
    Parse {
        /// Where the text came from.
        origin: String,
        /// The parser's diagnostic.
        #[source]
        source: Box<toml::de::Error>,
    },

    /// An environment override holds a value that cannot be used.
    #[error("{var} has invalid value {value:?}")]
    InvalidOverride {
        /// The variable name.
        var: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Top-level engine settings.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Disk cache root. Defaults to the per-user data directory.
    pub cache_dir: Option<Utf8PathBuf>,
    /// `User-Agent` header for downloads.
    pub user_agent: String,
    /// Connect timeout per attempt, in seconds.
    pub connect_timeout_secs: u64,
    /// Read timeout per attempt, in seconds.
    pub read_timeout_secs: u64,
    /// Worker threads. Defaults to the available hardware parallelism.
    pub workers: Option<usize>,
    /// Repositories to consult. Empty means the built-in list.
    pub repositories: Vec<RepositoryConfig>,
    /// Registry features to load.
    pub features: Vec<String>,
    /// External rewrite command for relocated artifacts.
    pub relocator: Option<RelocatorConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            connect_timeout_secs: 5,
            read_timeout_secs: 10,
            workers: None,
            repositories: Vec::new(),
            features: Vec::new(),
            relocator: None,
        }
    }
}

/// One `[[repositories]]` table.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Diagnostic name.
    pub name: String,
    /// Base URL for release coordinates.
    pub url: String,
    /// Higher priorities are consulted first.
    #[serde(default)]
    pub priority: i32,
    /// Base URL of a snapshot search service.
    #[serde(default)]
    pub snapshot_search: Option<String>,
    /// Hosted repository searched for snapshots; defaults to `name`.
    #[serde(default)]
    pub snapshot_repository: Option<String>,
}

impl RepositoryConfig {
    /// Convert into a [`Repository`].
    #[must_use]
    pub fn to_repository(&self) -> Repository {
        let repository = Repository::new(&self.name, &self.url, self.priority);
        match &self.snapshot_search {
            Some(base) => repository.with_snapshot_search(
                base,
                self.snapshot_repository.as_deref().unwrap_or(&self.name),
            ),
            None => repository,
        }
    }
}

/// The `[relocator]` table.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RelocatorConfig {
    /// Program to run.
    pub program: String,
    /// Arguments placed before the input and output paths.
    #[serde(default)]
    pub args: Vec<String>,
}

impl EngineConfig {
    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&text, path.as_str())
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed input.
    ///
    /// # Examples
    ///
    /// ```
    /// use hoist::config::EngineConfig;
    ///
    /// let config = EngineConfig::from_toml_str("workers = 2\n").unwrap();
    /// assert_eq!(config.workers(), 2);
    /// assert_eq!(config.user_agent, "hoist");
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Self::parse(text, "<inline>")
    }

    fn parse(text: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            origin: origin.to_owned(),
            source: Box::new(source),
        })
    }

    /// Apply `HOIST_CACHE_DIR` and `HOIST_WORKERS` from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] for an unusable value.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|var| std::env::var(var).ok())
    }

    /// Apply overrides using the supplied variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] for an unusable value.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(CACHE_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.cache_dir = Some(Utf8PathBuf::from(dir));
        }
        if let Some(raw) = lookup(WORKERS_ENV) {
            let workers = raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidOverride {
                    var: WORKERS_ENV,
                    value: raw,
                })?;
            self.workers = Some(workers);
        }
        Ok(self)
    }

    /// Effective cache root.
    #[must_use]
    pub fn cache_dir(&self) -> Utf8PathBuf {
        self.cache_dir
            .clone()
            .or_else(default_cache_dir)
            .unwrap_or_else(|| Utf8PathBuf::from(FALLBACK_CACHE_DIR))
    }

    /// Effective worker count.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers.unwrap_or_else(available_workers)
    }

    /// Network settings for the HTTP fetcher.
    #[must_use]
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            user_agent: self.user_agent.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
        }
    }

    /// Configured repositories, or the built-in list when none are given.
    #[must_use]
    pub fn repository_set(&self) -> RepositorySet {
        if self.repositories.is_empty() {
            return RepositorySet::provided();
        }
        self.repositories
            .iter()
            .map(RepositoryConfig::to_repository)
            .collect()
    }

    /// The configured rewriter, or one that rejects every relocation.
    #[must_use]
    pub fn relocator(&self) -> Arc<dyn Relocator> {
        match &self.relocator {
            Some(cfg) => Arc::new(CommandRelocator::new(&cfg.program, cfg.args.clone())),
            None => Arc::new(UnconfiguredRelocator),
        }
    }
}
