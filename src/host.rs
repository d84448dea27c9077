//! The host's ambient resolution scope.
//!
//! Loaded artifacts that the auto-load policy admits are handed to a
//! [`HostScope`], which makes them visible to the embedding application's
//! default symbol resolution. [`SearchPathHost`] is a concrete scope that
//! accumulates exposed files into an ordered search path suitable for an
//! environment variable.

use crate::descriptor::Descriptor;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::ffi::OsString;
use std::sync::{Mutex, PoisonError};

/// Errors raised by a host scope.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The scope refused the file.
    #[error("cannot expose {path}: {reason}")]
    Rejected {
        /// The file that was offered.
        path: Utf8PathBuf,
        /// Why it was refused.
        reason: String,
    },

    /// The accumulated paths cannot be joined into a search path.
    #[error("search path cannot be rendered: {0}")]
    SearchPath(#[from] std::env::JoinPathsError),
}

/// The host application's ambient resolution scope.
#[cfg_attr(test, mockall::automock)]
pub trait HostScope: Send + Sync {
    /// Make `path` available to the host's default resolution.
    ///
    /// # Errors
    ///
    /// Returns a [`HostError`] if the scope cannot accept the file.
    fn expose(&self, path: &Utf8Path) -> Result<(), HostError>;

    /// Whether the host already provides `descriptor`'s artifact natively.
    fn provides(&self, _descriptor: &Descriptor) -> bool {
        false
    }
}

/// Host scope that records exposed files as an ordered search path.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use hoist::host::{HostScope, SearchPathHost};
///
/// let host = SearchPathHost::default();
/// host.expose(Utf8Path::new("/cache/a.jar")).unwrap();
/// host.expose(Utf8Path::new("/cache/a.jar")).unwrap();
/// assert_eq!(host.exposed().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct SearchPathHost {
    exposed: Mutex<Vec<Utf8PathBuf>>,
    provided: Vec<String>,
}

impl SearchPathHost {
    /// A scope that reports the given `group:artifact` pairs as already present.
    #[must_use]
    pub fn with_provided(provided: impl IntoIterator<Item = String>) -> Self {
        Self {
            exposed: Mutex::default(),
            provided: provided.into_iter().collect(),
        }
    }

    /// Files exposed so far, in exposure order.
    #[must_use]
    pub fn exposed(&self) -> Vec<Utf8PathBuf> {
        self.exposed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Join the exposed files with the platform's path-list separator.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::SearchPath`] if a path contains the separator.
    pub fn search_path(&self) -> Result<OsString, HostError> {
        Ok(std::env::join_paths(self.exposed())?)
    }
}

impl HostScope for SearchPathHost {
    fn expose(&self, path: &Utf8Path) -> Result<(), HostError> {
        if !path.is_absolute() {
            return Err(HostError::Rejected {
                path: path.to_owned(),
                reason: "path must be absolute".to_owned(),
            });
        }
        let mut exposed = self.exposed.lock().unwrap_or_else(PoisonError::into_inner);
        if !exposed.iter().any(|p| p == path) {
            debug!("exposing {path} to the host scope");
            exposed.push(path.to_owned());
        }
        Ok(())
    }

    fn provides(&self, descriptor: &Descriptor) -> bool {
        let key = format!("{}:{}", descriptor.group(), descriptor.artifact());
        self.provided.contains(&key)
    }
}
