//! On-disk artifact cache.
//!
//! The cache is a flat directory of `{artifact}-{version}.{ext}` files plus
//! `{artifact}-{version}-remapped.{ext}` for relocated variants. There is no
//! index: the presence of a file is the only cache state, and a present file
//! is trusted without re-hashing. Writes go through a temporary file in the
//! same directory followed by a rename, so a concurrent reader never sees a
//! partially written artifact under its final name.

use crate::descriptor::Descriptor;
use crate::error::{LoadError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use directories_next::ProjectDirs;
use log::debug;
use std::fs;
use std::io::{self, Write};
use tempfile::{NamedTempFile, TempPath};

/// Prefix for temporary files created inside the cache root.
const TEMP_PREFIX: &str = ".hoist-";

/// Flat directory of verified and relocated artifacts.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: Utf8PathBuf,
}

impl DiskCache {
    /// Open the cache at `root`, creating it when absent.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::CacheDirectoryUnavailable`] if the directory
    /// cannot be created or is not writable.
    pub fn open(root: impl Into<Utf8PathBuf>) -> Result<Self> {
        let root = root.into();
        let unavailable = |source| LoadError::CacheDirectoryUnavailable {
            path: root.clone(),
            source,
        };

        fs::create_dir_all(&root).map_err(unavailable)?;
        let root = absolute(&root).map_err(unavailable)?;

        // Verify writability by creating (and dropping) a temp file.
        tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&root)
            .map_err(unavailable)?;

        debug!("disk cache ready at {root}");
        Ok(Self { root })
    }

    /// The cache root directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Location of the verified download for `descriptor`.
    #[must_use]
    pub fn artifact_path(&self, descriptor: &Descriptor) -> Utf8PathBuf {
        self.root.join(descriptor.cache_file_name())
    }

    /// Location of the relocated variant for `descriptor`.
    #[must_use]
    pub fn remapped_path(&self, descriptor: &Descriptor) -> Utf8PathBuf {
        self.root.join(descriptor.remapped_file_name())
    }

    /// The path a fully loaded `descriptor` is consumed from.
    ///
    /// This is the remapped variant when the descriptor declares relocation
    /// rules, and the verified download otherwise.
    #[must_use]
    pub fn resolve(&self, descriptor: &Descriptor) -> Utf8PathBuf {
        if descriptor.relocations().is_empty() {
            self.artifact_path(descriptor)
        } else {
            self.remapped_path(descriptor)
        }
    }

    /// Whether the verified download is already on disk.
    #[must_use]
    pub fn contains(&self, descriptor: &Descriptor) -> bool {
        self.artifact_path(descriptor).is_file()
    }

    /// Whether the fully loaded form of `descriptor` is already on disk.
    #[must_use]
    pub fn contains_resolved(&self, descriptor: &Descriptor) -> bool {
        self.resolve(descriptor).is_file()
    }

    /// Atomically write a verified payload under its canonical name.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::CacheWrite`] if the temporary file cannot be
    /// written or renamed into place.
    pub fn store(&self, descriptor: &Descriptor, payload: &[u8]) -> Result<Utf8PathBuf> {
        let dest = self.artifact_path(descriptor);
        self.write_atomic(&dest, payload)
            .map_err(|source| LoadError::CacheWrite {
                path: dest.clone(),
                source,
            })?;
        debug!("cached {descriptor} at {dest}");
        Ok(dest)
    }

    /// Reserve a temporary path inside the cache root.
    ///
    /// The file is removed when the returned handle drops unless it is
    /// persisted; renaming it within the root is atomic.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn temp_path(&self) -> io::Result<TempPath> {
        Ok(tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.root)?
            .into_temp_path())
    }

    fn write_atomic(&self, dest: &Utf8Path, payload: &[u8]) -> io::Result<()> {
        let mut file = NamedTempFile::with_prefix_in(TEMP_PREFIX, &self.root)?;
        file.write_all(payload)?;
        file.as_file().sync_all()?;
        file.persist(dest).map_err(|e| e.error)?;
        Ok(())
    }
}

fn absolute(root: &Utf8Path) -> io::Result<Utf8PathBuf> {
    if root.is_absolute() {
        return Ok(root.to_owned());
    }
    Utf8PathBuf::try_from(std::path::absolute(root)?)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Return the default cache root for the current user.
///
/// Resolves to the platform's local data directory for `hoist` with `libs`
/// appended, or `None` when no home directory can be determined.
#[must_use]
pub fn default_cache_dir() -> Option<Utf8PathBuf> {
    ProjectDirs::from("dev", "hoist", "hoist")
        .and_then(|dirs| Utf8PathBuf::try_from(dirs.data_local_dir().join("libs")).ok())
}
