//! Relocation stage: deciding when an artifact needs symbol rewriting.
//!
//! The byte-level rewrite is owned by an external collaborator behind the
//! [`Relocator`] trait. [`RelocationStage`] only decides whether a rewrite is
//! needed, reuses a previously relocated file when one exists, and moves a
//! fresh rewrite into the cache atomically.

use crate::cache::DiskCache;
use crate::descriptor::{Descriptor, Relocation};
use crate::error::{LoadError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::process::Command;
use std::sync::{Arc, Mutex, PoisonError};

/// Failures reported by a [`Relocator`].
#[derive(Debug, thiserror::Error)]
pub enum RelocationError {
    /// No rewriter is configured but the descriptor declares rules.
    #[error("no relocator is configured")]
    Unconfigured,

    /// The rewrite command exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        /// The program that was run.
        program: String,
        /// Rendered exit status.
        status: String,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// The rewriter finished but wrote nothing.
    #[error("relocator produced an empty output file")]
    EmptyOutput,

    /// I/O error spawning the rewriter or handling its files.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Rewrites symbol prefixes in a binary artifact.
#[cfg_attr(test, mockall::automock)]
pub trait Relocator: Send + Sync {
    /// Read `input`, apply `rules`, and write the result to `output`.
    ///
    /// # Errors
    ///
    /// Returns a [`RelocationError`] if the rewrite fails.
    fn relocate(
        &self,
        input: &Utf8Path,
        output: &Utf8Path,
        rules: &[Relocation],
    ) -> std::result::Result<(), RelocationError>;
}

/// Runs an external rewrite command.
///
/// The command is invoked as
/// `program [args...] <input> <output> [pattern=replacement...]`.
///
/// # Examples
///
/// ```no_run
/// use camino::Utf8Path;
/// use hoist::descriptor::Relocation;
/// use hoist::relocation::{CommandRelocator, Relocator};
///
/// let relocator = CommandRelocator::new("jar-relocator", vec![]);
/// relocator.relocate(
///     Utf8Path::new("libs/config-1.4.0.jar"),
///     Utf8Path::new("libs/config-1.4.0-remapped.jar"),
///     &[Relocation::new("com{}typesafe{}config", "typesafe.config")],
/// )?;
/// # Ok::<(), hoist::relocation::RelocationError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRelocator {
    program: String,
    args: Vec<String>,
}

impl CommandRelocator {
    /// Create a relocator running `program` with leading `args`.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Relocator for CommandRelocator {
    fn relocate(
        &self,
        input: &Utf8Path,
        output: &Utf8Path,
        rules: &[Relocation],
    ) -> std::result::Result<(), RelocationError> {
        let result = Command::new(&self.program)
            .args(&self.args)
            .arg(input)
            .arg(output)
            .args(
                rules
                    .iter()
                    .map(|rule| format!("{}={}", rule.pattern(), rule.replacement())),
            )
            .output()?;

        if !result.status.success() {
            return Err(RelocationError::CommandFailed {
                program: self.program.clone(),
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_owned(),
            });
        }
        Ok(())
    }
}

/// Relocator used when none is configured; every rewrite fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredRelocator;

impl Relocator for UnconfiguredRelocator {
    fn relocate(
        &self,
        _input: &Utf8Path,
        _output: &Utf8Path,
        _rules: &[Relocation],
    ) -> std::result::Result<(), RelocationError> {
        Err(RelocationError::Unconfigured)
    }
}

/// Orchestrates relocation for verified artifacts.
///
/// The cache holds one remapped file per coordinate. The stage remembers
/// which rule set claimed each remapped file and refuses a descriptor that
/// asks for the same file under different rules.
#[derive(Clone)]
pub struct RelocationStage {
    relocator: Arc<dyn Relocator>,
    claims: Arc<Mutex<HashMap<Utf8PathBuf, Vec<Relocation>>>>,
}

impl RelocationStage {
    /// Wrap the rewrite collaborator.
    #[must_use]
    pub fn new(relocator: Arc<dyn Relocator>) -> Self {
        Self {
            relocator,
            claims: Arc::default(),
        }
    }

    /// Produce the final artifact path for `descriptor`.
    ///
    /// Returns `source` untouched when the descriptor has no rules, and the
    /// existing remapped file when one is already cached.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::RelocationFailure`] if the rewriter fails or the
    /// remapped file was already claimed by different rules, and
    /// [`LoadError::CacheWrite`] if the output cannot be moved into place.
    pub fn apply(
        &self,
        cache: &DiskCache,
        descriptor: &Descriptor,
        source: &Utf8Path,
    ) -> Result<Utf8PathBuf> {
        let rules = descriptor.relocations();
        if rules.is_empty() {
            return Ok(source.to_owned());
        }

        let output = cache.remapped_path(descriptor);
        self.claim(&output, descriptor)?;
        if output.is_file() {
            debug!("reusing relocated {descriptor} at {output}");
            return Ok(output);
        }

        let cache_write = |source| LoadError::CacheWrite {
            path: output.clone(),
            source,
        };
        let temp = cache.temp_path().map_err(cache_write)?;
        let temp_utf8 = Utf8Path::from_path(&temp).ok_or_else(|| {
            cache_write(io::Error::new(
                io::ErrorKind::InvalidData,
                "temporary path is not valid UTF-8",
            ))
        })?;

        info!("relocating {descriptor} ({} rules)", rules.len());
        self.relocator
            .relocate(source, temp_utf8, rules)
            .and_then(|()| ensure_written(temp_utf8))
            .map_err(|e| LoadError::RelocationFailure {
                descriptor: descriptor.to_string(),
                reason: e.to_string(),
            })?;

        temp.persist(&output).map_err(|e| cache_write(e.error))?;
        Ok(output)
    }
}

impl RelocationStage {
    fn claim(&self, output: &Utf8Path, descriptor: &Descriptor) -> Result<()> {
        let rules = descriptor.relocations();
        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        match claims.get(output) {
            Some(claimed) if claimed.as_slice() != rules => {
                let listed: Vec<String> = claimed.iter().map(ToString::to_string).collect();
                Err(LoadError::RelocationFailure {
                    descriptor: descriptor.to_string(),
                    reason: format!(
                        "{output} was already relocated with different rules ({})",
                        listed.join(", ")
                    ),
                })
            }
            Some(_) => Ok(()),
            None => {
                claims.insert(output.to_owned(), rules.to_vec());
                Ok(())
            }
        }
    }
}

fn ensure_written(path: &Utf8Path) -> std::result::Result<(), RelocationError> {
    if fs::metadata(path)?.len() == 0 {
        return Err(RelocationError::EmptyOutput);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DescriptorBuilder, Sha256Checksum};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        cache: DiskCache,
        source: Utf8PathBuf,
    }

    #[fixture]
    fn staged() -> Fixture {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 path");
        let cache = DiskCache::open(root).expect("cache opens");
        let source = cache
            .store(&relocated(), b"original")
            .expect("seed artifact");
        Fixture {
            _dir: dir,
            cache,
            source,
        }
    }

    fn relocated() -> Descriptor {
        Descriptor::builder()
            .name("Helper")
            .group("org.example")
            .artifact("helper")
            .version("1.0")
            .checksum(Sha256Checksum::compute(b"original"))
            .relocation(Relocation::new("old.pkg", "new.pkg"))
            .build()
            .expect("valid descriptor")
    }

    #[rstest]
    fn no_rules_returns_source_without_rewriting(staged: Fixture) {
        let plain = Descriptor::builder()
            .group("org.example")
            .artifact("plain")
            .version("1.0")
            .checksum(Sha256Checksum::compute(b"plain"))
            .build()
            .expect("valid descriptor");
        let mut relocator = MockRelocator::new();
        relocator.expect_relocate().never();
        let stage = RelocationStage::new(Arc::new(relocator));

        let path = stage
            .apply(&staged.cache, &plain, &staged.source)
            .expect("no-op");
        assert_eq!(path, staged.source);
        assert!(!staged.cache.remapped_path(&plain).exists());
    }

    #[rstest]
    fn rewrite_is_persisted_under_remapped_name(staged: Fixture) {
        let mut relocator = MockRelocator::new();
        relocator
            .expect_relocate()
            .times(1)
            .withf(|_, _, rules| rules == [Relocation::new("old.pkg", "new.pkg")])
            .returning(|_, output, _| {
                fs::write(output, b"rewritten")?;
                Ok(())
            });
        let stage = RelocationStage::new(Arc::new(relocator));

        let path = stage
            .apply(&staged.cache, &relocated(), &staged.source)
            .expect("relocated");
        assert_eq!(path.file_name(), Some("helper-1.0-remapped.jar"));
        assert_eq!(fs::read(&path).expect("read"), b"rewritten");
    }

    #[rstest]
    fn existing_remapped_file_is_reused(staged: Fixture) {
        let d = relocated();
        fs::write(staged.cache.remapped_path(&d), b"earlier").expect("seed remapped");
        let mut relocator = MockRelocator::new();
        relocator.expect_relocate().never();
        let stage = RelocationStage::new(Arc::new(relocator));

        let path = stage
            .apply(&staged.cache, &d, &staged.source)
            .expect("reused");
        assert_eq!(fs::read(path).expect("read"), b"earlier");
    }

    #[rstest]
    fn rewriter_failure_leaves_no_remapped_file(staged: Fixture) {
        let d = relocated();
        let stage = RelocationStage::new(Arc::new(UnconfiguredRelocator));

        let err = stage
            .apply(&staged.cache, &d, &staged.source)
            .expect_err("rewrite fails");
        assert!(matches!(err, LoadError::RelocationFailure { .. }));
        assert!(!staged.cache.remapped_path(&d).exists());
    }

    #[rstest]
    fn other_rules_for_a_claimed_remapped_file_are_refused(staged: Fixture) {
        let first = relocated();
        let second = DescriptorBuilder::from(&first)
            .relocation(Relocation::new("other.pkg", "new.pkg"))
            .build()
            .expect("valid descriptor");
        assert_ne!(first, second);
        let mut relocator = MockRelocator::new();
        relocator
            .expect_relocate()
            .times(1)
            .returning(|_, output, _| {
                fs::write(output, b"rewritten")?;
                Ok(())
            });
        let stage = RelocationStage::new(Arc::new(relocator));

        let path = stage
            .apply(&staged.cache, &first, &staged.source)
            .expect("first rule set relocates");
        let err = stage
            .apply(&staged.cache, &second, &staged.source)
            .expect_err("same remapped file, different rules");

        assert!(matches!(err, LoadError::RelocationFailure { .. }));
        assert!(err.to_string().contains("different rules"));
        assert_eq!(fs::read(&path).expect("read"), b"rewritten");
        let again = stage
            .apply(&staged.cache, &first, &staged.source)
            .expect("original rules still reuse the file");
        assert_eq!(again, path);
    }

    #[rstest]
    fn empty_rewriter_output_is_a_failure(staged: Fixture) {
        let mut relocator = MockRelocator::new();
        relocator.expect_relocate().returning(|_, _, _| Ok(()));
        let stage = RelocationStage::new(Arc::new(relocator));

        let err = stage
            .apply(&staged.cache, &relocated(), &staged.source)
            .expect_err("nothing written");
        assert!(err.to_string().contains("empty output"));
    }

    #[cfg(unix)]
    #[rstest]
    fn command_relocator_passes_paths_and_rules(staged: Fixture) {
        let output = staged.cache.root().join("out.jar");
        let relocator = CommandRelocator::new(
            "sh",
            vec![
                "-c".to_owned(),
                r#"cp "$0" "$1" && printf '%s' "$2" >> "$1""#.to_owned(),
            ],
        );

        relocator
            .relocate(
                &staged.source,
                &output,
                &[Relocation::new("old.pkg", "new.pkg")],
            )
            .expect("command succeeds");
        assert_eq!(
            fs::read_to_string(&output).expect("read"),
            "originalold.pkg=new.pkg"
        );
    }

    #[cfg(unix)]
    #[rstest]
    fn command_relocator_reports_failure(staged: Fixture) {
        let relocator = CommandRelocator::new(
            "sh",
            vec!["-c".to_owned(), "echo boom >&2; exit 3".to_owned()],
        );
        let err = relocator
            .relocate(&staged.source, &staged.source, &[])
            .expect_err("non-zero exit");
        let RelocationError::CommandFailed { stderr, .. } = err else {
            panic!("expected CommandFailed, got {err:?}");
        };
        assert_eq!(stderr, "boom");
    }
}
