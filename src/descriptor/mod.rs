//! Artifact descriptors: immutable declarations of fetchable units.
//!
//! A [`Descriptor`] names one artifact by its `(group, artifact, version)`
//! coordinate, pins its SHA-256 digest (unless the version is a snapshot),
//! lists the relocation rules applied after download, and carries the
//! descriptors bundled with it.
//!
//! Identity is the coordinate plus extension, integrity pin, and relocation
//! rules. The human-readable name and the bundled set take no part in
//! equality, hashing, or ordering, so two declarations of the same artifact
//! with different labels are the same descriptor while the same coordinate
//! with different rules is not.
//!
//! The disk cache names files by coordinate alone: both rule sets share the
//! verified download, and there is a single `-remapped` file per coordinate.
//! A manager therefore relocates a coordinate under one rule set only and
//! fails any other rule set for it at the relocation stage.
//!
//! # Sub-modules
//!
//! - [`checksum`]: SHA-256 digest newtype (`Sha256Checksum`).
//! - [`error`]: Declaration errors (`DescriptorError`).
//! - [`relocation`]: Symbol-prefix rewrite rules (`Relocation`).

pub mod checksum;
pub mod error;
pub mod relocation;

pub use checksum::Sha256Checksum;
pub use error::DescriptorError;
pub use relocation::Relocation;

use relocation::SEPARATOR_ESCAPE;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Version marker identifying an unpinned snapshot coordinate.
const SNAPSHOT_MARKER: &str = "-SNAPSHOT";

/// File extension used when a declaration does not name one.
const DEFAULT_EXTENSION: &str = "jar";

/// Suffix appended to the file stem of relocated artifacts.
const REMAPPED_SUFFIX: &str = "-remapped";

/// How a descriptor's payload is checked after download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Integrity {
    /// The payload must hash to this digest.
    Pinned(Sha256Checksum),
    /// The coordinate is a snapshot; the payload is accepted as served.
    Snapshot,
}

#[derive(Debug)]
struct DescriptorData {
    name: String,
    group: String,
    artifact: String,
    version: String,
    extension: String,
    integrity: Integrity,
    relocations: Vec<Relocation>,
    bundled: Vec<Descriptor>,
}

/// An immutable declaration of one fetchable artifact.
///
/// Cloning is cheap: the declaration is shared behind an [`Arc`].
///
/// # Examples
///
/// ```
/// use hoist::descriptor::{Descriptor, Relocation, Sha256Checksum};
///
/// let descriptor = Descriptor::builder()
///     .name("Hikari")
///     .group("com{}zaxxer")
///     .artifact("HikariCP")
///     .version("4.0.3")
///     .checksum(Sha256Checksum::compute(b"jar bytes"))
///     .relocation(Relocation::new("com{}zaxxer{}hikari", "hikari"))
///     .build()
///     .unwrap();
///
/// assert_eq!(descriptor.file_name(), "HikariCP-4.0.3");
/// assert_eq!(
///     descriptor.coordinate_path(),
///     "com/zaxxer/HikariCP/4.0.3/HikariCP-4.0.3.jar"
/// );
/// ```
#[derive(Clone)]
pub struct Descriptor(Arc<DescriptorData>);

impl Descriptor {
    /// Start a new declaration.
    #[must_use]
    pub fn builder() -> DescriptorBuilder {
        DescriptorBuilder::default()
    }

    /// Human-readable label, used only in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// The group with the separator escape normalised to `.`.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.0.group
    }

    /// The artifact identifier.
    #[must_use]
    pub fn artifact(&self) -> &str {
        &self.0.artifact
    }

    /// The version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.0.version
    }

    /// The file extension, without a leading dot.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.0.extension
    }

    /// How the payload is verified.
    #[must_use]
    pub fn integrity(&self) -> Integrity {
        self.0.integrity
    }

    /// The pinned digest, absent for snapshot coordinates.
    #[must_use]
    pub fn checksum(&self) -> Option<&Sha256Checksum> {
        match &self.0.integrity {
            Integrity::Pinned(checksum) => Some(checksum),
            Integrity::Snapshot => None,
        }
    }

    /// Whether the version carries the snapshot marker.
    #[must_use]
    pub fn is_snapshot(&self) -> bool {
        matches!(self.0.integrity, Integrity::Snapshot)
    }

    /// Relocation rules, in declaration order. Empty means "use as downloaded".
    #[must_use]
    pub fn relocations(&self) -> &[Relocation] {
        &self.0.relocations
    }

    /// Descriptors that must be loaded whenever this one is.
    #[must_use]
    pub fn bundled(&self) -> &[Self] {
        &self.0.bundled
    }

    /// `artifact-version`, the stem of every cached file for this descriptor.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}-{}", self.0.artifact, self.0.version)
    }

    /// Cache file name for the verified download.
    #[must_use]
    pub fn cache_file_name(&self) -> String {
        format!("{}.{}", self.file_name(), self.0.extension)
    }

    /// Cache file name for the relocated variant.
    #[must_use]
    pub fn remapped_file_name(&self) -> String {
        format!("{}{REMAPPED_SUFFIX}.{}", self.file_name(), self.0.extension)
    }

    /// Repository-relative path: `group/path/artifact/version/artifact-version.ext`.
    #[must_use]
    pub fn coordinate_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.0.group.replace('.', "/"),
            self.0.artifact,
            self.0.version,
            self.cache_file_name()
        )
    }

    /// The `group:artifact:version` triple.
    #[must_use]
    pub fn coordinate(&self) -> String {
        format!("{}:{}:{}", self.0.group, self.0.artifact, self.0.version)
    }

    /// Collect this descriptor and everything it bundles, transitively.
    #[must_use]
    pub fn flatten(&self) -> BTreeSet<Self> {
        flatten_bundles(std::slice::from_ref(self))
    }

    fn identity(&self) -> (&str, &str, &str, &str, &Integrity, &[Relocation]) {
        (
            &self.0.group,
            &self.0.artifact,
            &self.0.version,
            &self.0.extension,
            &self.0.integrity,
            &self.0.relocations,
        )
    }
}

/// Collect every descriptor in `requested` plus their bundled closure.
///
/// Bundles are followed by declaration, not by resolution: no version
/// arbitration takes place, so two versions of the same artifact may both
/// appear.
#[must_use]
pub fn flatten_bundles(requested: &[Descriptor]) -> BTreeSet<Descriptor> {
    let mut set = BTreeSet::new();
    let mut pending: Vec<&Descriptor> = requested.iter().collect();
    while let Some(descriptor) = pending.pop() {
        if set.insert(descriptor.clone()) {
            pending.extend(descriptor.bundled());
        }
    }
    set
}

/// Expand `requested` with bundled descriptors, keeping first-seen order.
///
/// Each requested descriptor is followed by its bundled closure before the
/// next requested descriptor is considered.
#[must_use]
pub fn expand_in_order(requested: &[Descriptor]) -> Vec<Descriptor> {
    let mut seen = BTreeSet::new();
    let mut ordered = Vec::new();
    for descriptor in requested {
        let mut stack = vec![descriptor];
        while let Some(next) = stack.pop() {
            if seen.insert(next.clone()) {
                ordered.push(next.clone());
                stack.extend(next.bundled().iter().rev());
            }
        }
    }
    ordered
}

impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.identity() == other.identity()
    }
}

impl Eq for Descriptor {}

impl Hash for Descriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl PartialOrd for Descriptor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Descriptor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("name", &self.0.name)
            .field("coordinate", &self.coordinate())
            .field("integrity", &self.0.integrity)
            .field("relocations", &self.0.relocations)
            .field("bundled", &self.0.bundled.len())
            .finish()
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0.name, self.coordinate())
    }
}

/// Builder for [`Descriptor`] declarations.
#[derive(Debug, Default, Clone)]
pub struct DescriptorBuilder {
    name: Option<String>,
    group: Option<String>,
    artifact: Option<String>,
    version: Option<String>,
    extension: Option<String>,
    checksum: Option<Sha256Checksum>,
    relocations: Vec<Relocation>,
    bundled: Vec<Descriptor>,
}

impl DescriptorBuilder {
    /// Start from an existing declaration so that rules or bundles can be added.
    #[must_use]
    pub fn from(parent: &Descriptor) -> Self {
        Self {
            name: Some(parent.0.name.clone()),
            group: Some(parent.0.group.clone()),
            artifact: Some(parent.0.artifact.clone()),
            version: Some(parent.0.version.clone()),
            extension: Some(parent.0.extension.clone()),
            checksum: parent.checksum().copied(),
            relocations: parent.0.relocations.clone(),
            bundled: parent.0.bundled.clone(),
        }
    }

    /// Set the diagnostic label. Defaults to the artifact identifier.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the group; `{}` is accepted in place of `.`.
    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Set the artifact identifier.
    #[must_use]
    pub fn artifact(mut self, artifact: impl Into<String>) -> Self {
        self.artifact = Some(artifact.into());
        self
    }

    /// Set the version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the file extension (default `jar`).
    #[must_use]
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Pin the expected SHA-256 digest.
    #[must_use]
    pub fn checksum(mut self, checksum: Sha256Checksum) -> Self {
        self.checksum = Some(checksum);
        self
    }

    /// Pin the expected SHA-256 digest from its base64 rendering.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::InvalidChecksum`] if the text does not
    /// decode to a 32-byte digest.
    pub fn checksum_base64(self, checksum: &str) -> Result<Self, DescriptorError> {
        Ok(self.checksum(Sha256Checksum::try_from(checksum)?))
    }

    /// Append a relocation rule; duplicates are ignored.
    #[must_use]
    pub fn relocation(mut self, relocation: Relocation) -> Self {
        if !self.relocations.contains(&relocation) {
            self.relocations.push(relocation);
        }
        self
    }

    /// Bundle another descriptor with this one; duplicates are ignored.
    #[must_use]
    pub fn with(mut self, bundled: Descriptor) -> Self {
        if !self.bundled.contains(&bundled) {
            self.bundled.push(bundled);
        }
        self
    }

    /// Validate the declaration and freeze it.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::MissingField`] when a coordinate part is
    /// absent or blank, [`DescriptorError::MissingChecksum`] for a release
    /// coordinate without a digest, and [`DescriptorError::SnapshotChecksum`]
    /// for a snapshot coordinate that pins one.
    pub fn build(self) -> Result<Descriptor, DescriptorError> {
        let group = required(self.group, "group")?.replace(SEPARATOR_ESCAPE, ".");
        let artifact = required(self.artifact, "artifact")?;
        let version = required(self.version, "version")?;
        let coordinate = format!("{group}:{artifact}:{version}");

        let integrity = match (version.contains(SNAPSHOT_MARKER), self.checksum) {
            (false, Some(checksum)) => Integrity::Pinned(checksum),
            (false, None) => return Err(DescriptorError::MissingChecksum { coordinate }),
            (true, None) => Integrity::Snapshot,
            (true, Some(_)) => return Err(DescriptorError::SnapshotChecksum { coordinate }),
        };

        Ok(Descriptor(Arc::new(DescriptorData {
            name: self.name.unwrap_or_else(|| artifact.clone()),
            group,
            artifact,
            version,
            extension: self
                .extension
                .unwrap_or_else(|| DEFAULT_EXTENSION.to_owned()),
            integrity,
            relocations: self.relocations,
            bundled: self.bundled,
        })))
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, DescriptorError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(DescriptorError::MissingField { field })
}

#[cfg(test)]
#[path = "descriptor_tests.rs"]
mod tests;
