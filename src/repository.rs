//! Remote repositories and the prioritised set consulted during downloads.
//!
//! A [`Repository`] maps a descriptor to a concrete URL. Release coordinates
//! resolve against the repository's base URL using the standard layout;
//! snapshot coordinates resolve only when the repository declares a
//! [`SnapshotStrategy::Search`] endpoint.
//!
//! A [`RepositorySet`] keeps repositories ordered by descending priority.
//! Repositories of equal priority keep the order in which they were added.

use crate::descriptor::Descriptor;
use crate::download::DownloadError;

/// Snapshot search endpoint of the primary development repository.
const IMPACTDEV_SEARCH: &str = "https://maven.impactdev.net/service/rest/v1/search/assets/";

/// How a repository resolves snapshot coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotStrategy {
    /// Snapshots cannot be resolved; the repository is skipped for them.
    Disabled,
    /// Resolve the newest snapshot through an asset search endpoint.
    Search {
        /// Base URL of the search service, ending in `/`.
        base: String,
        /// Name of the hosted repository to search.
        repository: String,
    },
}

/// A named remote artifact source.
///
/// # Examples
///
/// ```
/// use hoist::repository::Repository;
///
/// let repo = Repository::new("central", "https://repo.example/maven2", 50);
/// assert_eq!(repo.url(), "https://repo.example/maven2/");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    name: String,
    releases: String,
    snapshots: SnapshotStrategy,
    priority: i32,
}

impl Repository {
    /// Create a repository serving release coordinates from `url`.
    ///
    /// A trailing `/` is appended when missing.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            releases: with_trailing_slash(url.into()),
            snapshots: SnapshotStrategy::Disabled,
            priority,
        }
    }

    /// Enable snapshot resolution through a search endpoint.
    #[must_use]
    pub fn with_snapshot_search(
        mut self,
        base: impl Into<String>,
        repository: impl Into<String>,
    ) -> Self {
        self.snapshots = SnapshotStrategy::Search {
            base: with_trailing_slash(base.into()),
            repository: repository.into(),
        };
        self
    }

    /// Diagnostic name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base URL for release coordinates.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.releases
    }

    /// Higher priorities are consulted first.
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Snapshot resolution strategy.
    #[must_use]
    pub const fn snapshots(&self) -> &SnapshotStrategy {
        &self.snapshots
    }

    /// Build the URL serving `descriptor` from this repository.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::SnapshotUnsupported`] when the descriptor is
    /// a snapshot and the repository has no search endpoint.
    pub fn url_for(&self, descriptor: &Descriptor) -> Result<String, DownloadError> {
        if !descriptor.is_snapshot() {
            return Ok(format!("{}{}", self.releases, descriptor.coordinate_path()));
        }
        match &self.snapshots {
            SnapshotStrategy::Search { base, repository } => Ok(format!(
                "{base}download?repository={repository}&group={}&name={}\
                 &sort=version&maven.extension={}&maven.classifier",
                descriptor.group(),
                descriptor.artifact(),
                descriptor.extension(),
            )),
            SnapshotStrategy::Disabled => Err(DownloadError::SnapshotUnsupported {
                repository: self.name.clone(),
                coordinate: descriptor.coordinate(),
            }),
        }
    }

    /// Development repository hosting first-party artifacts and snapshots.
    #[must_use]
    pub fn impactdev() -> Self {
        Self::new(
            "impactdev",
            "https://maven.impactdev.net/repository/development/",
            100,
        )
        .with_snapshot_search(IMPACTDEV_SEARCH, "development")
    }

    /// Mirror of Maven Central hosted alongside [`Self::impactdev`].
    #[must_use]
    pub fn impactdev_central_mirror() -> Self {
        Self::new(
            "impactdev-central-mirror",
            "https://maven.impactdev.net/repository/maven-central/",
            50,
        )
    }

    /// Mirror of the Sonatype repository.
    #[must_use]
    pub fn impactdev_sonatype_mirror() -> Self {
        Self::new(
            "impactdev-sonatype-mirror",
            "https://maven.impactdev.net/repository/Sonatype/",
            50,
        )
    }

    /// Maven Central.
    #[must_use]
    pub fn maven_central() -> Self {
        Self::new("maven-central", "https://repo1.maven.org/maven2/", 50)
    }
}

fn with_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

/// Repositories ordered by descending priority.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositorySet {
    repositories: Vec<Repository>,
}

impl RepositorySet {
    /// Build a set from `repositories`, ordering by descending priority.
    #[must_use]
    pub fn new(repositories: impl IntoIterator<Item = Repository>) -> Self {
        let mut set = Self {
            repositories: repositories.into_iter().collect(),
        };
        set.sort();
        set
    }

    /// The built-in repositories, primary development repository first.
    #[must_use]
    pub fn provided() -> Self {
        Self::new([
            Repository::impactdev(),
            Repository::impactdev_central_mirror(),
            Repository::impactdev_sonatype_mirror(),
            Repository::maven_central(),
        ])
    }

    /// Add a repository, keeping the priority order.
    pub fn push(&mut self, repository: Repository) {
        self.repositories.push(repository);
        self.sort();
    }

    /// Iterate in consultation order.
    pub fn iter(&self) -> std::slice::Iter<'_, Repository> {
        self.repositories.iter()
    }

    /// Number of repositories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    /// Whether the set has no repositories.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    fn sort(&mut self) {
        // Stable, so equal priorities keep insertion order.
        self.repositories.sort_by(|a, b| b.priority.cmp(&a.priority));
    }
}

impl<'a> IntoIterator for &'a RepositorySet {
    type Item = &'a Repository;
    type IntoIter = std::slice::Iter<'a, Repository>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<Repository> for RepositorySet {
    fn from_iter<T: IntoIterator<Item = Repository>>(iter: T) -> Self {
        Self::new(iter)
    }
}
