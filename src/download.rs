//! Artifact download with ordered repository fallback.
//!
//! The network is reached through the [`ArtefactFetcher`] trait so that the
//! fallback loop can be exercised without HTTP. [`HttpFetcher`] is the
//! production implementation backed by a `ureq` agent with bounded
//! connect and read timeouts.

use crate::descriptor::Descriptor;
use crate::error::{LoadError, RepositoryAttempt};
use crate::repository::{Repository, RepositorySet};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;

/// User agent sent with every request unless configured otherwise.
pub const DEFAULT_USER_AGENT: &str = "hoist";

/// Default time allowed for establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time allowed for receiving the response.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from a single download attempt against one repository.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The request failed or returned a non-success status.
    #[error("download failed for {url}: {reason}")]
    Http {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The repository does not hold the artifact (HTTP 404).
    #[error("artifact not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// The server answered with an empty body.
    #[error("empty payload from {url}")]
    EmptyPayload {
        /// The URL that returned no bytes.
        url: String,
    },

    /// The repository cannot resolve snapshot coordinates.
    #[error("repository {repository} cannot resolve snapshot {coordinate}")]
    SnapshotUnsupported {
        /// The repository that was skipped.
        repository: String,
        /// The snapshot coordinate.
        coordinate: String,
    },

    /// I/O error while reading the response body.
    #[error("I/O error reading download: {0}")]
    Io(#[from] std::io::Error),
}

/// Retrieves raw bytes for a URL.
///
/// Implementations must be shareable across worker threads.
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactFetcher: Send + Sync {
    /// Download the body served at `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] when the request fails, the status is not
    /// a success, or the body cannot be read.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError>;
}

/// Network settings applied to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    /// Value of the `User-Agent` header.
    pub user_agent: String,
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
    /// Timeout for receiving the response and its body.
    pub read_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// HTTP fetcher using `ureq`.
pub struct HttpFetcher {
    agent: ureq::Agent,
    user_agent: String,
}

impl HttpFetcher {
    /// Build a fetcher with its own agent configured from `settings`.
    #[must_use]
    pub fn new(settings: &HttpSettings) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(settings.connect_timeout))
            .timeout_recv_response(Some(settings.read_timeout))
            .timeout_recv_body(Some(settings.read_timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            user_agent: settings.user_agent.clone(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(&HttpSettings::default())
    }
}

impl ArtefactFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let response = self
            .agent
            .get(url)
            .header("User-Agent", self.user_agent.as_str())
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut payload = Vec::new();
        std::io::copy(&mut response.into_body().as_reader(), &mut payload)?;
        Ok(payload)
    }
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        other => DownloadError::Http {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

/// Fetches descriptor payloads from repositories.
#[derive(Clone)]
pub struct Downloader {
    fetcher: Arc<dyn ArtefactFetcher>,
}

impl Downloader {
    /// Wrap a fetcher.
    #[must_use]
    pub fn new(fetcher: Arc<dyn ArtefactFetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetch `descriptor` from a single repository.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::EmptyPayload`] for a zero-length body, and
    /// propagates URL resolution and fetch failures.
    pub fn fetch(
        &self,
        repository: &Repository,
        descriptor: &Descriptor,
    ) -> Result<Vec<u8>, DownloadError> {
        let url = repository.url_for(descriptor)?;
        debug!("fetching {descriptor} from {url}");
        let payload = self.fetcher.fetch(&url)?;
        if payload.is_empty() {
            return Err(DownloadError::EmptyPayload { url });
        }
        Ok(payload)
    }

    /// Try each repository in order until one serves `descriptor`.
    ///
    /// Attempts are strictly sequential; a repository is never retried.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::RepositoryExhausted`] listing every attempt, in
    /// order, when no repository succeeds.
    pub fn fetch_with_fallback(
        &self,
        repositories: &RepositorySet,
        descriptor: &Descriptor,
    ) -> Result<Vec<u8>, LoadError> {
        let mut attempts = Vec::new();
        for repository in repositories {
            match self.fetch(repository, descriptor) {
                Ok(payload) => {
                    info!(
                        "downloaded {descriptor} from {} ({} bytes)",
                        repository.name(),
                        payload.len()
                    );
                    return Ok(payload);
                }
                Err(error) => {
                    warn!("{} could not provide {descriptor}: {error}", repository.name());
                    attempts.push(RepositoryAttempt {
                        repository: repository.name().to_owned(),
                        error,
                    });
                }
            }
        }

        let err = LoadError::RepositoryExhausted {
            descriptor: descriptor.to_string(),
            attempts,
        };
        error!("{err}");
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Sha256Checksum;
    use mockall::Sequence;
    use mockall::predicate::eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn descriptor() -> Descriptor {
        Descriptor::builder()
            .name("Example")
            .group("org.example")
            .artifact("lib")
            .version("1.0")
            .checksum(Sha256Checksum::compute(b"lib"))
            .build()
            .expect("valid descriptor")
    }

    fn repositories() -> RepositorySet {
        RepositorySet::new([
            Repository::new("a", "https://a.test/", 2),
            Repository::new("b", "https://b.test/", 1),
        ])
    }

    const A_URL: &str = "https://a.test/org/example/lib/1.0/lib-1.0.jar";
    const B_URL: &str = "https://b.test/org/example/lib/1.0/lib-1.0.jar";

    #[rstest]
    fn empty_payload_is_a_failure(descriptor: Descriptor) {
        let mut fetcher = MockArtefactFetcher::new();
        fetcher.expect_fetch().returning(|_| Ok(Vec::new()));
        let downloader = Downloader::new(Arc::new(fetcher));

        let err = downloader
            .fetch(&Repository::new("a", "https://a.test/", 0), &descriptor)
            .expect_err("empty body rejected");
        assert!(matches!(err, DownloadError::EmptyPayload { .. }));
    }

    #[rstest]
    fn falls_back_to_next_repository_in_order(descriptor: Descriptor) {
        let mut seq = Sequence::new();
        let mut fetcher = MockArtefactFetcher::new();
        fetcher
            .expect_fetch()
            .with(eq(A_URL))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|url| {
                Err(DownloadError::NotFound {
                    url: url.to_owned(),
                })
            });
        fetcher
            .expect_fetch()
            .with(eq(B_URL))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(b"payload".to_vec()));
        let downloader = Downloader::new(Arc::new(fetcher));

        let payload = downloader
            .fetch_with_fallback(&repositories(), &descriptor)
            .expect("second repository succeeds");
        assert_eq!(payload, b"payload");
    }

    #[rstest]
    fn exhausted_reports_every_attempt_in_order(descriptor: Descriptor) {
        let mut fetcher = MockArtefactFetcher::new();
        fetcher.expect_fetch().times(2).returning(|url| {
            Err(DownloadError::Http {
                url: url.to_owned(),
                reason: "connection refused".to_owned(),
            })
        });
        let downloader = Downloader::new(Arc::new(fetcher));

        let err = downloader
            .fetch_with_fallback(&repositories(), &descriptor)
            .expect_err("all repositories fail");
        let LoadError::RepositoryExhausted { attempts, .. } = err else {
            panic!("expected RepositoryExhausted, got {err:?}");
        };
        let names: Vec<_> = attempts.iter().map(|a| a.repository.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn snapshot_skips_repositories_without_search() {
        let snapshot = Descriptor::builder()
            .group("org.example")
            .artifact("lib")
            .version("2.0-SNAPSHOT")
            .build()
            .expect("snapshot descriptor");

        let mut fetcher = MockArtefactFetcher::new();
        fetcher.expect_fetch().never();
        let downloader = Downloader::new(Arc::new(fetcher));

        let err = downloader
            .fetch_with_fallback(&repositories(), &snapshot)
            .expect_err("no repository resolves snapshots");
        let LoadError::RepositoryExhausted { attempts, .. } = err else {
            panic!("expected RepositoryExhausted, got {err:?}");
        };
        assert!(
            attempts
                .iter()
                .all(|a| matches!(a.error, DownloadError::SnapshotUnsupported { .. }))
        );
    }

    #[rstest]
    fn empty_repository_set_is_exhausted_immediately(descriptor: Descriptor) {
        let fetcher = MockArtefactFetcher::new();
        let downloader = Downloader::new(Arc::new(fetcher));
        let err = downloader
            .fetch_with_fallback(&RepositorySet::default(), &descriptor)
            .expect_err("nothing to try");
        assert!(err.to_string().contains("no repositories configured"));
    }

    #[rstest]
    fn exhausted_set_is_logged_as_error(descriptor: Descriptor) {
        let mut logger = logtest::Logger::start();
        let mut fetcher = MockArtefactFetcher::new();
        fetcher.expect_fetch().returning(|url| {
            Err(DownloadError::NotFound {
                url: url.to_owned(),
            })
        });
        let downloader = Downloader::new(Arc::new(fetcher));
        let _ = downloader.fetch_with_fallback(&repositories(), &descriptor);

        let mut saw_error = false;
        while let Some(record) = logger.pop() {
            if record.level() == log::Level::Error
                && record
                    .args()
                    .to_string()
                    .contains("no repository could provide")
            {
                saw_error = true;
                break;
            }
        }
        assert!(saw_error, "expected an error record for the exhausted set");
    }

    #[test]
    fn default_settings_use_bounded_timeouts() {
        let settings = HttpSettings::default();
        assert_eq!(settings.user_agent, "hoist");
        assert_eq!(settings.connect_timeout, Duration::from_secs(5));
        assert_eq!(settings.read_timeout, Duration::from_secs(10));
    }
}
