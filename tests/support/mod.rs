//! Shared collaborators for the integration and behaviour suites.
//!
//! `StubFetcher` serves canned payloads keyed by URL and records every
//! request, `CopyRelocator` stands in for the external rewriter, and
//! `TempCache` owns a throwaway cache directory.

use camino::{Utf8Path, Utf8PathBuf};
use hoist::cache::DiskCache;
use hoist::descriptor::{Descriptor, Relocation, Sha256Checksum};
use hoist::download::{ArtefactFetcher, DownloadError};
use hoist::relocation::{RelocationError, Relocator};
use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tempfile::TempDir;

/// Group shared by every test descriptor.
pub const GROUP: &str = "org.example";
/// Version shared by every release test descriptor.
pub const VERSION: &str = "1.0";

/// Bytes served for `artifact`.
pub fn payload_for(artifact: &str) -> Vec<u8> {
    format!("{artifact} bytes").into_bytes()
}

/// Release descriptor pinned to [`payload_for`]`(artifact)`.
pub fn release(artifact: &str) -> Descriptor {
    builder(artifact)
        .checksum(Sha256Checksum::compute(&payload_for(artifact)))
        .build()
        .expect("valid release descriptor")
}

/// Release descriptor rewriting `old.pkg` to `new.pkg`.
pub fn relocated(artifact: &str) -> Descriptor {
    relocated_with(artifact, Relocation::new("old{}pkg", "new{}pkg"))
}

/// Release descriptor with the single relocation rule `rule`.
pub fn relocated_with(artifact: &str, rule: Relocation) -> Descriptor {
    builder(artifact)
        .checksum(Sha256Checksum::compute(&payload_for(artifact)))
        .relocation(rule)
        .build()
        .expect("valid relocated descriptor")
}

/// Release descriptor bundling `bundled`.
pub fn bundling(artifact: &str, bundled: &[Descriptor]) -> Descriptor {
    bundled
        .iter()
        .fold(builder(artifact), |b, d| b.with(d.clone()))
        .checksum(Sha256Checksum::compute(&payload_for(artifact)))
        .build()
        .expect("valid bundling descriptor")
}

fn builder(artifact: &str) -> hoist::descriptor::DescriptorBuilder {
    let mut name = artifact.to_owned();
    if let Some(first) = name.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    Descriptor::builder()
        .name(name)
        .group(GROUP)
        .artifact(artifact)
        .version(VERSION)
}

/// Release URL of `artifact` under `base`.
pub fn release_url(base: &str, artifact: &str) -> String {
    format!("{base}org/example/{artifact}/{VERSION}/{artifact}-{VERSION}.jar")
}

/// Fetcher answering from a URL table.
#[derive(Debug, Default)]
pub struct StubFetcher {
    responses: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl StubFetcher {
    /// A fetcher that sleeps for `delay` on every request.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Serve `body` at `url`.
    pub fn serve(&self, url: impl Into<String>, body: Vec<u8>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.into(), body);
    }

    /// Every URL requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How often `url` was requested.
    pub fn calls_to(&self, url: &str) -> usize {
        self.calls().iter().filter(|c| *c == url).count()
    }
}

impl ArtefactFetcher for StubFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_owned());
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
            .ok_or_else(|| DownloadError::NotFound {
                url: url.to_owned(),
            })
    }
}

/// Relocator that prefixes the input with a marker and counts invocations.
#[derive(Debug, Default)]
pub struct CopyRelocator {
    invocations: AtomicUsize,
}

impl CopyRelocator {
    /// Number of rewrites performed.
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

impl Relocator for CopyRelocator {
    fn relocate(
        &self,
        input: &Utf8Path,
        output: &Utf8Path,
        rules: &[Relocation],
    ) -> Result<(), RelocationError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let mut body = format!("relocated by {} rules\n", rules.len()).into_bytes();
        body.extend(fs::read(input)?);
        fs::write(output, body)?;
        Ok(())
    }
}

/// A disk cache rooted in a temporary directory.
pub struct TempCache {
    _dir: TempDir,
    /// The opened cache.
    pub cache: DiskCache,
}

impl TempCache {
    /// Create a fresh, empty cache.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().join("libs")).expect("utf8 temp path");
        let cache = DiskCache::open(root).expect("cache opens");
        Self { _dir: dir, cache }
    }

    /// Whether `file_name` exists in the cache root.
    pub fn holds(&self, file_name: &str) -> bool {
        self.cache.root().join(file_name).is_file()
    }
}
