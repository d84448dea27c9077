//! Runtime dependency acquisition and isolation.
//!
//! `hoist` fetches third-party artifacts on demand from a prioritised set of
//! remote repositories, verifies them against pinned SHA-256 digests, keeps
//! them in a local disk cache, optionally rewrites their package prefixes,
//! and either exposes them to the host application or hands them out through
//! isolated contexts.
//!
//! The entry point is [`manager::DependencyManager`]:
//!
//! ```no_run
//! use hoist::cache::DiskCache;
//! use hoist::manager::DependencyManager;
//! use hoist::pool::WorkerPool;
//! use hoist::registry::Registry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::provided()?;
//! let cache = DiskCache::open("libs")?;
//! let manager = DependencyManager::builder(cache, WorkerPool::with_available_parallelism()?)
//!     .policy(std::sync::Arc::new(registry.auto_load_policy()))
//!     .build();
//!
//! let h2 = registry.get("h2").ok_or("h2 is declared")?;
//! let report = manager.load(std::slice::from_ref(h2));
//! assert!(report.is_success());
//! let context = manager.obtain_isolated_context(std::slice::from_ref(h2))?;
//! println!("{:?}", context.path_of(h2));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod descriptor;
pub mod download;
pub mod error;
pub mod host;
pub mod isolation;
pub mod manager;
pub mod pool;
pub mod registry;
pub mod relocation;
pub mod report;
pub mod repository;
pub mod verification;

pub use descriptor::Descriptor;
pub use error::{LoadError, Result};
pub use manager::{DependencyManager, LoadState};
pub use report::{LoadFailure, LoadOutcome, LoadReport, Stage};
