//! Per-descriptor outcomes of a load batch.

use crate::descriptor::Descriptor;
use crate::error::LoadError;
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;

/// Pipeline stage at which a descriptor failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// The job could not be scheduled or did not report back.
    Schedule,
    /// Fetching from the repository set.
    Download,
    /// Checking the payload digest.
    Verify,
    /// Writing into the disk cache.
    Cache,
    /// Rewriting symbol prefixes.
    Relocate,
    /// Handing the artifact to the host scope.
    Expose,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Schedule => "scheduling",
            Self::Download => "download",
            Self::Verify => "verification",
            Self::Cache => "caching",
            Self::Relocate => "relocation",
            Self::Expose => "host exposure",
        };
        f.write_str(name)
    }
}

/// A descriptor-scoped failure with the stage it occurred in.
#[derive(Debug, thiserror::Error)]
#[error("{descriptor} failed during {stage}: {error}")]
pub struct LoadFailure {
    /// The descriptor that failed.
    pub descriptor: Descriptor,
    /// Where in the pipeline it failed.
    pub stage: Stage,
    /// The underlying error.
    #[source]
    pub error: LoadError,
}

/// Terminal outcome for one descriptor.
#[derive(Debug)]
pub enum LoadOutcome {
    /// The artifact is verified, relocated if needed, and cached.
    Loaded {
        /// The file consumers should use.
        path: Utf8PathBuf,
        /// Whether the artifact was injected into the host scope.
        exposed: bool,
    },
    /// The pipeline stopped before the artifact was usable.
    Failed(LoadFailure),
}

impl LoadOutcome {
    /// Whether the descriptor reached the loaded state.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }
}

/// Outcomes of one `load` call, in request order.
///
/// Bundled descriptors appear directly after the descriptor that pulled
/// them in.
#[derive(Debug, Default)]
pub struct LoadReport {
    outcomes: Vec<(Descriptor, LoadOutcome)>,
}

impl LoadReport {
    /// Assemble a report from `(descriptor, outcome)` pairs.
    #[must_use]
    pub fn from_outcomes(outcomes: Vec<(Descriptor, LoadOutcome)>) -> Self {
        Self { outcomes }
    }

    /// Every `(descriptor, outcome)` pair.
    #[must_use]
    pub fn outcomes(&self) -> &[(Descriptor, LoadOutcome)] {
        &self.outcomes
    }

    /// The outcome recorded for `descriptor`, if it was part of the batch.
    #[must_use]
    pub fn outcome(&self, descriptor: &Descriptor) -> Option<&LoadOutcome> {
        self.outcomes
            .iter()
            .find(|(d, _)| d == descriptor)
            .map(|(_, outcome)| outcome)
    }

    /// `true` when every descriptor loaded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| outcome.is_loaded())
    }

    /// Loaded descriptors with their final paths.
    pub fn loaded(&self) -> impl Iterator<Item = (&Descriptor, &Utf8Path)> {
        self.outcomes.iter().filter_map(|(d, outcome)| match outcome {
            LoadOutcome::Loaded { path, .. } => Some((d, path.as_path())),
            LoadOutcome::Failed(_) => None,
        })
    }

    /// Failures, in request order.
    pub fn failures(&self) -> impl Iterator<Item = &LoadFailure> {
        self.outcomes.iter().filter_map(|(_, outcome)| match outcome {
            LoadOutcome::Failed(failure) => Some(failure),
            LoadOutcome::Loaded { .. } => None,
        })
    }

    /// Number of descriptors in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether the batch was empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
