//! The `fetch` and `list` subcommands.
//!
//! Both take their output sink as `&mut dyn Write` so tests can capture what
//! a user would see.

use crate::cli::{ConfigArgs, FetchArgs, ListArgs};
use crate::error::{CliError, Result};
use crate::output::{
    DryRunInfo, ListedEntry, ListedFeature, ShellSnippet, format_list_human, format_list_json,
    report_lines, summary_message,
};
use hoist::cache::DiskCache;
use hoist::config::EngineConfig;
use hoist::descriptor::Descriptor;
use hoist::host::{HostScope, SearchPathHost};
use hoist::manager::DependencyManager;
use hoist::pool::WorkerPool;
use hoist::registry::{LoadPolicy, Registry};
use log::debug;
use std::fmt::Display;
use std::io::Write;
use std::sync::Arc;

/// Write one line, ignoring failures.
pub fn write_line(out: &mut dyn Write, message: impl Display) {
    if writeln!(out, "{message}").is_err() {
        // Best-effort output; ignore write failures.
    }
}

/// Load the configuration file (if any), then apply environment and flag
/// overrides in that order.
///
/// # Errors
///
/// Returns [`CliError::Config`] for an unreadable file or a bad override.
pub fn load_config(args: &ConfigArgs) -> Result<EngineConfig> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let mut config = config.with_env_overrides()?;
    if let Some(dir) = &args.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
    Ok(config)
}

/// Resolve features, then explicit keys, into one ordered descriptor list.
///
/// # Errors
///
/// Returns [`CliError::Registry`] for an unknown feature and
/// [`CliError::UnknownKey`] for an unknown key.
pub fn requested_descriptors(
    registry: &Registry,
    keys: &[String],
    features: &[String],
    host: &dyn HostScope,
) -> Result<Vec<Descriptor>> {
    let mut descriptors = registry.resolve_features(features, host)?;
    for key in keys {
        let descriptor = registry
            .get(key)
            .ok_or_else(|| CliError::UnknownKey { key: key.clone() })?;
        if !descriptors.contains(descriptor) {
            descriptors.push(descriptor.clone());
        }
    }
    Ok(descriptors)
}

/// Fetch the requested descriptors into the disk cache.
///
/// # Errors
///
/// Returns [`CliError::LoadFailed`] when any descriptor fails, after every
/// outcome has been written to `stderr`.
pub fn fetch(args: &FetchArgs, stderr: &mut dyn Write) -> Result<()> {
    let mut config = load_config(&args.config)?;
    if let Some(workers) = args.workers {
        config.workers = Some(workers);
    }
    let features: Vec<String> = config
        .features
        .iter()
        .chain(&args.feature)
        .cloned()
        .collect();

    let registry = Registry::provided()?;
    let host = Arc::new(SearchPathHost::default());
    let descriptors = requested_descriptors(registry, &args.keys, &features, host.as_ref())?;
    if descriptors.is_empty() {
        return Err(CliError::NothingRequested);
    }

    if args.dry_run {
        let cache_dir = config.cache_dir();
        let info = DryRunInfo {
            cache_dir: &cache_dir,
            workers: config.workers(),
            repositories: config
                .repository_set()
                .iter()
                .map(|r| r.name().to_owned())
                .collect(),
            descriptors: &descriptors,
        };
        write_line(stderr, info.display_text());
        return Ok(());
    }

    let workers = config.workers();
    let pool = WorkerPool::new(workers).map_err(|source| CliError::Pool { source })?;
    let manager = DependencyManager::configure(&config, pool)?
        .host(Arc::<SearchPathHost>::clone(&host))
        .policy(Arc::new(registry.auto_load_policy()))
        .build();

    if !args.quiet {
        write_line(
            stderr,
            format!(
                "Fetching {} dependencies with {workers} workers...",
                descriptors.len()
            ),
        );
    }
    let report = manager.load(&descriptors);
    let cache_root = manager.cache_root().to_owned();
    manager.shutdown();

    for ((_, outcome), line) in report.outcomes().iter().zip(report_lines(&report)) {
        if !args.quiet || !outcome.is_loaded() {
            write_line(stderr, line);
        }
    }

    let total = report.len();
    let loaded = report.loaded().count();
    if !report.is_success() {
        return Err(CliError::LoadFailed {
            failed: total - loaded,
            total,
        });
    }

    if !args.quiet {
        write_line(stderr, "");
        write_line(stderr, summary_message(loaded, total, &cache_root));
        if !host.exposed().is_empty() {
            let search_path = host.search_path()?;
            write_line(stderr, "");
            write_line(
                stderr,
                ShellSnippet::new(&search_path.to_string_lossy()).display_text(),
            );
        }
    }
    Ok(())
}

/// Describe the registry and which entries are already cached.
///
/// # Errors
///
/// Returns [`CliError::WriteFailed`] if `stdout` cannot be written.
pub fn list(args: &ListArgs, stdout: &mut dyn Write) -> Result<()> {
    let config = load_config(&args.config)?;
    let registry = Registry::provided()?;
    let cache = DiskCache::open(config.cache_dir())?;
    let policy = registry.auto_load_policy();
    debug!("listing registry against {}", cache.root());

    let entries: Vec<ListedEntry> = registry
        .entries()
        .map(|(key, descriptor)| ListedEntry {
            key: key.to_owned(),
            name: descriptor.name().to_owned(),
            coordinate: descriptor.coordinate(),
            isolated: !policy.should_auto_load(descriptor),
            cached: cache.contains_resolved(descriptor),
        })
        .collect();
    let features: Vec<ListedFeature> = registry
        .features()
        .iter()
        .map(|f| ListedFeature {
            name: f.name.to_owned(),
            members: f.members.iter().map(|m| (*m).to_owned()).collect(),
        })
        .collect();

    let text = if args.json {
        format_list_json(&entries, &features)
    } else {
        format_list_human(&entries, &features)
    };
    writeln!(stdout, "{text}").map_err(|source| CliError::WriteFailed { source })
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
