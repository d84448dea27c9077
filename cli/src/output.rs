//! Output formatting for the `hoist` CLI.
//!
//! Shell snippets for pointing a host at the fetched artifacts, per-descriptor
//! report lines, dry-run summaries, and the registry listing in human or JSON
//! form.

use camino::Utf8Path;
use hoist::{Descriptor, LoadOutcome, LoadReport};
use serde::Serialize;

/// Environment variable the snippets export.
pub const LIBRARY_PATH_VAR: &str = "HOIST_LIBRARY_PATH";

/// Shell configuration snippets for different shells.
#[derive(Debug, Clone)]
pub struct ShellSnippet {
    /// Export line for bash/zsh.
    pub bash: String,
    /// Set line for fish shell.
    pub fish: String,
    /// Set line for PowerShell.
    pub powershell: String,
}

impl ShellSnippet {
    /// Create shell snippets exporting `search_path`.
    ///
    /// # Example
    ///
    /// ```
    /// use hoist_cli::output::ShellSnippet;
    ///
    /// let snippet = ShellSnippet::new("/cache/h2-1.4.199.jar");
    /// assert!(snippet.bash.contains("HOIST_LIBRARY_PATH"));
    /// ```
    #[must_use]
    pub fn new(search_path: &str) -> Self {
        Self {
            bash: format!("export {LIBRARY_PATH_VAR}=\"{search_path}\""),
            fish: format!("set -gx {LIBRARY_PATH_VAR} \"{search_path}\""),
            powershell: format!("$env:{LIBRARY_PATH_VAR} = \"{search_path}\""),
        }
    }

    /// Format the snippet for display to the user.
    #[must_use]
    pub fn display_text(&self) -> String {
        format!(
            concat!(
                "Add the following to your shell configuration:\n\n",
                "  # bash/zsh (~/.bashrc, ~/.zshrc)\n",
                "  {}\n\n",
                "  # fish (~/.config/fish/config.fish)\n",
                "  {}\n\n",
                "  # PowerShell ($PROFILE)\n",
                "  {}"
            ),
            self.bash, self.fish, self.powershell
        )
    }
}

/// One line per descriptor in a load report.
#[must_use]
pub fn report_lines(report: &LoadReport) -> Vec<String> {
    report
        .outcomes()
        .iter()
        .map(|(descriptor, outcome)| match outcome {
            LoadOutcome::Loaded { path, exposed } => {
                let scope = if *exposed { "" } else { " (isolated only)" };
                format!("  loaded  {descriptor} -> {path}{scope}")
            }
            LoadOutcome::Failed(failure) => format!("  failed  {failure}"),
        })
        .collect()
}

/// Summary after a fetch.
#[must_use]
pub fn summary_message(loaded: usize, total: usize, cache_dir: &Utf8Path) -> String {
    let plural = if total == 1 { "dependency" } else { "dependencies" };
    format!("Loaded {loaded} of {total} {plural} into {cache_dir}")
}

/// Configuration shown by `--dry-run`.
#[derive(Debug)]
pub struct DryRunInfo<'a> {
    /// Effective cache root.
    pub cache_dir: &'a Utf8Path,
    /// Worker threads that would be started.
    pub workers: usize,
    /// Repository names in consultation order.
    pub repositories: Vec<String>,
    /// Descriptors that would be loaded, in order.
    pub descriptors: &'a [Descriptor],
}

impl DryRunInfo<'_> {
    /// Format the dry-run information for display.
    #[must_use]
    pub fn display_text(&self) -> String {
        let mut lines = vec![
            "Dry run - nothing will be downloaded".to_owned(),
            String::new(),
            format!("Cache directory: {}", self.cache_dir),
            format!("Workers: {}", self.workers),
            format!("Repositories: {}", self.repositories.join(", ")),
            String::new(),
            "Dependencies to fetch:".to_owned(),
        ];
        for descriptor in self.descriptors {
            lines.push(format!("  - {descriptor}"));
            for bundled in descriptor.bundled() {
                lines.push(format!("      + {bundled}"));
            }
        }
        lines.join("\n")
    }
}

/// A registry entry as shown by `hoist list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedEntry {
    /// Registry key.
    pub key: String,
    /// Display name.
    pub name: String,
    /// `group:artifact:version`.
    pub coordinate: String,
    /// Whether the entry is held back from the host scope.
    pub isolated: bool,
    /// Whether the fully loaded form is in the disk cache.
    pub cached: bool,
}

/// A feature bundle as shown by `hoist list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedFeature {
    /// Feature name.
    pub name: String,
    /// Member registry keys.
    pub members: Vec<String>,
}

#[derive(Serialize)]
struct Listing<'a> {
    entries: &'a [ListedEntry],
    features: &'a [ListedFeature],
}

/// Format the registry listing for humans.
#[must_use]
pub fn format_list_human(entries: &[ListedEntry], features: &[ListedFeature]) -> String {
    let mut output = String::from("Registry entries:\n");
    for entry in entries {
        let mut flags = Vec::new();
        if entry.cached {
            flags.push("cached");
        }
        if entry.isolated {
            flags.push("isolated");
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        };
        output.push_str(&format!("  {:<28}{}{flags}\n", entry.key, entry.coordinate));
    }

    output.push_str("\nFeatures:\n");
    for feature in features {
        output.push_str(&format!(
            "  {:<10}{}\n",
            feature.name,
            feature.members.join(", ")
        ));
    }
    output
}

/// Format the registry listing as JSON.
#[must_use]
pub fn format_list_json(entries: &[ListedEntry], features: &[ListedFeature]) -> String {
    let listing = Listing { entries, features };
    serde_json::to_string_pretty(&listing).unwrap_or_else(|_| "{}".to_owned())
}
