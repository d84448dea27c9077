//! CLI argument definitions for `hoist`.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Fetch, verify, and cache runtime dependencies.
#[derive(Parser, Debug)]
#[command(name = "hoist")]
#[command(version, about, args_conflicts_with_subcommands = true)]
#[command(long_about = concat!(
    "Fetch, verify, and cache runtime dependencies.\n\n",
    "hoist downloads artifacts from a prioritised list of repositories, checks ",
    "each against its pinned SHA-256 digest, and stores it in a local cache. ",
    "Artifacts with relocation rules are rewritten by the configured external ",
    "relocator.\n\n",
    "After fetching, set HOIST_LIBRARY_PATH to the printed search path.",
))]
#[command(after_help = concat!(
    "FEATURES:\n",
    "  mongodb    MongoDB Java driver\n",
    "  mariadb    MariaDB client with HikariCP and SLF4J\n",
    "  mysql      MySQL connector with HikariCP and SLF4J\n",
    "  h2         H2 embedded database (isolated only)\n\n",
    "EXAMPLES:\n",
    "  Fetch the MySQL bundle:\n",
    "    $ hoist -f mysql\n\n",
    "  Fetch individual registry entries:\n",
    "    $ hoist fetch caffeine typesafe-config\n\n",
    "  List the registry and cache state:\n",
    "    $ hoist list\n\n",
    "  Preview without downloading:\n",
    "    $ hoist -f mariadb --dry-run",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Fetch arguments (used when no subcommand is given).
    #[command(flatten)]
    pub fetch: FetchArgs,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch registry entries and features (default when no subcommand given).
    Fetch(FetchArgs),

    /// List registry entries, features, and cache state.
    List(ListArgs),
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigArgs {
    /// Configuration file (TOML).
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Disk cache directory [default: platform-specific].
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<Utf8PathBuf>,
}

/// Arguments for the fetch command.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchArgs {
    /// Registry entry keys to fetch.
    #[arg(value_name = "KEY")]
    pub keys: Vec<String>,

    /// Registry feature to fetch (can be repeated).
    #[arg(short, long, value_name = "NAME")]
    pub feature: Vec<String>,

    /// Number of worker threads.
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,

    /// Show what would be fetched and exit.
    #[arg(long)]
    pub dry_run: bool,

    /// Suppress progress output (errors still shown).
    #[arg(short, long)]
    pub quiet: bool,

    /// Configuration overrides.
    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Arguments for the list command.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ListArgs {
    /// Output in JSON format for scripting.
    #[arg(long)]
    pub json: bool,

    /// Configuration overrides.
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl Cli {
    /// The effective fetch arguments.
    ///
    /// Returns the `fetch` subcommand's arguments when given, and the
    /// top-level flags otherwise.
    #[must_use]
    pub fn fetch_args(&self) -> &FetchArgs {
        match &self.command {
            Some(Command::Fetch(args)) => args,
            Some(Command::List(_)) | None => &self.fetch,
        }
    }
}
