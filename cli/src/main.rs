//! `hoist` CLI entrypoint.
//!
//! Fetches registry dependencies into the disk cache and prints a search-path
//! snippet for the artifacts exposed to the host.

use clap::Parser;
use hoist_cli::cli::{Cli, Command};
use hoist_cli::commands::{fetch, list, write_line};
use hoist_cli::error::Result;
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
    match &cli.command {
        Some(Command::List(args)) => list(args, stdout),
        Some(Command::Fetch(_)) | None => fetch(cli.fetch_args(), stderr),
    }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_line(stderr, err);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoist_cli::error::CliError;

    #[test]
    fn exit_code_for_run_result_returns_zero_on_success() {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Ok(()), &mut stderr);
        assert_eq!(exit_code, 0);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_prints_error_and_returns_one() {
        let err = CliError::LoadFailed {
            failed: 2,
            total: 5,
        };

        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
        assert_eq!(exit_code, 1);

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(stderr_text.contains("2 of 5 dependencies failed to load"));
    }

    #[test]
    fn run_dispatches_list_to_stdout() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let cache = dir.path().join("libs");
        let cache = cache.to_str().expect("utf8 temp path");
        let cli = Cli::parse_from(["hoist", "list", "--cache-dir", cache]);

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        temp_env::with_vars(
            [("HOIST_CACHE_DIR", None::<&str>), ("HOIST_WORKERS", None)],
            || run(&cli, &mut stdout, &mut stderr),
        )
        .expect("list succeeds");

        assert!(stderr.is_empty());
        let text = String::from_utf8(stdout).expect("stdout was not UTF-8");
        assert!(text.contains("Registry entries:"));
    }
}
