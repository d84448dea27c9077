//! Command-line front end for the `hoist` dependency engine.
//!
//! # Modules
//!
//! - [`cli`] - Command-line argument definitions
//! - [`commands`] - `fetch` and `list` implementations
//! - [`error`] - CLI error type
//! - [`output`] - Report, snippet, and listing formatting

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
