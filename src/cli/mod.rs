//! Command-line interface for workq.
//!
//! Provides operator commands for queue status, listing, scheduling,
//! cancellation, suspend/resume and purging.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli, Commands};
