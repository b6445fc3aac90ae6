//! CLI struct definitions for the `cells-legacy` command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "cells-legacy",
    version = env!("CARGO_PKG_VERSION"),
    about = "Inspect and export the v2 client's legacy accounts and offline roots."
)]
pub(crate) struct Cli {
    /// Application private data directory (the parent of `files/`).
    #[clap(long, global = true, default_value = ".")]
    pub data_dir: PathBuf,
    /// Explicit config file (defaults to `<data-dir>/legacy-migrate.toml`).
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,
    /// Output format.
    #[clap(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Report whether legacy stores are present
    Check,
    /// List decodable account records
    Accounts,
    /// List offline roots
    Watches {
        /// Restrict to one account (all of its watches, active or not).
        #[clap(long)]
        account: Option<String>,
        /// Include deactivated roots of every account.
        #[clap(long, conflicts_with = "account")]
        all: bool,
    },
    /// Classify a remote path against the offline roots of an account/workspace
    State {
        #[clap(long)]
        account: String,
        #[clap(long)]
        workspace: String,
        #[clap(long)]
        path: String,
    },
    /// Print the import bundle (secrets masked unless --reveal)
    Snapshot {
        #[clap(long)]
        reveal: bool,
    },
    /// Delete all legacy database files after a successful import
    Clean {
        /// Actually delete; without it only lists the files.
        #[clap(long)]
        yes: bool,
    },
}
