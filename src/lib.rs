//! cells-legacy: migration reader for the v2 file-sync client's on-device state.
//!
//! The v2 client persisted accounts and offline roots in two SQLite stores under its
//! private data directory. This crate opens those stores, upgrades old schema
//! generations in place, and normalizes every row into value objects the current
//! storage layer can import.
//!
//! # Architecture
//!
//! ## Two stores, two locks
//!
//! - **Accounts** (`files/database.sqlite`): account blobs, bearer tokens, legacy passwords
//! - **Watches** (`files/sync.sqlite`): offline roots with last-run stats and errors
//!
//! Each store is reached through its own `DbBroker`, which serializes access to the
//! store's connection. Both are owned by a [`LegacyStores`] handle built once by the
//! caller.
//!
//! ## Failure isolation
//!
//! A row that fails to decode (malformed account blob, unreadable token, password
//! that will not decrypt) is logged and skipped. Schema and initialization failures
//! abort the operation that hit them.
//!
//! # Crate Structure
//!
//! - [`core`]: errors, config, broker, schemas and migrator, codecs, model, coverage
//! - [`stores`]: the account and watch stores, the composition root, the import snapshot

pub mod cli;
pub mod core;
pub mod stores;

pub use stores::LegacyStores;

use crate::cli::{Cli, Command, OutputFormat};
use crate::core::config;
use crate::core::error::LegacyError;
use crate::core::store::{self, Store, StoreKind};
use crate::stores::snapshot::LegacySnapshot;
use clap::Parser;
use colored::Colorize;
use serde::Serialize;

fn print_json<T: Serialize>(value: &T) -> Result<(), LegacyError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_store_presence(store: &Store) {
    let mark = if store.exists() {
        "present".bright_green()
    } else {
        "missing".bright_red()
    };
    println!(
        "  {} {:<9} {} ({})",
        "▸".bright_cyan(),
        store.kind.label(),
        mark,
        store.path.display()
    );
}

pub fn run() -> Result<(), LegacyError> {
    let cli = Cli::parse();
    let config = config::load_config(&cli.data_dir, cli.config.as_deref())?;
    let json = cli.format == OutputFormat::Json;

    match cli.command {
        Command::Check => {
            let accounts = Store::resolve(StoreKind::Accounts, &config);
            let watches = Store::resolve(StoreKind::Watches, &config);
            if json {
                return print_json(&serde_json::json!({
                    "accounts": accounts.exists(),
                    "watches": watches.exists(),
                    "migratable": store::has_legacy_db(&config),
                }));
            }
            print_store_presence(&accounts);
            print_store_presence(&watches);
            return Ok(());
        }
        Command::Clean { yes } => {
            let files = if yes {
                store::clean_legacy_files(&config.data_dir)?
            } else {
                store::legacy_files(&config.data_dir)
            };
            if json {
                return print_json(&serde_json::json!({ "deleted": yes, "files": files }));
            }
            let verb = if yes { "removed" } else { "would remove" };
            for f in &files {
                println!("  {} {} {}", "●".bright_cyan(), verb, f.display());
            }
            println!("  {} {} file(s)", "✓".bright_green(), files.len());
            return Ok(());
        }
        _ => {}
    }

    if !store::has_legacy_db(&config) {
        return Err(LegacyError::Config(format!(
            "no legacy stores under {}",
            config.data_dir.display()
        )));
    }

    let stores = LegacyStores::new(config);
    stores.init()?;

    match cli.command {
        Command::Accounts => {
            let records = stores.accounts()?.list_accounts()?;
            if json {
                return print_json(&records);
            }
            for r in &records {
                let kind = if r.legacy { "p8" } else { "cells" };
                println!(
                    "  {} {} [{}] {}",
                    "●".bright_cyan(),
                    r.account_id.bright_white(),
                    kind,
                    r.server_label.as_deref().unwrap_or("")
                );
            }
        }
        Command::Watches { account, all } => {
            let watches = match account.as_deref() {
                Some(id) => stores.watches()?.list_watches_for_account(id)?,
                None if all => stores.watches()?.list_all_watches()?,
                None => stores.watches()?.list_active_watches()?,
            };
            if json {
                return print_json(&watches);
            }
            for w in &watches {
                let status = match (&w.last_error, w.active) {
                    (_, false) => "inactive".dimmed(),
                    (Some(_), true) => "error".bright_red(),
                    (None, true) => "ok".bright_green(),
                };
                println!(
                    "  {} {} {} ({})",
                    "●".bright_cyan(),
                    w.key.account_id,
                    w.full_path().bright_white(),
                    status
                );
            }
        }
        Command::State {
            account,
            workspace,
            path,
        } => {
            let state = stores.watches()?.watch_state(&account, &workspace, &path)?;
            if json {
                return print_json(&serde_json::json!({ "path": path, "state": state }));
            }
            println!("{:?}", state);
        }
        Command::Snapshot { reveal } => {
            let snapshot = LegacySnapshot::collect(&stores)?;
            let snapshot = if reveal { snapshot } else { snapshot.redacted() };
            if json {
                return print_json(&snapshot);
            }
            for a in &snapshot.accounts {
                let creds = if a.has_credentials() {
                    "credentials".bright_green()
                } else {
                    "no credentials".bright_yellow()
                };
                println!(
                    "  {} {} {} offline root(s), {}",
                    "●".bright_cyan(),
                    a.record.account_id.bright_white(),
                    a.watches.len(),
                    creds
                );
            }
            println!(
                "  {} {} account(s), {} offline root(s)",
                "✓".bright_green(),
                snapshot.accounts.len(),
                snapshot.offline_roots
            );
        }
        Command::Check | Command::Clean { .. } => {}
    }
    Ok(())
}
