//! Locations of the v2 client's persisted state.
//!
//! The client kept two independent SQLite stores under its private data directory,
//! plus a handful of cache databases that are not migrated and only need removal.

use crate::core::config::MigrateConfig;
use crate::core::error::LegacyError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Store type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Accounts, tokens and legacy passwords (`files/database.sqlite`)
    Accounts,
    /// Offline roots with stats and errors (`files/sync.sqlite`)
    Watches,
}

impl StoreKind {
    pub fn label(self) -> &'static str {
        match self {
            StoreKind::Accounts => "accounts",
            StoreKind::Watches => "watches",
        }
    }
}

/// A legacy store file resolved against the data directory.
#[derive(Debug, Clone)]
pub struct Store {
    pub kind: StoreKind,
    pub path: PathBuf,
}

impl Store {
    pub fn resolve(kind: StoreKind, config: &MigrateConfig) -> Self {
        let path = match kind {
            StoreKind::Accounts => config.accounts_db_path(),
            StoreKind::Watches => config.watches_db_path(),
        };
        Self { kind, path }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// Both legacy stores are present, so there is something to migrate.
pub fn has_legacy_db(config: &MigrateConfig) -> bool {
    Store::resolve(StoreKind::Accounts, config).exists()
        && Store::resolve(StoreKind::Watches, config).exists()
}

/// Every database the v2 client created under `files/`.
pub const LEGACY_DB_NAMES: &[&str] = &[
    "cache_database.sqlite",
    "database.sqlite",
    "poll_buffer.sqlite",
    "sync.sqlite",
    "sync_buffer.sqlite",
    "sync_operations.sqlite",
    "sync_tree.sqlite",
    "thumbs.sqlite",
];

const SQLITE_COMPANIONS: &[&str] = &["", "-shm", "-wal", "-journal"];

/// Legacy database files (with their SQLite companions) currently on disk.
pub fn legacy_files(data_dir: &Path) -> Vec<PathBuf> {
    let files_dir = data_dir.join("files");
    let mut found = Vec::new();
    for name in LEGACY_DB_NAMES {
        for suffix in SQLITE_COMPANIONS {
            let candidate = files_dir.join(format!("{}{}", name, suffix));
            if candidate.is_file() {
                found.push(candidate);
            }
        }
    }
    found
}

/// Removes every legacy database file. Returns the paths that were deleted.
pub fn clean_legacy_files(data_dir: &Path) -> Result<Vec<PathBuf>, LegacyError> {
    let files = legacy_files(data_dir);
    for file in &files {
        fs::remove_file(file).map_err(LegacyError::IoError)?;
        info!(path = %file.display(), "removed legacy file");
    }
    Ok(files)
}
