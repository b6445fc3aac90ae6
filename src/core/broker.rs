use crate::core::db;
use crate::core::error::LegacyError;
use crate::core::migration::{SchemaMigrator, SchemaPlan};
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Exclusive access point to one store file.
///
/// Every read and write against a store goes through [`DbBroker::with_conn`], which
/// holds the store's lock for the duration of the closure. Locks are per store: the
/// account and watch stores never contend with each other.
pub struct DbBroker {
    db_id: String,
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl DbBroker {
    /// Opens (creating if needed) the file at `path` and migrates it to `plan`.
    pub fn open(path: &Path, plan: &SchemaPlan) -> Result<Self, LegacyError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(LegacyError::IoError)?;
            }
        }
        let mut conn = db::db_connect(path)?;
        let from = SchemaMigrator::new(plan).migrate(&mut conn)?;
        let db_id = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        debug!(db = %db_id, from, to = plan.version, "store opened");
        Ok(Self {
            db_id,
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Execute a closure with the serialized connection of this store.
    pub fn with_conn<F, R>(&self, op_name: &str, f: F) -> Result<R, LegacyError>
    where
        F: FnOnce(&Connection) -> Result<R, LegacyError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| LegacyError::LockPoisoned(self.db_id.clone()))?;

        let result = f(&conn);

        let status = if result.is_ok() { "success" } else { "error" };
        debug!(db = %self.db_id, op = op_name, status, "store op");
        result
    }
}
