//! Migration settings, read from `legacy-migrate.toml` when present.

use crate::core::error::LegacyError;
use crate::core::schemas;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "legacy-migrate.toml";

/// Passphrase the v2 client fed to its password cipher.
pub const DEFAULT_LEGACY_SECRET: &str = "ajxp-legacy-credentials";
pub const DEFAULT_KDF_ITERATIONS: u32 = 4096;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateConfig {
    /// Application private data directory; store paths are relative to it.
    pub data_dir: PathBuf,
    pub accounts_db: PathBuf,
    pub watches_db: PathBuf,
    pub legacy_secret: String,
    pub kdf_iterations: u32,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::new(),
            accounts_db: PathBuf::from(schemas::ACCOUNTS_DB_PATH),
            watches_db: PathBuf::from(schemas::WATCHES_DB_PATH),
            legacy_secret: DEFAULT_LEGACY_SECRET.to_string(),
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
        }
    }
}

impl MigrateConfig {
    pub fn for_data_dir(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            ..Self::default()
        }
    }

    pub fn accounts_db_path(&self) -> PathBuf {
        self.data_dir.join(&self.accounts_db)
    }

    pub fn watches_db_path(&self) -> PathBuf {
        self.data_dir.join(&self.watches_db)
    }

    fn validate(&self) -> Result<(), LegacyError> {
        if self.kdf_iterations == 0 {
            return Err(LegacyError::Config(
                "kdf_iterations must be positive".to_string(),
            ));
        }
        if self.legacy_secret.is_empty() {
            return Err(LegacyError::Config("legacy_secret is empty".to_string()));
        }
        Ok(())
    }
}

/// Load config from `explicit`, or from `<data_dir>/legacy-migrate.toml`.
/// A missing default file yields defaults; a missing explicit file is an error.
pub fn load_config(data_dir: &Path, explicit: Option<&Path>) -> Result<MigrateConfig, LegacyError> {
    let config_path = match explicit {
        Some(p) => p.to_path_buf(),
        None => data_dir.join(CONFIG_FILE_NAME),
    };

    let mut config = if config_path.exists() {
        let content = fs::read_to_string(&config_path).map_err(LegacyError::IoError)?;
        toml::from_str::<MigrateConfig>(&content)
            .map_err(|e| LegacyError::Config(format!("{}: {}", config_path.display(), e)))?
    } else if explicit.is_some() {
        return Err(LegacyError::Config(format!(
            "config file not found: {}",
            config_path.display()
        )));
    } else {
        MigrateConfig::default()
    };

    if config.data_dir.as_os_str().is_empty() {
        config.data_dir = data_dir.to_path_buf();
    }
    config.validate()?;
    Ok(config)
}
